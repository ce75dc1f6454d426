//! Newline-delimited JSON-RPC over a reader and a writer.

use crate::mcp::Service;
use std::io::{BufRead, Write};

/// Serves requests from `input` until it is exhausted, one at a time.
///
/// Each line is one message. Responses are written as single lines; notifications produce no
/// output. Blank lines are ignored.
///
/// ```
/// # use duplocloud_mcp::catalog::Catalog;
/// # use duplocloud_mcp::config::ServerConfig;
/// # use duplocloud_mcp::dispatch::{DispatchFailure, Invocation, Reply};
/// # use duplocloud_mcp::server::Server;
/// # use std::sync::Arc;
/// # let dispatcher = |_: &Invocation| -> Result<Reply, DispatchFailure> { Ok(Reply::Empty) };
/// # let server = Server::build(ServerConfig::default(), Arc::new(Catalog::builtin().unwrap()), Arc::new(dispatcher)).unwrap();
/// use duplocloud_mcp::stdio::serve;
///
/// let input = concat!(
///     r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
///     r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, "\n",
/// );
/// let mut output = Vec::new();
/// serve(server.service(), input.as_bytes(), &mut output).unwrap();
/// assert_eq!(String::from_utf8(output).unwrap(), "{\"jsonrpc\":\"2.0\",\"result\":{},\"id\":1}\n");
/// ```
pub fn serve(service: &Service, input: impl BufRead, mut output: impl Write) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = service.handle_bytes(line.as_bytes()) {
            let bytes = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
            output.write_all(&bytes)?;
            output.write_all(b"\n")?;
            output.flush()?;
        }
    }
    logwise::info_sync!("stdin closed, shutting down");
    Ok(())
}
