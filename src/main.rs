//! The `duplocloud-mcp` binary.

use clap::Parser;
use duplocloud_mcp::catalog::Catalog;
use duplocloud_mcp::config::Args;
use duplocloud_mcp::duploctl::Duploctl;
use duplocloud_mcp::error::Error;
use duplocloud_mcp::server::Server;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logwise::error_sync!(
                "duplocloud-mcp failed: {error}",
                error = logwise::privacy::LogIt(&e)
            );
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = args.server_config()?;
    let catalog = match &args.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::builtin()?,
    };
    let dispatcher = Duploctl::new(&args.duploctl, config.credentials.clone());
    Server::build(config, Arc::new(catalog), Arc::new(dispatcher))?.run()
}
