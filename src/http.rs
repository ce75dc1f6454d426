//! A small threaded HTTP/1.1 server.
//!
//! Each connection is served on its own named thread. Requests are read with `Content-Length`
//! framing and connections are kept alive until the client closes them or asks to. `POST /mcp`
//! carries JSON-RPC; every other path is looked up in a [`Routes`] table.

use crate::context::Context;
use crate::mcp::Service;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Path of the JSON-RPC endpoint.
pub const MCP_PATH: &str = "/mcp";

const MAX_BODY: usize = 16 * 1024 * 1024;
const MAX_HEADER_LINE: usize = 16 * 1024;
const MAX_HEADERS: usize = 100;

/// Transport failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("request body of {0} bytes is too large")]
    TooLarge(usize),
}

impl From<Error> for crate::error::Error {
    fn from(value: Error) -> Self {
        crate::error::Error::Configuration(value.to_string())
    }
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A JSON response.
    ///
    /// ```
    /// use duplocloud_mcp::http::HttpResponse;
    ///
    /// let ok = HttpResponse::json(200, &serde_json::json!({"status": "healthy"}));
    /// assert_eq!(ok.content_type, Some("application/json"));
    /// assert_eq!(ok.body, br#"{"status":"healthy"}"#);
    /// ```
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        HttpResponse {
            status,
            content_type: Some("application/json"),
            headers: Vec::new(),
            body: value.to_string().into_bytes(),
        }
    }

    pub fn text(status: u16, text: &str) -> Self {
        HttpResponse {
            status,
            content_type: Some("text/plain"),
            headers: Vec::new(),
            body: text.as_bytes().to_vec(),
        }
    }

    pub fn empty(status: u16) -> Self {
        HttpResponse {
            status,
            content_type: None,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn not_found() -> Self {
        HttpResponse::text(404, "404 Not Found")
    }

    pub fn method_not_allowed(allowed: &[String]) -> Self {
        let mut response = HttpResponse::text(405, "405 Method Not Allowed");
        response.headers.push(("Allow".to_string(), allowed.join(", ")));
        response
    }

    fn write_to(&self, stream: &mut impl Write, close: bool) -> std::io::Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason(self.status));
        if let Some(content_type) = self.content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        for (key, value) in &self.headers {
            head.push_str(&format!("{key}: {value}\r\n"));
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        if close {
            head.push_str("Connection: close\r\n");
        }
        head.push_str("\r\n");
        stream.write_all(head.as_bytes())?;
        stream.write_all(&self.body)?;
        stream.flush()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Handler of a custom route.
pub type RouteHandler = Arc<dyn Fn(&HttpRequest, &Context) -> HttpResponse + Send + Sync>;

/// One path with the methods it accepts.
#[derive(Clone)]
pub struct Route {
    path: String,
    methods: Vec<String>,
    handler: RouteHandler,
}

impl Route {
    pub fn new(path: &str, methods: &[&str], handler: RouteHandler) -> Self {
        Route {
            path: path.to_string(),
            methods: methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
            handler,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// Custom routes, keyed by path.
#[derive(Debug, Default)]
pub struct Routes {
    routes: BTreeMap<String, Route>,
}

impl Routes {
    pub fn new() -> Self {
        Routes::default()
    }

    /// Adds a route. A path that is already routed, including [`MCP_PATH`], is a configuration
    /// error.
    pub fn add(&mut self, route: Route) -> Result<(), crate::error::Error> {
        if route.path == MCP_PATH || self.routes.contains_key(&route.path) {
            return Err(crate::error::Error::Configuration(format!(
                "route collision: '{}' is already registered",
                route.path
            )));
        }
        self.routes.insert(route.path.clone(), route);
        Ok(())
    }

    pub fn paths(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    /// Answers a request for anything but the JSON-RPC endpoint.
    pub fn respond(&self, request: &HttpRequest, ctx: &Context) -> HttpResponse {
        match self.routes.get(&request.path) {
            None => HttpResponse::not_found(),
            Some(route) if route.methods.iter().any(|m| *m == request.method) => {
                (route.handler)(request, ctx)
            }
            Some(route) => HttpResponse::method_not_allowed(&route.methods),
        }
    }
}

/// Routes one request to the JSON-RPC endpoint or the custom routes.
pub fn respond(service: &Service, routes: &Routes, request: &HttpRequest) -> HttpResponse {
    if request.path != MCP_PATH {
        return routes.respond(request, service.context());
    }
    if request.method != "POST" {
        return HttpResponse::method_not_allowed(&["POST".to_string()]);
    }
    match service.handle_bytes(&request.body) {
        Some(response) => match serde_json::to_value(&response) {
            Ok(value) => HttpResponse::json(200, &value),
            Err(e) => HttpResponse::text(500, &e.to_string()),
        },
        None => HttpResponse::empty(202),
    }
}

/// Reads one request. `Ok(None)` means the client closed the connection between requests.
pub fn read_request(reader: &mut impl BufRead) -> Result<Option<HttpRequest>, Error> {
    let Some(request_line) = read_line(reader)? else {
        return Ok(None);
    };
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(Error::Malformed(format!("bad request line '{request_line}'")));
    };
    let path = target.split('?').next().unwrap_or(target).to_string();
    let method = method.to_ascii_uppercase();
    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)?
            .ok_or_else(|| Error::Malformed("connection closed inside headers".to_string()))?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADERS {
            return Err(Error::Malformed(format!("more than {MAX_HEADERS} headers")));
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Malformed(format!("bad header '{line}'")))?;
        headers.push((key.trim().to_string(), value.trim().to_string()));
    }
    let length = match headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("Content-Length"))
    {
        Some((_, value)) => value
            .parse::<usize>()
            .map_err(|_| Error::Malformed(format!("bad Content-Length '{value}'")))?,
        None => 0,
    };
    if length > MAX_BODY {
        return Err(Error::TooLarge(length));
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;
    Ok(Some(HttpRequest {
        method,
        path,
        headers,
        body,
    }))
}

/// A line without its terminator, or `None` at end of stream.
fn read_line(reader: &mut impl BufRead) -> Result<Option<String>, Error> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_HEADER_LINE as u64)
        .read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        return Err(Error::Malformed("header line too long or truncated".to_string()));
    }
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|_| Error::Malformed("header is not UTF-8".to_string()))
}

fn wants_close(request: &HttpRequest) -> bool {
    request
        .header("Connection")
        .is_some_and(|c| c.eq_ignore_ascii_case("close"))
}

/// The listening server. Dropping it leaves the accept thread running.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    accept: JoinHandle<()>,
}

impl Server {
    /// Binds and starts accepting on a background thread.
    pub fn bind<A: ToSocketAddrs + std::fmt::Display>(
        addr: A,
        service: Arc<Service>,
        routes: Arc<Routes>,
    ) -> Result<Server, Error> {
        let listener = TcpListener::bind(&addr).map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        let accept = std::thread::Builder::new()
            .name("duplocloud-mcp-http".to_string())
            .spawn(move || accept_loop(listener, service, routes))?;
        Ok(Server { local_addr, accept })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Blocks for as long as the server accepts connections.
    pub fn join(self) -> Result<(), Error> {
        self.accept
            .join()
            .map_err(|_| Error::Io(std::io::Error::other("accept thread panicked")))
    }
}

fn accept_loop(listener: TcpListener, service: Arc<Service>, routes: Arc<Routes>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                logwise::warn_sync!(
                    "accept failed: {error}",
                    error = logwise::privacy::LogIt(&e)
                );
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let service = service.clone();
        let routes = routes.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("duplocloud-mcp-http-{peer}"))
            .spawn(move || {
                if let Err(e) = serve_connection(stream, &service, &routes) {
                    logwise::warn_sync!(
                        "connection {peer} failed: {error}",
                        peer = logwise::privacy::LogIt(&peer),
                        error = logwise::privacy::LogIt(&e)
                    );
                }
            });
        if let Err(e) = spawned {
            logwise::error_sync!(
                "cannot spawn connection thread: {error}",
                error = logwise::privacy::LogIt(&e)
            );
        }
    }
}

fn serve_connection(stream: TcpStream, service: &Service, routes: &Routes) -> Result<(), Error> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    loop {
        let request = match read_request(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(Error::Io(e)) => return Err(Error::Io(e)),
            Err(e) => {
                let status = if matches!(e, Error::TooLarge(_)) { 413 } else { 400 };
                HttpResponse::text(status, &e.to_string()).write_to(&mut writer, true)?;
                return Err(e);
            }
        };
        let close = wants_close(&request);
        respond(service, routes, &request).write_to(&mut writer, close)?;
        if close {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_framed_requests_back_to_back() {
        let raw = b"POST /mcp?x=1 HTTP/1.1\r\nHost: a\r\ncontent-length: 2\r\n\r\n{}GET /health HTTP/1.1\r\n\r\n";
        let mut reader = Cursor::new(&raw[..]);
        let first = read_request(&mut reader).unwrap().unwrap();
        assert_eq!(first.method, "POST");
        assert_eq!(first.path, "/mcp");
        assert_eq!(first.body, b"{}");
        assert_eq!(first.header("HOST"), Some("a"));
        let second = read_request(&mut reader).unwrap().unwrap();
        assert_eq!(second.path, "/health");
        assert!(second.body.is_empty());
        assert!(read_request(&mut reader).unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_requests() {
        let mut reader = Cursor::new(&b"GARBAGE\r\n\r\n"[..]);
        assert!(matches!(read_request(&mut reader), Err(Error::Malformed(_))));
        let mut reader = Cursor::new(&b"POST /mcp HTTP/1.1\r\nContent-Length: x\r\n\r\n"[..]);
        assert!(matches!(read_request(&mut reader), Err(Error::Malformed(_))));
        let mut reader = Cursor::new(&b"POST /mcp HTTP/1.1\r\nContent-Length: 99999999999\r\n\r\n"[..]);
        assert!(matches!(read_request(&mut reader), Err(Error::TooLarge(_))));
    }

    #[test]
    fn header_count_is_capped() {
        let request = |count: usize| {
            let mut raw = String::from("GET /health HTTP/1.1\r\n");
            for i in 0..count {
                raw.push_str(&format!("X-Filler-{i}: a\r\n"));
            }
            raw.push_str("\r\n");
            raw
        };
        let mut reader = Cursor::new(request(MAX_HEADERS).into_bytes());
        assert_eq!(read_request(&mut reader).unwrap().unwrap().headers.len(), MAX_HEADERS);
        let mut reader = Cursor::new(request(MAX_HEADERS + 1).into_bytes());
        match read_request(&mut reader) {
            Err(Error::Malformed(message)) => assert!(message.contains("headers"), "{message}"),
            other => panic!("expected a malformed request, got {other:?}"),
        }
    }

    #[test]
    fn responses_are_framed() {
        let mut out = Vec::new();
        HttpResponse::json(200, &serde_json::json!({"a": 1}))
            .write_to(&mut out, false)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 7\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let handler: RouteHandler = Arc::new(|_: &HttpRequest, _: &Context| HttpResponse::empty(200));
        let mut routes = Routes::new();
        routes.add(Route::new("/health", &["GET"], handler.clone())).unwrap();
        assert!(routes.add(Route::new("/health", &["GET"], handler.clone())).is_err());
        assert!(routes.add(Route::new(MCP_PATH, &["GET"], handler)).is_err());
        assert_eq!(routes.paths(), vec!["/health".to_string()]);
    }
}
