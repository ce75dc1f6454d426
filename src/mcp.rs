//! MCP method dispatch.
//!
//! A [`Service`] owns the finished tool table and the shared [`Context`] and answers JSON-RPC
//! messages. Both transports feed it raw bytes through [`Service::handle_bytes`].

use crate::context::Context;
use crate::jrpc::{Notification, Request, Response};
use std::sync::Arc;
use tools::ToolTable;

pub mod resources;
pub mod tools;

/// MCP revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Name reported in `serverInfo` and by the health check.
pub const SERVER_NAME: &str = "duplocloud-mcp";

/// Answers MCP requests against one tool table.
#[derive(Debug)]
pub struct Service {
    tools: ToolTable,
    ctx: Arc<Context>,
}

impl Service {
    pub fn new(tools: ToolTable, ctx: Arc<Context>) -> Self {
        Service { tools, ctx }
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Parses one message and answers it.
    ///
    /// Returns `None` for notifications. Bytes that are neither a request nor a notification get
    /// a parse error with a null id.
    ///
    /// ```
    /// # use duplocloud_mcp::catalog::Catalog;
    /// # use duplocloud_mcp::config::ServerConfig;
    /// # use duplocloud_mcp::dispatch::{DispatchFailure, Invocation, Reply};
    /// # use duplocloud_mcp::server::Server;
    /// # use std::sync::Arc;
    /// # let dispatcher = |_: &Invocation| -> Result<Reply, DispatchFailure> { Ok(Reply::Empty) };
    /// # let server = Server::build(ServerConfig::default(), Arc::new(Catalog::builtin().unwrap()), Arc::new(dispatcher)).unwrap();
    /// let service = server.service();
    /// let pong = service.handle_bytes(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
    /// assert_eq!(pong.result, Some(serde_json::json!({})));
    ///
    /// assert!(service.handle_bytes(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).is_none());
    ///
    /// let garbage = service.handle_bytes(b"{not json").unwrap();
    /// assert_eq!(garbage.error.unwrap().code, -32700);
    /// ```
    pub fn handle_bytes(&self, bytes: &[u8]) -> Option<Response<serde_json::Value>> {
        if let Ok(request) = serde_json::from_slice::<Request>(bytes) {
            return Some(self.handle(request));
        }
        match serde_json::from_slice::<Notification>(bytes) {
            Ok(notification) => {
                self.notify(notification);
                None
            }
            Err(e) => {
                logwise::warn_sync!(
                    "unparseable message: {error}",
                    error = logwise::privacy::LogIt(&e)
                );
                Some(Response::err(
                    crate::jrpc::Error::parse_error(),
                    serde_json::Value::Null,
                ))
            }
        }
    }

    /// Answers one request.
    pub fn handle(&self, request: Request) -> Response<serde_json::Value> {
        match request.method.as_str() {
            "initialize" => initialize(request).erase(),
            "ping" => Response::new(serde_json::json!({}), request.id),
            "tools/list" => tools::list(&self.tools, request).erase(),
            "tools/call" => tools::call(&self.tools, &self.ctx, request).erase(),
            "resources/list" => resources::list(self.tools.resources(), request).erase(),
            "resources/templates/list" => {
                resources::templates(self.tools.resources(), request).erase()
            }
            "resources/read" => resources::read(self.tools.resources(), &self.ctx, request).erase(),
            _ => {
                logwise::info_sync!(
                    "method not found: {method}",
                    method = logwise::privacy::LogIt(&request.method)
                );
                Response::err(crate::jrpc::Error::method_not_found(), request.id)
            }
        }
    }

    fn notify(&self, notification: Notification) {
        logwise::info_sync!(
            "notification {method}",
            method = logwise::privacy::LogIt(&notification.method)
        );
    }
}

fn initialize(request: Request) -> Response<InitializeResult> {
    Response::new(InitializeResult::new(), request.id)
}

#[derive(Debug, serde::Serialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: &'static str,
    capabilities: serde_json::Value,
    #[serde(rename = "serverInfo")]
    server_info: serde_json::Value,
}

impl InitializeResult {
    fn new() -> Self {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION,
            capabilities: serde_json::json!({
                "tools": {"listChanged": false},
                "resources": {"listChanged": false, "subscribe": false},
            }),
            server_info: serde_json::json!({
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::ServerConfig;
    use crate::dispatch::{DispatchFailure, Invocation, Reply};
    use crate::server::Server;
    use serde_json::json;

    fn service() -> Server {
        let dispatcher = |call: &Invocation| -> Result<Reply, DispatchFailure> {
            Ok(Reply::Json(json!({"argv": call.argv()})))
        };
        let config = ServerConfig {
            resource_filter: "tenant".into(),
            command_filter: "list|find".into(),
            ..ServerConfig::default()
        };
        Server::build(config, Arc::new(Catalog::builtin().unwrap()), Arc::new(dispatcher)).unwrap()
    }

    fn call(server: &Server, method: &str, params: serde_json::Value) -> Response<serde_json::Value> {
        server.service().handle(Request::new(method, Some(params), json!(1)))
    }

    #[test]
    fn initialize_reports_capabilities() {
        let server = service();
        let response = call(&server, "initialize", json!({}));
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "duplocloud-mcp");
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[test]
    fn unknown_method() {
        let server = service();
        let response = call(&server, "prompts/list", json!({}));
        assert_eq!(response.error.unwrap().code, -32601);
        assert_eq!(response.id, json!(1));
    }

    #[test]
    fn resources_and_templates_are_listed_separately() {
        let server = service();
        let list = call(&server, "resources/list", json!({})).result.unwrap();
        assert_eq!(list["resources"][0]["uri"], "duplo://tenant/list");
        assert_eq!(list["resources"].as_array().unwrap().len(), 1);
        let templates = call(&server, "resources/templates/list", json!({})).result.unwrap();
        assert_eq!(
            templates["resourceTemplates"][0]["uriTemplate"],
            "duplo://tenant/find/{name}"
        );
    }

    #[test]
    fn reading_a_template_binds_the_path() {
        let server = service();
        let read = call(&server, "resources/read", json!({"uri": "duplo://tenant/find/dev"}));
        let result = read.result.unwrap();
        let contents = &result["contents"][0];
        assert_eq!(contents["uri"], "duplo://tenant/find/dev");
        let text: serde_json::Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
        assert_eq!(text, json!({"argv": ["tenant", "find", "dev"]}));

        let missing = call(&server, "resources/read", json!({"uri": "duplo://hosts/list"}));
        assert_eq!(missing.error.unwrap().code, -32002);
    }

    #[test]
    fn tool_call_without_params() {
        let server = service();
        let response = server
            .service()
            .handle(Request::new("tools/call", None, json!("x")));
        assert_eq!(response.error.unwrap().code, -32602);
    }
}
