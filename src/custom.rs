//! Custom tools and HTTP routes.
//!
//! Besides the tools generated from commands, the server carries hand-written registrations: the
//! `config` tool, the compact tools, and the `/config` and `/health` routes. Each may be limited
//! to one [`ToolMode`]; the selection happens once, at startup.

use crate::config::ToolMode;
use crate::context::Context;
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse, Route, RouteHandler, Routes};
use crate::mcp::SERVER_NAME;
use crate::mcp::tools::{InputSchema, ToolEntry, ToolTable};
use crate::wrapper::{Arguments, Handler};
use serde_json::Value;
use std::sync::Arc;

/// A hand-written tool.
#[derive(Clone)]
pub struct CustomTool {
    name: String,
    description: String,
    input_schema: InputSchema,
    handler: Handler,
    mode: Option<ToolMode>,
}

impl CustomTool {
    pub fn new(name: &str, description: &str, input_schema: InputSchema, handler: Handler) -> Self {
        CustomTool {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            handler,
            mode: None,
        }
    }

    /// Installs the tool only in `mode`.
    pub fn only_in(mut self, mode: ToolMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Option<ToolMode> {
        self.mode
    }

    fn applies(&self, active: ToolMode) -> bool {
        self.mode.is_none_or(|m| m == active)
    }
}

/// A hand-written HTTP route.
#[derive(Clone)]
pub struct CustomRoute {
    path: String,
    methods: Vec<String>,
    handler: RouteHandler,
    mode: Option<ToolMode>,
}

impl CustomRoute {
    pub fn new(path: &str, methods: &[&str], handler: RouteHandler) -> Self {
        CustomRoute {
            path: path.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            handler,
            mode: None,
        }
    }

    pub fn only_in(mut self, mode: ToolMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn applies(&self, active: ToolMode) -> bool {
        self.mode.is_none_or(|m| m == active)
    }
}

/// The set of custom tools and routes a server is built with.
///
/// ```
/// use duplocloud_mcp::config::ToolMode;
/// use duplocloud_mcp::custom::CustomRegistrations;
/// use duplocloud_mcp::http::Routes;
/// use duplocloud_mcp::mcp::tools::ToolTable;
///
/// let mut tools = ToolTable::new();
/// let mut routes = Routes::new();
/// CustomRegistrations::builtin()
///     .install(ToolMode::Expanded, &mut tools, &mut routes)
///     .unwrap();
/// assert_eq!(tools.tool_names(), vec!["config".to_string()]);
/// assert_eq!(routes.paths(), vec!["/config".to_string(), "/health".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct CustomRegistrations {
    tools: Vec<CustomTool>,
    routes: Vec<CustomRoute>,
}

impl CustomRegistrations {
    /// No registrations at all.
    pub fn new() -> Self {
        CustomRegistrations::default()
    }

    /// `config` in every mode, the compact tools in compact mode, and `/config` and `/health`.
    pub fn builtin() -> Self {
        let mut registrations = CustomRegistrations::new()
            .tool(config_tool())
            .route(config_route())
            .route(health_route());
        for tool in crate::compact::tools() {
            registrations = registrations.tool(tool);
        }
        registrations
    }

    pub fn tool(mut self, tool: CustomTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn route(mut self, route: CustomRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Installs the registrations that apply to `mode`. A name or path that is already taken is a
    /// configuration error.
    pub fn install(&self, mode: ToolMode, tools: &mut ToolTable, routes: &mut Routes) -> Result<(), Error> {
        for tool in self.tools.iter().filter(|t| t.applies(mode)) {
            tools.add_tool(ToolEntry::new(
                &tool.name,
                &tool.description,
                tool.input_schema.clone(),
                tool.handler.clone(),
            ))?;
            logwise::info_sync!(
                "registered custom tool {tool}",
                tool = logwise::privacy::LogIt(&tool.name)
            );
        }
        for route in self.routes.iter().filter(|r| r.applies(mode)) {
            let methods: Vec<&str> = route.methods.iter().map(String::as_str).collect();
            routes.add(Route::new(&route.path, &methods, route.handler.clone()))?;
        }
        Ok(())
    }
}

/// The configuration summary shown by the `config` tool and `GET /config`.
///
/// Connection details come from the dispatcher and never include the token itself.
pub fn build_config(ctx: &Context) -> Value {
    let mut config = ctx.dispatcher().describe();
    config.insert("AvailableResources".to_string(), ctx.resources().into());
    config.insert("Tools".to_string(), ctx.tool_names().into());
    config.insert("MCP".to_string(), ctx.config().mcp_summary());
    Value::Object(config)
}

/// `{"status": "healthy", "service": "duplocloud-mcp"}`.
pub fn health() -> Value {
    serde_json::json!({"status": "healthy", "service": SERVER_NAME})
}

fn config_tool() -> CustomTool {
    CustomTool::new(
        "config",
        "Display current MCP server configuration.\n\nReturns the DuploCloud connection info, active filters, and the list of registered tools.",
        InputSchema::new(Vec::new()),
        Arc::new(|_: &Arguments, ctx: &Context| -> Result<Value, Error> { Ok(build_config(ctx)) }),
    )
}

fn config_route() -> CustomRoute {
    CustomRoute::new(
        "/config",
        &["GET"],
        Arc::new(|_: &HttpRequest, ctx: &Context| HttpResponse::json(200, &build_config(ctx))),
    )
}

fn health_route() -> CustomRoute {
    CustomRoute::new(
        "/health",
        &["GET"],
        Arc::new(|_: &HttpRequest, _: &Context| HttpResponse::json(200, &health())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::{Credentials, ServerConfig};
    use crate::duploctl::Duploctl;
    use rstest::rstest;

    #[rstest]
    #[case(ToolMode::Expanded, vec!["config"])]
    #[case(ToolMode::Compact, vec!["config", "execute", "explain", "resources"])]
    fn builtin_tools_follow_the_mode(#[case] mode: ToolMode, #[case] expected: Vec<&str>) {
        let mut tools = ToolTable::new();
        let mut routes = Routes::new();
        CustomRegistrations::builtin()
            .install(mode, &mut tools, &mut routes)
            .unwrap();
        assert_eq!(tools.tool_names(), expected);
        assert_eq!(routes.paths().len(), 2);
    }

    #[test]
    fn custom_tools_can_collide() {
        let mut tools = ToolTable::new();
        let mut routes = Routes::new();
        let registrations = CustomRegistrations::builtin().tool(config_tool());
        let err = registrations
            .install(ToolMode::Expanded, &mut tools, &mut routes)
            .unwrap_err();
        assert!(err.message().contains("'config'"));
    }

    #[test]
    fn config_dump_shape() {
        let credentials = Credentials {
            host: Some("https://portal.example.com".into()),
            token: Some("s3cret".into()),
            tenant: Some("dev".into()),
        };
        let config = ServerConfig {
            resource_filter: "tenant|service".into(),
            credentials: credentials.clone(),
            ..ServerConfig::default()
        };
        let ctx = Context::new(
            config,
            Arc::new(Catalog::builtin().unwrap()),
            Arc::new(Duploctl::new("duploctl", credentials)),
        )
        .unwrap()
        .with_tools(vec!["tenant_list".into(), "config".into()]);
        let dump = build_config(&ctx);
        assert_eq!(dump["Host"], "https://portal.example.com");
        assert_eq!(dump["HasToken"], true);
        assert_eq!(dump["AvailableResources"], serde_json::json!(["service", "tenant"]));
        assert_eq!(dump["Tools"], serde_json::json!(["config", "tenant_list"]));
        assert_eq!(dump["MCP"]["resource_filter"], "tenant|service");
        assert!(!dump.to_string().contains("s3cret"));
    }
}
