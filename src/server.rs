//! Startup: registration, context, transport.

use crate::compact;
use crate::config::{ServerConfig, ToolMode, Transport};
use crate::context::Context;
use crate::custom::CustomRegistrations;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::http::{self, MCP_PATH, Routes};
use crate::mcp::Service;
use crate::mcp::tools::ToolTable;
use crate::registrar;
use crate::registry::CommandRegistry;
use crate::stdio;
use std::sync::Arc;

/// A fully registered server, ready to run on its configured transport.
#[derive(Debug)]
pub struct Server {
    service: Arc<Service>,
    routes: Arc<Routes>,
    config: ServerConfig,
}

impl Server {
    /// Builds a server with the built-in custom registrations.
    pub fn build(
        config: ServerConfig,
        registry: Arc<dyn CommandRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Server, Error> {
        Server::build_with(config, registry, dispatcher, CustomRegistrations::builtin())
    }

    /// Builds a server with an explicit set of custom registrations.
    ///
    /// In expanded mode every admitted command becomes a tool; in compact mode the admitted
    /// schemas are only checked. Custom registrations are installed after the commands, so a
    /// custom tool cannot shadow a command tool.
    ///
    /// ```
    /// use duplocloud_mcp::catalog::Catalog;
    /// use duplocloud_mcp::config::{ServerConfig, ToolMode};
    /// use duplocloud_mcp::custom::CustomRegistrations;
    /// use duplocloud_mcp::dispatch::{DispatchFailure, Invocation, Reply};
    /// use duplocloud_mcp::server::Server;
    /// use std::sync::Arc;
    ///
    /// let dispatcher = |_: &Invocation| -> Result<Reply, DispatchFailure> { Ok(Reply::Empty) };
    /// let config = ServerConfig { tool_mode: ToolMode::Compact, ..ServerConfig::default() };
    /// let server = Server::build_with(
    ///     config,
    ///     Arc::new(Catalog::builtin().unwrap()),
    ///     Arc::new(dispatcher),
    ///     CustomRegistrations::new(),
    /// )
    /// .unwrap();
    /// assert!(server.service().tools().is_empty());
    /// ```
    pub fn build_with(
        config: ServerConfig,
        registry: Arc<dyn CommandRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
        custom: CustomRegistrations,
    ) -> Result<Server, Error> {
        let filter = config.filter()?;
        let mut tools = ToolTable::new();
        let mut routes = Routes::new();
        match config.tool_mode {
            ToolMode::Expanded => {
                registrar::register_all(registry.as_ref(), &filter, &mut tools)?;
            }
            ToolMode::Compact => compact::validate(registry.as_ref(), &filter)?,
        }
        custom.install(config.tool_mode, &mut tools, &mut routes)?;
        let ctx = Context::new(config.clone(), registry, dispatcher)?.with_tools(tools.tool_names());
        logwise::info_sync!(
            "{count} tools registered in {mode} mode",
            count = logwise::privacy::LogIt(&tools.len()),
            mode = logwise::privacy::LogIt(&config.tool_mode)
        );
        Ok(Server {
            service: Arc::new(Service::new(tools, Arc::new(ctx))),
            routes: Arc::new(routes),
            config,
        })
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves until stdin closes, or for as long as the HTTP listener runs.
    pub fn run(self) -> Result<(), Error> {
        self.log_startup();
        match self.config.transport {
            Transport::Stdio => {
                let stdin = std::io::stdin();
                let stdout = std::io::stdout();
                stdio::serve(&self.service, stdin.lock(), stdout.lock())
                    .map_err(|e| Error::Configuration(format!("stdio transport failed: {e}")))
            }
            Transport::Http => {
                let server = self.listen(&self.config.bind_address())?;
                logwise::info_sync!(
                    "Server at http://{addr}{path}",
                    addr = logwise::privacy::LogIt(&server.local_addr()),
                    path = logwise::privacy::LogIt(&MCP_PATH)
                );
                server.join()?;
                Ok(())
            }
        }
    }

    /// Starts the HTTP transport on `addr` and returns without blocking.
    ///
    /// ```
    /// # use duplocloud_mcp::catalog::Catalog;
    /// # use duplocloud_mcp::config::ServerConfig;
    /// # use duplocloud_mcp::dispatch::{DispatchFailure, Invocation, Reply};
    /// # use duplocloud_mcp::server::Server;
    /// # use std::sync::Arc;
    /// # let dispatcher = |_: &Invocation| -> Result<Reply, DispatchFailure> { Ok(Reply::Empty) };
    /// let server = Server::build(ServerConfig::default(), Arc::new(Catalog::builtin().unwrap()), Arc::new(dispatcher)).unwrap();
    /// let listener = server.listen("127.0.0.1:0").unwrap();
    /// assert_ne!(listener.local_addr().port(), 0);
    /// ```
    pub fn listen(&self, addr: &str) -> Result<http::Server, Error> {
        Ok(http::Server::bind(addr, self.service.clone(), self.routes.clone())?)
    }

    fn log_startup(&self) {
        logwise::info_sync!(
            "{name} {version} on {os}/{arch}, {transport} transport",
            name = logwise::privacy::LogIt(&crate::mcp::SERVER_NAME),
            version = logwise::privacy::LogIt(&env!("CARGO_PKG_VERSION")),
            os = logwise::privacy::LogIt(&std::env::consts::OS),
            arch = logwise::privacy::LogIt(&std::env::consts::ARCH),
            transport = logwise::privacy::LogIt(&self.config.transport)
        );
        logwise::info_sync!(
            "tool mode: {mode}",
            mode = logwise::privacy::LogIt(&self.config.tool_mode)
        );
        let ctx = self.service.context();
        if !ctx.filter().is_default() {
            let (resources, commands) = ctx.filter().patterns();
            logwise::info_sync!(
                "filters: resources '{resources}', commands '{commands}'",
                resources = logwise::privacy::LogIt(&resources),
                commands = logwise::privacy::LogIt(&commands)
            );
        }
    }
}
