//! The per-process context handed to every handler.

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::filter::FilterRule;
use crate::registry::{CommandDescriptor, CommandRegistry};
use std::sync::Arc;

/// Everything a handler may need besides its own arguments.
///
/// Built once at startup, after the tool table is complete, and shared read-only afterwards.
/// Handlers receive it as an explicit argument; it never shows up in any input schema.
pub struct Context {
    config: ServerConfig,
    filter: FilterRule,
    registry: Arc<dyn CommandRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    resources: Vec<String>,
    tool_names: Vec<String>,
}

impl Context {
    /// Builds a context with no tools yet; see [`Context::with_tools`].
    ///
    /// ```
    /// use duplocloud_mcp::catalog::Catalog;
    /// use duplocloud_mcp::config::ServerConfig;
    /// use duplocloud_mcp::context::Context;
    /// use duplocloud_mcp::dispatch::{DispatchFailure, Invocation, Reply};
    /// use std::sync::Arc;
    ///
    /// let dispatcher = |_: &Invocation| -> Result<Reply, DispatchFailure> { Ok(Reply::Empty) };
    /// let config = ServerConfig { resource_filter: "tenant".into(), ..ServerConfig::default() };
    /// let ctx = Context::new(config, Arc::new(Catalog::builtin().unwrap()), Arc::new(dispatcher))
    ///     .unwrap()
    ///     .with_tools(vec!["config".to_string()]);
    /// assert_eq!(ctx.resources(), ["tenant".to_string()]);
    /// ```
    pub fn new(
        config: ServerConfig,
        registry: Arc<dyn CommandRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, Error> {
        let filter = config.filter()?;
        let resources = registry
            .resources()
            .into_iter()
            .filter(|r| {
                registry
                    .commands_for(r)
                    .iter()
                    .any(|d| filter.admits(d.resource(), d.name()))
            })
            .map(str::to_string)
            .collect();
        Ok(Context {
            config,
            filter,
            registry,
            dispatcher,
            resources,
            tool_names: Vec::new(),
        })
    }

    /// Records the final, registered tool names.
    pub fn with_tools(mut self, mut tool_names: Vec<String>) -> Self {
        tool_names.sort();
        self.tool_names = tool_names;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn filter(&self) -> &FilterRule {
        &self.filter
    }

    pub fn registry(&self) -> &dyn CommandRegistry {
        self.registry.as_ref()
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.dispatcher.as_ref()
    }

    /// Resources with at least one admitted command, sorted.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Registered tool names, sorted.
    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    /// Admitted commands of a resource, in registry order.
    pub fn admitted_commands(&self, resource: &str) -> Vec<&Arc<CommandDescriptor>> {
        self.registry
            .commands_for(resource)
            .into_iter()
            .filter(|d| self.filter.admits(d.resource(), d.name()))
            .collect()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("filter", &self.filter)
            .field("resources", &self.resources)
            .field("tool_names", &self.tool_names)
            .finish_non_exhaustive()
    }
}
