//! Expanded-mode registration: one tool per admitted command.

use crate::docstring;
use crate::error::Error;
use crate::filter::FilterRule;
use crate::mcp::resources::ResourceEntry;
use crate::mcp::tools::{InputSchema, ToolEntry, ToolTable};
use crate::registry::{ArgKind, CommandDescriptor, CommandRegistry};
use crate::schema;
use crate::wrapper::{self, Handler};
use std::sync::Arc;

/// A command turned into a tool, before and after it is handed to the tool table.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    input_schema: InputSchema,
    handler: Handler,
    read_only: bool,
    command: Arc<CommandDescriptor>,
}

impl ToolDescriptor {
    /// Builds the tool for a command. A model that cannot be described is fatal here.
    pub fn for_command(
        registry: &dyn CommandRegistry,
        command: Arc<CommandDescriptor>,
    ) -> Result<ToolDescriptor, Error> {
        let input_schema = schema::input_schema(registry, &command).map_err(Error::at_startup)?;
        Ok(ToolDescriptor {
            name: command.tool_name(),
            description: docstring::render(command.raw_doc(), command.resource()),
            input_schema,
            handler: wrapper::build_handler(command.clone()),
            read_only: command.is_read_only(),
            command,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &InputSchema {
        &self.input_schema
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn command(&self) -> &CommandDescriptor {
        &self.command
    }

    pub fn tool_entry(&self) -> ToolEntry {
        ToolEntry::new(
            &self.name,
            &self.description,
            self.input_schema.clone(),
            self.handler.clone(),
        )
    }

    /// The resource registration of a read-only command. It shares the tool's handler.
    pub fn resource_entry(&self) -> ResourceEntry {
        let params = self
            .command
            .caller_args()
            .filter(|a| a.required && a.kind != ArgKind::Body)
            .map(|a| a.name.clone())
            .collect();
        ResourceEntry::new(
            self.command.resource(),
            self.command.name(),
            &self.name,
            &docstring::summary(&self.description),
            params,
            self.handler.clone(),
        )
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

/// Registers every admitted command, in `(resource, command)` order.
///
/// Read-only commands are registered a second time as MCP resources. A name that is already
/// taken in `sink`, by another command or by a custom tool, stops registration with a
/// [`Error::Configuration`].
///
/// ```
/// use duplocloud_mcp::catalog::Catalog;
/// use duplocloud_mcp::filter::FilterRule;
/// use duplocloud_mcp::mcp::tools::ToolTable;
/// use duplocloud_mcp::registrar::register_all;
///
/// let catalog = Catalog::builtin().unwrap();
/// let filter = FilterRule::new("tenant", "list|find").unwrap();
/// let mut table = ToolTable::new();
/// let tools = register_all(&catalog, &filter, &mut table).unwrap();
/// assert_eq!(tools.len(), 2);
/// assert_eq!(table.tool_names(), vec!["tenant_find", "tenant_list"]);
/// assert_eq!(table.resources().len(), 2);
/// ```
pub fn register_all(
    registry: &dyn CommandRegistry,
    filter: &FilterRule,
    sink: &mut ToolTable,
) -> Result<Vec<ToolDescriptor>, Error> {
    let mut commands: Vec<&Arc<CommandDescriptor>> = registry.descriptors().iter().collect();
    commands.sort_by(|a, b| (a.resource(), a.name()).cmp(&(b.resource(), b.name())));
    let mut registered = Vec::new();
    for command in commands {
        if !filter.admits(command.resource(), command.name()) {
            logwise::info_sync!(
                "skipping {tool}: excluded by filter",
                tool = logwise::privacy::LogIt(&command.tool_name())
            );
            continue;
        }
        let tool = ToolDescriptor::for_command(registry, command.clone())?;
        sink.add_tool(tool.tool_entry())?;
        if tool.is_read_only() {
            sink.add_resource(tool.resource_entry())?;
        }
        logwise::info_sync!(
            "registered {tool}: {summary}",
            tool = logwise::privacy::LogIt(&tool.name()),
            summary = logwise::privacy::LogIt(&docstring::summary(tool.description()))
        );
        registered.push(tool);
    }
    Ok(registered)
}
