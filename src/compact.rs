//! Compact mode: three fixed tools instead of one per command.
//!
//! A client discovers resources with `resources`, learns a command's arguments with `explain`,
//! and runs it with `execute`. All three apply the same filter as expanded registration, at call
//! time, so nothing hidden from the listing can be explained or executed.

use crate::config::ToolMode;
use crate::context::Context;
use crate::custom::CustomTool;
use crate::docstring;
use crate::error::Error;
use crate::filter::FilterRule;
use crate::mcp::tools::{Argument, InputSchema};
use crate::registry::{ArgKind, CommandDescriptor, CommandRegistry};
use crate::schema;
use crate::wrapper::{self, Arguments};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// `{"resources": [...]}`: resources with at least one admitted command, sorted.
pub fn resources(ctx: &Context) -> Value {
    json!({ "resources": ctx.resources() })
}

/// Describes a resource's commands, or one command in detail.
pub fn explain(ctx: &Context, resource: &str, command: Option<&str>) -> Result<Value, Error> {
    let admitted = admitted_resource(ctx, resource)?;
    let Some(command) = command else {
        let commands: BTreeMap<&str, Value> = admitted
            .iter()
            .map(|d| {
                let doc = docstring::render(d.raw_doc(), d.resource());
                (
                    d.name(),
                    json!({"summary": docstring::summary(&doc), "aliases": d.aliases()}),
                )
            })
            .collect();
        return Ok(json!({"resource": resource, "commands": commands}));
    };
    let descriptor = admitted
        .iter()
        .find(|d| d.answers_to(command))
        .ok_or_else(|| unknown_command(resource, command, &admitted))?;
    let detail = schema::command_detail(ctx.registry(), descriptor)?;
    serde_json::to_value(detail).map_err(|e| Error::Normalization(e.to_string()))
}

/// Arguments of the `execute` tool.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteRequest {
    pub resource: String,
    pub command: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Extra positional arguments, after `name`.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub wait: bool,
}

/// Runs one command through the same dispatch path as the expanded tools.
///
/// `query`, `output` and `wait` belong to this invocation only.
pub fn execute(ctx: &Context, request: &ExecuteRequest) -> Result<Value, Error> {
    let ExecuteRequest {
        resource, command, ..
    } = request;
    if !ctx.registry().has_resource(resource) {
        return Err(Error::Lookup(format!("Resource '{resource}' not found.")));
    }
    if !ctx.filter().admits_resource(resource) {
        return Err(Error::Lookup(format!(
            "Resource '{resource}' is not allowed by the resource filter."
        )));
    }
    let descriptor = ctx.registry().lookup(resource, command).ok_or_else(|| {
        unknown_command(resource, command, &ctx.admitted_commands(resource))
    })?;
    // checked on the canonical name so an alias cannot slip past the filter
    if !ctx.filter().admits_command(descriptor.name()) {
        return Err(Error::Lookup(format!(
            "Command '{command}' is not allowed by the command filter."
        )));
    }

    let mut bound = Arguments::new();
    let mut extra = Vec::new();
    if let Some(name) = &request.name {
        match first_positional(descriptor) {
            Some(param) => {
                bound.insert(param.to_string(), name.clone().into());
            }
            None => extra.push(name.clone()),
        }
    }
    if let Some(body) = &request.body {
        let param = descriptor
            .caller_args()
            .find(|a| a.kind == ArgKind::Body)
            .ok_or_else(|| {
                Error::InvalidArguments(format!(
                    "Command '{resource} {}' does not take a body.",
                    descriptor.name()
                ))
            })?;
        bound.insert(param.name.clone(), body.clone());
    }
    let mut invocation = wrapper::marshal_with(ctx.registry(), descriptor, &bound, false)?;
    for name in extra {
        invocation.positionals.push(wrapper::cli_text("name", &name)?);
    }
    for arg in &request.args {
        invocation.positionals.push(wrapper::cli_text("args", arg)?);
    }
    invocation.query = request.query.as_deref().map(|q| wrapper::cli_text("query", q)).transpose()?;
    invocation.output = request.output.as_deref().map(|o| wrapper::cli_text("output", o)).transpose()?;
    invocation.wait = request.wait;
    wrapper::invoke(ctx, &invocation)
}

/// Checks every admitted command's schema, so a broken model stops compact startup just as it
/// stops expanded registration.
pub fn validate(registry: &dyn CommandRegistry, filter: &FilterRule) -> Result<(), Error> {
    for descriptor in registry.descriptors() {
        if filter.admits(descriptor.resource(), descriptor.name()) {
            schema::input_schema(registry, descriptor).map_err(Error::at_startup)?;
        }
    }
    Ok(())
}

/// The three compact tools, each limited to [`ToolMode::Compact`].
pub fn tools() -> Vec<CustomTool> {
    vec![resources_tool(), explain_tool(), execute_tool()]
}

fn admitted_resource<'a>(ctx: &'a Context, resource: &str) -> Result<Vec<&'a Arc<CommandDescriptor>>, Error> {
    if !ctx.registry().has_resource(resource) {
        return Err(Error::Lookup(format!("Resource '{resource}' not found.")));
    }
    if !ctx.filter().admits_resource(resource) {
        return Err(Error::Lookup(format!(
            "Resource '{resource}' is not allowed by the resource filter."
        )));
    }
    let admitted = ctx.admitted_commands(resource);
    if admitted.is_empty() {
        return Err(Error::Lookup(format!(
            "No command of resource '{resource}' is allowed by the command filter."
        )));
    }
    Ok(admitted)
}

fn unknown_command(resource: &str, command: &str, admitted: &[&Arc<CommandDescriptor>]) -> Error {
    let available: Vec<&str> = admitted.iter().map(|d| d.name()).collect();
    Error::Lookup(format!(
        "Command '{command}' not found on resource '{resource}'. Available: {}",
        available.join(", ")
    ))
}

fn first_positional(descriptor: &CommandDescriptor) -> Option<&str> {
    descriptor
        .caller_args()
        .find(|a| a.kind == ArgKind::Positional)
        .map(|a| a.name.as_str())
}

fn string_arg<'a>(args: &'a Arguments, name: &str) -> Result<Option<&'a str>, Error> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::InvalidArguments(format!(
            "'{name}' must be a string, got {other}"
        ))),
    }
}

fn resources_tool() -> CustomTool {
    CustomTool::new(
        "resources",
        "List available DuploCloud resources.\n\nReturns the names of all resources that match the server's resource filter. Use these names with the explain and execute tools.",
        InputSchema::new(Vec::new()),
        Arc::new(|_: &Arguments, ctx: &Context| -> Result<Value, Error> { Ok(resources(ctx)) }),
    )
    .only_in(ToolMode::Compact)
}

fn explain_tool() -> CustomTool {
    let schema = InputSchema::new(vec![
        Argument::new(
            "resource".to_string(),
            "string".to_string(),
            "The resource name (e.g. \"tenant\", \"service\").".to_string(),
            true,
        ),
        Argument::new(
            "command".to_string(),
            "string".to_string(),
            "Optional specific command to get detailed argument info for.".to_string(),
            false,
        ),
    ]);
    CustomTool::new(
        "explain",
        "Explain a DuploCloud resource's commands, arguments, and body schema.\n\nWithout a command, returns all commands available on the resource. With a command, returns detailed argument info including body model fields. Use this to understand what arguments the execute tool expects.",
        schema,
        Arc::new(|args: &Arguments, ctx: &Context| -> Result<Value, Error> {
            if let Some(unknown) = args.keys().find(|k| *k != "resource" && *k != "command") {
                return Err(Error::InvalidArguments(format!(
                    "unexpected argument '{unknown}' for explain"
                )));
            }
            let resource = string_arg(args, "resource")?.ok_or_else(|| {
                Error::InvalidArguments("missing required argument 'resource' for explain".to_string())
            })?;
            explain(ctx, resource, string_arg(args, "command")?)
        }),
    )
    .only_in(ToolMode::Compact)
}

fn execute_tool() -> CustomTool {
    let schema = InputSchema::new(vec![
        Argument::new(
            "resource".to_string(),
            "string".to_string(),
            "The resource kind (e.g. \"tenant\", \"service\").".to_string(),
            true,
        ),
        Argument::new(
            "command".to_string(),
            "string".to_string(),
            "The command to run (e.g. \"create\", \"find\", \"list\").".to_string(),
            true,
        ),
        Argument::new(
            "name".to_string(),
            "string".to_string(),
            "The resource name, passed as the first positional argument.".to_string(),
            false,
        ),
        Argument::new(
            "args".to_string(),
            "array".to_string(),
            "Additional positional arguments. Most commands do not need this; use explain to check."
                .to_string(),
            false,
        )
        .keyword("items", json!({"type": "string"})),
        Argument::new(
            "body".to_string(),
            "object".to_string(),
            "Request body for create and update commands. Use explain to see the model fields."
                .to_string(),
            false,
        ),
        Argument::new(
            "query".to_string(),
            "string".to_string(),
            "A JMESPath expression to filter the command output.".to_string(),
            false,
        ),
        Argument::new(
            "output".to_string(),
            "string".to_string(),
            "Output format override: json, yaml or string.".to_string(),
            false,
        ),
        Argument::new(
            "wait".to_string(),
            "boolean".to_string(),
            "Wait for the operation to complete before returning.".to_string(),
            false,
        )
        .keyword("default", json!(false)),
    ]);
    CustomTool::new(
        "execute",
        "Execute a DuploCloud command. Use the explain tool first to understand what arguments a command expects.",
        schema,
        Arc::new(|args: &Arguments, ctx: &Context| -> Result<Value, Error> {
            let request: ExecuteRequest = serde_json::from_value(Value::Object(args.clone()))
                .map_err(|e| Error::InvalidArguments(e.to_string()))?;
            execute(ctx, &request)
        }),
    )
    .only_in(ToolMode::Compact)
}
