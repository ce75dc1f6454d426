//! Turning a command descriptor into a callable handler.
//!
//! A handler marshals the caller's JSON arguments into an [`Invocation`], hands it to the
//! dispatcher exactly once, and normalizes the reply into a JSON value. The compact `execute` tool
//! builds its invocation differently but finishes through the same [`invoke`].

use crate::context::Context;
use crate::dispatch::{CliOption, Invocation, Reply};
use crate::error::Error;
use crate::registry::{ArgKind, ArgSpec, CommandDescriptor, CommandRegistry};
use serde_json::Value;
use std::sync::Arc;

/// Caller-supplied tool arguments.
pub type Arguments = serde_json::Map<String, Value>;

/// A tool implementation. The context is passed explicitly on every call.
pub type Handler = Arc<dyn Fn(&Arguments, &Context) -> Result<Value, Error> + Send + Sync>;

/// Builds the handler for one command.
pub fn build_handler(descriptor: Arc<CommandDescriptor>) -> Handler {
    Arc::new(move |args: &Arguments, ctx: &Context| {
        let invocation = marshal(ctx.registry(), &descriptor, args)?;
        invoke(ctx, &invocation)
    })
}

/// Marshals arguments, requiring every required argument.
pub fn marshal(
    registry: &dyn CommandRegistry,
    descriptor: &CommandDescriptor,
    args: &Arguments,
) -> Result<Invocation, Error> {
    marshal_with(registry, descriptor, args, true)
}

/// Marshals arguments into an invocation, walking the signature in order.
///
/// Positional values are stringified (arrays expand into several values), options become
/// `--flag value` pairs with booleans as bare switches, and the body is passed through with
/// model field names replaced by their wire aliases. `null` counts as absent.
///
/// ```
/// use duplocloud_mcp::catalog::Catalog;
/// use duplocloud_mcp::registry::{ArgSpec, ArgType, CommandDescriptor};
/// use duplocloud_mcp::wrapper::marshal_with;
/// use serde_json::json;
///
/// let catalog = Catalog::builder()
///     .command(
///         CommandDescriptor::new("service", "logs")
///             .arg(ArgSpec::positional("name", ArgType::String).required())
///             .arg(ArgSpec::option("tail", ArgType::Integer))
///             .arg(ArgSpec::option("follow", ArgType::Boolean)),
///     )
///     .build()
///     .unwrap();
/// let logs = catalog.lookup_command("service", "logs").unwrap();
/// let args = json!({"name": "api", "tail": 20, "follow": true});
/// let call = marshal_with(&catalog, logs, args.as_object().unwrap(), true).unwrap();
/// assert_eq!(call.argv(), vec!["service", "logs", "api", "--tail", "20", "--follow"]);
///
/// let missing = json!({"tail": 20});
/// assert!(marshal_with(&catalog, logs, missing.as_object().unwrap(), true).is_err());
/// ```
pub fn marshal_with(
    registry: &dyn CommandRegistry,
    descriptor: &CommandDescriptor,
    args: &Arguments,
    enforce_required: bool,
) -> Result<Invocation, Error> {
    if let Some(unknown) = args
        .keys()
        .find(|k| !descriptor.caller_args().any(|a| &a.name == *k))
    {
        return Err(Error::InvalidArguments(format!(
            "unexpected argument '{unknown}' for {}",
            descriptor.tool_name()
        )));
    }
    let mut invocation = Invocation::new(descriptor.resource(), descriptor.name());
    for spec in descriptor.caller_args() {
        let value = match args.get(&spec.name) {
            Some(Value::Null) | None => {
                if enforce_required && spec.required {
                    return Err(Error::InvalidArguments(format!(
                        "missing required argument '{}' for {}",
                        spec.name,
                        descriptor.tool_name()
                    )));
                }
                continue;
            }
            Some(value) => value,
        };
        match spec.kind {
            ArgKind::Positional => invocation.positionals.extend(cli_values(&spec.name, value)?),
            ArgKind::Option => {
                if let Some(option) = cli_option(spec, value)? {
                    invocation.options.push(option);
                }
            }
            ArgKind::Body => {
                invocation.body = Some(body_value(registry, descriptor, spec, value)?);
            }
            ArgKind::Context => {}
        }
    }
    Ok(invocation)
}

/// Dispatches once and normalizes the reply.
pub fn invoke(ctx: &Context, invocation: &Invocation) -> Result<Value, Error> {
    match ctx.dispatcher().dispatch(invocation) {
        Ok(reply) => normalize(reply),
        Err(failure) => {
            logwise::warn_sync!(
                "{resource} {command} failed: {failure}",
                resource = logwise::privacy::LogIt(&invocation.resource),
                command = logwise::privacy::LogIt(&invocation.command),
                failure = logwise::privacy::LogIt(&failure)
            );
            Err(failure.into())
        }
    }
}

/// Converts a dispatcher reply into a JSON value.
///
/// ```
/// use duplocloud_mcp::dispatch::Reply;
/// use duplocloud_mcp::wrapper::normalize;
/// use serde_json::json;
///
/// assert_eq!(normalize(Reply::Text("ok".into())).unwrap(), json!("ok"));
/// assert_eq!(normalize(Reply::Empty).unwrap(), json!(""));
/// assert!(normalize(Reply::Bytes(vec![0xff, 0xfe])).is_err());
/// ```
pub fn normalize(reply: Reply) -> Result<Value, Error> {
    match reply {
        Reply::Empty => Ok(Value::String(String::new())),
        Reply::Json(value) => Ok(value),
        Reply::Text(text) => Ok(Value::String(text)),
        Reply::Bytes(bytes) => String::from_utf8(bytes)
            .map(Value::String)
            .map_err(|e| Error::Normalization(format!("reply is not valid UTF-8: {e}"))),
    }
}

/// Command-line values for one argument.
///
/// Numbers keep their sign; any other value starting with `-` is rejected so it cannot be read
/// back as a flag.
pub(crate) fn cli_values(name: &str, value: &Value) -> Result<Vec<String>, Error> {
    match value {
        Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.extend(cli_values(name, item)?);
            }
            Ok(values)
        }
        Value::String(s) => Ok(vec![cli_text(name, s)?]),
        Value::Null => Ok(Vec::new()),
        Value::Number(n) => Ok(vec![n.to_string()]),
        other => Ok(vec![cli_text(name, &other.to_string())?]),
    }
}

/// A single caller-supplied word for argv.
pub(crate) fn cli_text(name: &str, value: &str) -> Result<String, Error> {
    if value.starts_with('-') {
        return Err(Error::InvalidArguments(format!(
            "'{name}' must not start with '-': {value:?}"
        )));
    }
    Ok(value.to_string())
}

fn cli_option(spec: &ArgSpec, value: &Value) -> Result<Option<CliOption>, Error> {
    Ok(match value {
        Value::Bool(false) => None,
        Value::Bool(true) => Some(CliOption {
            flag: spec.flag(),
            values: Vec::new(),
        }),
        other => Some(CliOption {
            flag: spec.flag(),
            values: cli_values(&spec.name, other)?,
        }),
    })
}

fn body_value(
    registry: &dyn CommandRegistry,
    descriptor: &CommandDescriptor,
    spec: &ArgSpec,
    value: &Value,
) -> Result<Value, Error> {
    let Some(model) = descriptor.model_name() else {
        return Ok(value.clone());
    };
    if !value.is_object() {
        return Err(Error::InvalidArguments(format!(
            "'{}' must be an object matching {model}",
            spec.name
        )));
    }
    Ok(apply_aliases(registry, model, value))
}

/// Renames model fields to their wire aliases, recursing into nested models.
///
/// Keys that are not model fields are kept as given, and so are keys already in alias form.
pub fn apply_aliases(registry: &dyn CommandRegistry, model: &str, value: &Value) -> Value {
    let (Some(definition), Value::Object(object)) = (registry.model(model), value) else {
        return value.clone();
    };
    let renamed = object
        .iter()
        .map(|(key, value)| match definition.fields.get(key) {
            Some(field) => {
                let value = match (field.referenced_model(), value) {
                    (Some(nested), Value::Array(items)) => Value::Array(
                        items
                            .iter()
                            .map(|item| apply_aliases(registry, nested, item))
                            .collect(),
                    ),
                    (Some(nested), value) => apply_aliases(registry, nested, value),
                    (None, value) => value.clone(),
                };
                (field.alias.clone().unwrap_or_else(|| key.clone()), value)
            }
            None => (key.clone(), value.clone()),
        })
        .collect();
    Value::Object(renamed)
}
