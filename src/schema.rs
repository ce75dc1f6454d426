//! Input schemas and explain detail for commands.
//!
//! Both the expanded-mode tool schema and the compact-mode `explain` output are derived here,
//! from the same [`model_fields`] walk, so the two views of a command never disagree.
//!
//! When a command declares a structured-input model, its body parameter is described field by
//! field. Otherwise the schema is the raw argument signature. Context parameters are never part
//! of either view.

use crate::docstring;
use crate::error::Error;
use crate::mcp::tools::{Argument, InputSchema};
use crate::registry::{ArgKind, ArgSpec, ArgType, CommandDescriptor, CommandRegistry, Field};
use serde::Serialize;
use std::collections::BTreeMap;

/// Help text for a body argument whose shape is given by a model.
pub const MODEL_BODY_HELP: &str = "See model fields below for schema details";

/// One field of a model, as shown to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDetail {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Name of the nested model, for object fields and arrays of objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, FieldDetail>>,
}

impl FieldDetail {
    /// The JSON Schema for this field.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), self.field_type.clone().into());
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), description.clone().into());
        }
        if let Some(alias) = &self.alias {
            schema.insert("alias".to_string(), alias.clone().into());
        }
        if let Some(fields) = &self.fields {
            let object = object_schema(self.model.as_deref(), fields);
            if self.field_type == ArgType::Array.as_str() {
                schema.insert("items".to_string(), object);
            } else if let serde_json::Value::Object(object) = object {
                schema.extend(object);
            }
        }
        serde_json::Value::Object(schema)
    }
}

/// `{"type": "object", "title", "properties", "required"}` for a set of fields.
fn object_schema(title: Option<&str>, fields: &BTreeMap<String, FieldDetail>) -> serde_json::Value {
    let mut schema = serde_json::Map::new();
    schema.insert("type".to_string(), "object".into());
    if let Some(title) = title {
        schema.insert("title".to_string(), title.into());
    }
    let properties: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(name, field)| (name.clone(), field.to_json_schema()))
        .collect();
    schema.insert("properties".to_string(), properties.into());
    let required: Vec<serde_json::Value> = fields
        .iter()
        .filter(|(_, f)| f.required)
        .map(|(name, _)| name.clone().into())
        .collect();
    if !required.is_empty() {
        schema.insert("required".to_string(), required.into());
    }
    serde_json::Value::Object(schema)
}

/// Describes every field of a model, recursing into nested models.
///
/// An undefined model or a model that contains itself is a [`Error::Schema`].
pub fn model_fields(
    registry: &dyn CommandRegistry,
    model: &str,
) -> Result<BTreeMap<String, FieldDetail>, Error> {
    let mut stack = Vec::new();
    describe_model(registry, model, &mut stack)
}

fn describe_model(
    registry: &dyn CommandRegistry,
    model: &str,
    stack: &mut Vec<String>,
) -> Result<BTreeMap<String, FieldDetail>, Error> {
    if stack.iter().any(|m| m == model) {
        return Err(Error::Schema(format!(
            "model '{model}' contains itself via {}",
            stack.join(" -> ")
        )));
    }
    let definition = registry
        .model(model)
        .ok_or_else(|| Error::Schema(format!("model '{model}' is not defined")))?;
    stack.push(model.to_string());
    let mut fields = BTreeMap::new();
    for (name, field) in &definition.fields {
        fields.insert(name.clone(), describe_field(registry, field, stack)?);
    }
    stack.pop();
    Ok(fields)
}

fn describe_field(
    registry: &dyn CommandRegistry,
    field: &Field,
    stack: &mut Vec<String>,
) -> Result<FieldDetail, Error> {
    let nested = match field.referenced_model() {
        Some(model) => Some(describe_model(registry, model, stack)?),
        None => None,
    };
    Ok(FieldDetail {
        field_type: field.field_type.as_str().to_string(),
        required: field.required,
        description: field.description.clone(),
        alias: field.alias.clone(),
        model: field.referenced_model().map(str::to_string),
        fields: nested,
    })
}

/// The caller-facing schema of a command.
///
/// ```
/// use duplocloud_mcp::catalog::Catalog;
/// use duplocloud_mcp::registry::{ArgSpec, ArgType, CommandDescriptor};
/// use duplocloud_mcp::schema::input_schema;
///
/// let catalog = Catalog::builder()
///     .command(
///         CommandDescriptor::new("tenant", "find")
///             .arg(ArgSpec::context("client"))
///             .arg(ArgSpec::positional("name", ArgType::String).required().help("The {{ kind }} name")),
///     )
///     .build()
///     .unwrap();
/// let find = catalog.lookup_command("tenant", "find").unwrap();
/// let schema = input_schema(&catalog, find).unwrap();
/// assert_eq!(schema.required(), ["name".to_string()]);
/// assert_eq!(schema.property("name").unwrap()["description"], "The tenant name");
/// assert!(schema.property("client").is_none());
/// ```
pub fn input_schema(
    registry: &dyn CommandRegistry,
    descriptor: &CommandDescriptor,
) -> Result<InputSchema, Error> {
    let mut arguments = Vec::new();
    for arg in descriptor.caller_args() {
        arguments.push(argument_schema(registry, descriptor, arg)?);
    }
    Ok(InputSchema::new(arguments))
}

fn argument_schema(
    registry: &dyn CommandRegistry,
    descriptor: &CommandDescriptor,
    arg: &ArgSpec,
) -> Result<Argument, Error> {
    let help = docstring::render(&arg.help, descriptor.resource());
    let argument = match (arg.kind, descriptor.model_name()) {
        (ArgKind::Body, Some(model)) => {
            let fields = model_fields(registry, model)?;
            let mut schema = match object_schema(Some(model), &fields) {
                serde_json::Value::Object(schema) => schema,
                _ => serde_json::Map::new(),
            };
            if !help.is_empty() {
                schema.insert("description".to_string(), help.into());
            }
            Argument::with_schema(arg.name.clone(), schema, arg.required)
        }
        _ => {
            let mut argument = Argument::new(
                arg.name.clone(),
                arg.arg_type.as_str().to_string(),
                help,
                arg.required,
            );
            if arg.arg_type == ArgType::Array {
                argument = argument.keyword("items", serde_json::json!({"type": "string"}));
            }
            argument
        }
    };
    Ok(match &arg.default {
        Some(default) => argument.keyword("default", default.clone()),
        None => argument,
    })
}

/// One argument in explain output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgDetail {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub help: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Full detail for one command, as returned by `explain(resource, command)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDetail {
    pub resource: String,
    pub command: String,
    pub aliases: Vec<String>,
    pub args: Vec<ArgDetail>,
    pub docstring: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_fields: Option<BTreeMap<String, FieldDetail>>,
}

pub fn command_detail(
    registry: &dyn CommandRegistry,
    descriptor: &CommandDescriptor,
) -> Result<CommandDetail, Error> {
    let resource = descriptor.resource();
    let model = descriptor.model_name();
    let args = descriptor
        .caller_args()
        .map(|arg| {
            let (arg_type, help) = match (arg.kind, model) {
                (ArgKind::Body, Some(model)) => (model.to_string(), MODEL_BODY_HELP.to_string()),
                _ => (
                    arg.arg_type.as_str().to_string(),
                    docstring::render(&arg.help, resource),
                ),
            };
            ArgDetail {
                name: arg.name.clone(),
                arg_type,
                help,
                required: arg.required,
                default: arg.default.as_ref().map(|d| match d {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            }
        })
        .collect();
    let model_fields = match model {
        Some(model) => Some(model_fields(registry, model)?),
        None => None,
    };
    Ok(CommandDetail {
        resource: resource.to_string(),
        command: descriptor.name().to_string(),
        aliases: descriptor.aliases().to_vec(),
        args,
        docstring: docstring::render(descriptor.raw_doc(), resource),
        model: model.map(str::to_string),
        model_fields,
    })
}
