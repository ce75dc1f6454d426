//! Command metadata and the registry port.
//!
//! A [`CommandDescriptor`] describes one externally defined operation: which resource it belongs
//! to, its ordered argument signature and, optionally, the structured-input [`Model`] its body
//! must satisfy. Descriptors come from a [`CommandRegistry`]; the crate never creates them on its
//! own and only holds shared references once they are loaded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Command names that only read state. These are also exposed as MCP resources.
pub const READ_OPERATIONS: [&str; 4] = ["list", "find", "logs", "pods"];

/// Primitive type of an argument or model field, in JSON Schema vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ArgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
            ArgType::Array => "array",
            ArgType::Object => "object",
        }
    }
}

/// How an argument reaches the dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    /// Passed by position, in signature order.
    #[default]
    Positional,
    /// Passed as `--flag value`, or as a bare `--flag` for booleans.
    Option,
    /// The structured request document.
    Body,
    /// Supplied by the server at call time; never shown to or requested from the caller.
    Context,
}

/// One entry of a command's argument signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub arg_type: ArgType,
    #[serde(default)]
    pub kind: ArgKind,
    /// Explicit flag for [`ArgKind::Option`]; derived from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ArgSpec {
    fn with_kind(name: &str, arg_type: ArgType, kind: ArgKind) -> Self {
        ArgSpec {
            name: name.to_string(),
            arg_type,
            kind,
            flag: None,
            help: String::new(),
            required: false,
            default: None,
        }
    }

    pub fn positional(name: &str, arg_type: ArgType) -> Self {
        Self::with_kind(name, arg_type, ArgKind::Positional)
    }

    pub fn option(name: &str, arg_type: ArgType) -> Self {
        Self::with_kind(name, arg_type, ArgKind::Option)
    }

    /// The conventional `body` argument.
    pub fn body() -> Self {
        Self::with_kind("body", ArgType::Object, ArgKind::Body)
    }

    pub fn context(name: &str) -> Self {
        Self::with_kind(name, ArgType::Object, ArgKind::Context)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn flag_name(mut self, flag: &str) -> Self {
        self.flag = Some(flag.to_string());
        self
    }

    /// The command-line flag for an option argument.
    ///
    /// ```
    /// use duplocloud_mcp::registry::{ArgSpec, ArgType};
    ///
    /// assert_eq!(ArgSpec::option("dry_run", ArgType::Boolean).flag(), "--dry-run");
    /// assert_eq!(ArgSpec::option("n", ArgType::Integer).flag_name("-n").flag(), "-n");
    /// ```
    pub fn flag(&self) -> String {
        match &self.flag {
            Some(flag) => flag.clone(),
            None => format!("--{}", self.name.replace('_', "-")),
        }
    }

    pub fn is_context(&self) -> bool {
        self.kind == ArgKind::Context
    }
}

/// Whether a command reads or changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn classify(command: &str) -> Access {
        if READ_OPERATIONS.contains(&command) {
            Access::Read
        } else {
            Access::Write
        }
    }
}

/// Metadata for one command.
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    resource: String,
    name: String,
    aliases: Vec<String>,
    doc: String,
    args: Vec<ArgSpec>,
    model: Option<String>,
    access: Access,
}

impl CommandDescriptor {
    /// Starts a descriptor. The read/write classification follows from the command name.
    ///
    /// ```
    /// use duplocloud_mcp::registry::{Access, ArgSpec, ArgType, CommandDescriptor};
    ///
    /// let find = CommandDescriptor::new("tenant", "find")
    ///     .alias("get")
    ///     .arg(ArgSpec::positional("name", ArgType::String).required());
    /// assert_eq!(find.tool_name(), "tenant_find");
    /// assert_eq!(find.access(), Access::Read);
    /// ```
    pub fn new(resource: &str, name: &str) -> Self {
        CommandDescriptor {
            resource: resource.to_string(),
            name: name.to_string(),
            aliases: Vec::new(),
            doc: String::new(),
            args: Vec::new(),
            model: None,
            access: Access::classify(name),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = doc.to_string();
        self
    }

    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The raw docstring, possibly containing `{{ kind }}` placeholders.
    pub fn raw_doc(&self) -> &str {
        &self.doc
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    /// Arguments the caller may supply: everything except context parameters.
    pub fn caller_args(&self) -> impl Iterator<Item = &ArgSpec> {
        self.args.iter().filter(|a| !a.is_context())
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_read_only(&self) -> bool {
        self.access == Access::Read
    }

    /// The expanded-mode tool name, `{resource}_{command}`.
    pub fn tool_name(&self) -> String {
        format!("{}_{}", self.resource, self.name)
    }

    pub fn answers_to(&self, command: &str) -> bool {
        self.name == command || self.aliases.iter().any(|a| a == command)
    }
}

/// A field of a structured-input model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type", default)]
    pub field_type: ArgType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Wire name expected by the dispatch path, when it differs from the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Nested model, for object fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Item model, for arrays of objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
}

impl Field {
    pub fn new(field_type: ArgType) -> Self {
        Field {
            field_type,
            required: false,
            description: None,
            alias: None,
            model: None,
            items: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn nested(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn items(mut self, model: &str) -> Self {
        self.items = Some(model.to_string());
        self
    }

    /// The model this field refers to, if any.
    pub fn referenced_model(&self) -> Option<&str> {
        self.model.as_deref().or(self.items.as_deref())
    }
}

/// A named set of typed fields describing a command body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn field(mut self, name: &str, field: Field) -> Self {
        self.fields.insert(name.to_string(), field);
        self
    }
}

/// Read-only source of command metadata.
///
/// The registry is fully loaded before registration begins and never changes afterwards.
pub trait CommandRegistry: Send + Sync {
    /// Every known command.
    fn descriptors(&self) -> &[Arc<CommandDescriptor>];

    /// Resolves a structured-input model by name.
    fn model(&self, name: &str) -> Option<&Model>;

    /// Finds a command by resource and command name or alias.
    fn lookup(&self, resource: &str, command: &str) -> Option<&Arc<CommandDescriptor>> {
        self.descriptors()
            .iter()
            .find(|d| d.resource() == resource && d.answers_to(command))
    }

    /// Commands of one resource, in registry order.
    fn commands_for(&self, resource: &str) -> Vec<&Arc<CommandDescriptor>> {
        self.descriptors()
            .iter()
            .filter(|d| d.resource() == resource)
            .collect()
    }

    /// Distinct resource names, sorted.
    fn resources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors().iter().map(|d| d.resource()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn has_resource(&self, resource: &str) -> bool {
        self.descriptors().iter().any(|d| d.resource() == resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("list", Access::Read)]
    #[case("find", Access::Read)]
    #[case("logs", Access::Read)]
    #[case("pods", Access::Read)]
    #[case("create", Access::Write)]
    #[case("delete", Access::Write)]
    #[case("listing", Access::Write)]
    fn classification(#[case] command: &str, #[case] expected: Access) {
        assert_eq!(CommandDescriptor::new("tenant", command).access(), expected);
    }

    #[test]
    fn caller_args_hide_context() {
        let d = CommandDescriptor::new("service", "restart")
            .arg(ArgSpec::context("client"))
            .arg(ArgSpec::positional("name", ArgType::String).required());
        let names: Vec<&str> = d.caller_args().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["name"]);
        assert_eq!(d.args().len(), 2);
    }

    #[test]
    fn aliases_resolve() {
        let d = CommandDescriptor::new("tenant", "list").alias("ls");
        assert!(d.answers_to("list"));
        assert!(d.answers_to("ls"));
        assert!(!d.answers_to("l"));
    }

    #[test]
    fn arg_spec_deserializes_with_defaults() {
        let arg: ArgSpec = serde_json::from_str(r#"{"name": "name"}"#).unwrap();
        assert_eq!(arg.kind, ArgKind::Positional);
        assert_eq!(arg.arg_type, ArgType::String);
        assert!(!arg.required);
        let arg: ArgSpec =
            serde_json::from_str(r#"{"name": "wait", "type": "boolean", "kind": "option"}"#)
                .unwrap();
        assert_eq!(arg.flag(), "--wait");
    }
}
