//! The tool table and the `tools/*` methods.
//!
//! Every callable the server exposes is a [`ToolEntry`]: a name, a description, an
//! [`InputSchema`] and a [`Handler`]. Entries are collected into a [`ToolTable`] once at startup,
//! together with the [`ResourceEntry`] registrations of read-only commands. After that the table
//! is only read, so it can be shared across request threads without locks.
//!
//! # Examples
//!
//! ```
//! use duplocloud_mcp::context::Context;
//! use duplocloud_mcp::error::Error;
//! use duplocloud_mcp::mcp::tools::{Argument, InputSchema, ToolEntry, ToolTable};
//! use duplocloud_mcp::wrapper::{Arguments, Handler};
//! use serde_json::{Value, json};
//! use std::sync::Arc;
//!
//! let mut table = ToolTable::new();
//! let schema = InputSchema::new(vec![Argument::new(
//!     "name".to_string(),
//!     "string".to_string(),
//!     "Who to greet".to_string(),
//!     true,
//! )]);
//! let handler: Handler = Arc::new(|args: &Arguments, _ctx: &Context| -> Result<Value, Error> {
//!     Ok(json!(format!("hello {}", args["name"])))
//! });
//! table
//!     .add_tool(ToolEntry::new("greet", "Greets someone", schema.clone(), handler.clone()))
//!     .unwrap();
//!
//! // a second tool with the same name is rejected instead of replacing the first
//! let again = table.add_tool(ToolEntry::new("greet", "Greets again", schema, handler));
//! assert!(again.is_err());
//! assert_eq!(table.tool_names(), vec!["greet".to_string()]);
//! ```

use crate::context::Context;
use crate::error::Error;
use crate::jrpc::{Request, Response};
use crate::mcp::resources::{ResourceEntry, ResourceTable};
use crate::wrapper::{Arguments, Handler};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// JSON Schema for a tool's arguments. Always an object schema.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct InputSchema {
    r#type: String,
    properties: BTreeMap<String, serde_json::Value>,
    required: Vec<String>,
}

/// One property of an [`InputSchema`].
#[derive(Debug, Clone)]
pub struct Argument {
    name: String,
    schema: serde_json::Map<String, serde_json::Value>,
    required: bool,
}

impl Argument {
    /// A primitive argument with a type and description.
    pub fn new(name: String, r#type: String, description: String, required: bool) -> Self {
        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), r#type.into());
        if !description.is_empty() {
            schema.insert("description".to_string(), description.into());
        }
        Argument {
            name,
            schema,
            required,
        }
    }

    /// An argument described by a complete schema object, e.g. a structured body.
    pub fn with_schema(
        name: String,
        schema: serde_json::Map<String, serde_json::Value>,
        required: bool,
    ) -> Self {
        Argument {
            name,
            schema,
            required,
        }
    }

    /// Adds a schema keyword such as `default` or `items`.
    pub fn keyword(mut self, key: &str, value: serde_json::Value) -> Self {
        self.schema.insert(key.to_string(), value);
        self
    }
}

impl InputSchema {
    /// Builds the schema. `required` keeps argument order; properties are sorted by name.
    pub fn new<A: IntoIterator<Item = Argument>>(arguments: A) -> Self {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for argument in arguments {
            if argument.required {
                required.push(argument.name.clone());
            }
            properties.insert(argument.name, serde_json::Value::Object(argument.schema));
        }
        InputSchema {
            r#type: "object".to_string(),
            properties,
            required,
        }
    }

    pub fn properties(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolEntry {
    name: String,
    description: String,
    input_schema: InputSchema,
    handler: Handler,
}

impl ToolEntry {
    pub fn new(name: &str, description: &str, input_schema: InputSchema, handler: Handler) -> Self {
        ToolEntry {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            handler,
        }
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

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Runs the handler, turning per-call failures into an error result rather than a protocol
    /// error.
    pub fn call(&self, arguments: &Arguments, ctx: &Context) -> ToolCallResponse {
        match (self.handler)(arguments, ctx) {
            Ok(value) => ToolCallResponse::from_value(value),
            Err(e) => {
                logwise::warn_sync!(
                    "tool {tool} failed: {error}",
                    tool = logwise::privacy::LogIt(&self.name),
                    error = logwise::privacy::LogIt(&e)
                );
                ToolCallError::from_error(&e).into_response()
            }
        }
    }
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// The server's tool table. Tool names are unique, and so are resource URIs.
#[derive(Debug, Default)]
pub struct ToolTable {
    tools: BTreeMap<String, ToolEntry>,
    resources: ResourceTable,
}

impl ToolTable {
    pub fn new() -> Self {
        ToolTable::default()
    }

    /// Registers a tool. A name that is already taken is a configuration error.
    pub fn add_tool(&mut self, tool: ToolEntry) -> Result<(), Error> {
        if self.tools.contains_key(tool.name()) {
            return Err(Error::Configuration(format!(
                "tool name collision: '{}' is already registered",
                tool.name()
            )));
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Registers a resource alongside the tools. A URI that is already taken is a configuration
    /// error.
    pub fn add_resource(&mut self, resource: ResourceEntry) -> Result<(), Error> {
        self.resources.insert(resource)
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn list(&self) -> ToolList {
        ToolList {
            tools: self.tools.values().map(ToolInfo::from_entry).collect(),
        }
    }
}

/// Result of `tools/list`.
#[derive(Debug, serde::Serialize)]
pub struct ToolList {
    pub(crate) tools: Vec<ToolInfo>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ToolInfo {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: InputSchema,
}

impl ToolInfo {
    fn from_entry(entry: &ToolEntry) -> Self {
        ToolInfo {
            name: entry.name.clone(),
            description: entry.description.clone(),
            input_schema: entry.input_schema.clone(),
        }
    }
}

/// Parameters of `tools/call`.
#[derive(Debug, serde::Deserialize, Clone)]
pub(crate) struct ToolCallParams {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) arguments: Arguments,
}

/// Result of `tools/call`.
#[derive(Debug, serde::Serialize)]
pub struct ToolCallResponse {
    pub(crate) content: Vec<ToolContent>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    structured_content: Option<serde_json::Value>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl ToolCallResponse {
    pub fn new(content: Vec<ToolContent>) -> Self {
        ToolCallResponse {
            content,
            structured_content: None,
            is_error: false,
        }
    }

    /// Wraps a normalized handler result. Strings are returned verbatim; anything else is
    /// rendered as pretty JSON, and objects are also attached as structured content.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => ToolCallResponse::new(vec![text.into()]),
            serde_json::Value::Null => ToolCallResponse::new(vec!["".into()]),
            other => {
                let text = serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string());
                let mut response = ToolCallResponse::new(vec![text.into()]);
                if other.is_object() {
                    response.structured_content = Some(other);
                }
                response
            }
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// Concatenated text content.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                ToolContent::Text(text) => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn structured_content(&self) -> Option<&serde_json::Value> {
        self.structured_content.as_ref()
    }
}

/// A failed tool call, reported inside a successful JSON-RPC response.
#[derive(Debug)]
pub struct ToolCallError {
    content: Vec<ToolContent>,
    structured_content: Option<serde_json::Value>,
}

impl ToolCallError {
    pub fn new(content: Vec<ToolContent>) -> Self {
        ToolCallError {
            content,
            structured_content: None,
        }
    }

    /// `"{Kind}: {message}"` text plus `{"error": {"kind", "message"}}` structured content.
    pub fn from_error(error: &Error) -> Self {
        ToolCallError {
            content: vec![format!("{}: {}", error.kind(), error.message()).into()],
            structured_content: Some(serde_json::json!({ "error": error.to_structured() })),
        }
    }

    pub fn into_response(self) -> ToolCallResponse {
        ToolCallResponse {
            content: self.content,
            structured_content: self.structured_content,
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ToolContent {
    Text(String),
}

impl Serialize for ToolContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            ToolContent::Text(text) => {
                let mut s = serializer.serialize_struct("ToolContent", 2)?;
                s.serialize_field("type", "text")?;
                s.serialize_field("text", text)?;
                s.end()
            }
        }
    }
}

impl From<String> for ToolContent {
    fn from(value: String) -> Self {
        ToolContent::Text(value)
    }
}

impl From<&str> for ToolContent {
    fn from(value: &str) -> Self {
        ToolContent::Text(value.to_string())
    }
}

pub(crate) fn list(table: &ToolTable, request: Request) -> Response<ToolList> {
    Response::new(table.list(), request.id)
}

pub(crate) fn call_imp(
    table: &ToolTable,
    ctx: &Context,
    params: ToolCallParams,
) -> Result<ToolCallResponse, crate::jrpc::Error> {
    match table.get(&params.name) {
        Some(tool) => Ok(tool.call(&params.arguments, ctx)),
        None => Err(crate::jrpc::Error::unknown_tool(params.name)),
    }
}

pub(crate) fn call(table: &ToolTable, ctx: &Context, request: Request) -> Response<ToolCallResponse> {
    let params = match request.params {
        Some(params) => match serde_json::from_value::<ToolCallParams>(params) {
            Ok(params) => params,
            Err(err) => {
                return Response::err(crate::jrpc::Error::invalid_params(err.to_string()), request.id);
            }
        },
        None => {
            return Response::err(
                crate::jrpc::Error::invalid_params("No parameters provided".to_string()),
                request.id,
            );
        }
    };
    match call_imp(table, ctx, params) {
        Ok(r) => Response::new(r, request.id),
        Err(e) => Response::err(e, request.id),
    }
}
