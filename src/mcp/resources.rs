//! Read-only commands exposed as MCP resources.
//!
//! A read-only command without required arguments is a plain resource at
//! `duplo://{resource}/{command}`. One with required arguments is a resource template with one
//! path segment per argument, e.g. `duplo://tenant/find/{name}`; reading
//! `duplo://tenant/find/dev` binds `name = "dev"`.

use crate::context::Context;
use crate::jrpc::{Request, Response};
use crate::wrapper::{Arguments, Handler};
use serde::{Deserialize, Serialize};

/// URI scheme of every resource the server publishes.
pub const SCHEME: &str = "duplo://";

/// One registered resource or resource template.
#[derive(Clone)]
pub struct ResourceEntry {
    base: String,
    name: String,
    description: String,
    params: Vec<String>,
    handler: Handler,
}

impl ResourceEntry {
    /// `params` are the required arguments, in signature order, bound from the URI path.
    ///
    /// ```
    /// use duplocloud_mcp::context::Context;
    /// use duplocloud_mcp::error::Error;
    /// use duplocloud_mcp::mcp::resources::ResourceEntry;
    /// use duplocloud_mcp::wrapper::{Arguments, Handler};
    /// use serde_json::{Value, json};
    /// use std::sync::Arc;
    ///
    /// let handler: Handler = Arc::new(|_: &Arguments, _: &Context| -> Result<Value, Error> { Ok(json!([])) });
    /// let find = ResourceEntry::new("tenant", "find", "tenant_find", "Find a tenant", vec!["name".into()], handler);
    /// assert_eq!(find.uri(), "duplo://tenant/find/{name}");
    /// assert!(find.is_template());
    /// let bound = find.bind("duplo://tenant/find/dev").unwrap();
    /// assert_eq!(bound["name"], "dev");
    /// assert!(find.bind("duplo://tenant/find").is_none());
    /// ```
    pub fn new(
        resource: &str,
        command: &str,
        name: &str,
        description: &str,
        params: Vec<String>,
        handler: Handler,
    ) -> Self {
        ResourceEntry {
            base: format!("{SCHEME}{resource}/{command}"),
            name: name.to_string(),
            description: description.to_string(),
            params,
            handler,
        }
    }

    /// The URI, or the URI template for parameterized entries.
    pub fn uri(&self) -> String {
        let mut uri = self.base.clone();
        for param in &self.params {
            uri.push_str("/{");
            uri.push_str(param);
            uri.push('}');
        }
        uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_template(&self) -> bool {
        !self.params.is_empty()
    }

    /// Binds a concrete URI to this entry's arguments, if it matches.
    ///
    /// Each segment is percent-decoded. A segment that decodes to invalid UTF-8 or to a value
    /// containing `/` does not match.
    pub fn bind(&self, uri: &str) -> Option<Arguments> {
        let rest = uri.strip_prefix(&self.base)?;
        if self.params.is_empty() {
            return rest.is_empty().then(Arguments::new);
        }
        let segments: Vec<&str> = rest.strip_prefix('/')?.split('/').collect();
        if segments.len() != self.params.len() || segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        let mut arguments = Arguments::new();
        for (param, segment) in self.params.iter().zip(segments) {
            let value = percent_decode(segment)?;
            if value.is_empty() || value.contains('/') {
                return None;
            }
            arguments.insert(param.clone(), value.into());
        }
        Some(arguments)
    }

    fn read(&self, uri: &str, arguments: &Arguments, ctx: &Context) -> Result<ReadResult, crate::jrpc::Error> {
        match (self.handler)(arguments, ctx) {
            Ok(value) => {
                let text = match value {
                    serde_json::Value::String(text) => text,
                    other => serde_json::to_string_pretty(&other)
                        .map_err(|e| crate::jrpc::Error::internal_error(e.to_string()))?,
                };
                Ok(ReadResult {
                    contents: vec![ResourceContents {
                        uri: uri.to_string(),
                        mime_type: "application/json".to_string(),
                        text,
                    }],
                })
            }
            Err(e) => {
                logwise::warn_sync!(
                    "resource {uri} failed: {error}",
                    uri = logwise::privacy::LogIt(&uri),
                    error = logwise::privacy::LogIt(&e)
                );
                Err(crate::jrpc::Error::new(
                    -32603,
                    format!("{}: {}", e.kind(), e.message()),
                    Some(e.to_structured()),
                ))
            }
        }
    }
}

impl std::fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("uri", &self.uri())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Resource registrations, keyed by URI.
#[derive(Debug, Default)]
pub struct ResourceTable {
    entries: std::collections::BTreeMap<String, ResourceEntry>,
}

impl ResourceTable {
    pub fn insert(&mut self, entry: ResourceEntry) -> Result<(), crate::error::Error> {
        let uri = entry.uri();
        if self.entries.contains_key(&uri) {
            return Err(crate::error::Error::Configuration(format!(
                "resource collision: '{uri}' is already registered"
            )));
        }
        self.entries.insert(uri, entry);
        Ok(())
    }

    pub fn get(&self, uri: &str) -> Option<&ResourceEntry> {
        self.entries.get(uri)
    }

    /// Registered URIs and URI templates, sorted.
    pub fn uris(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve(&self, uri: &str) -> Option<(&ResourceEntry, Arguments)> {
        self.entries
            .values()
            .find_map(|entry| entry.bind(uri).map(|arguments| (entry, arguments)))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResourceList {
    resources: Vec<ResourceInfo>,
}

#[derive(Debug, Serialize)]
struct ResourceInfo {
    uri: String,
    name: String,
    description: String,
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TemplateList {
    #[serde(rename = "resourceTemplates")]
    resource_templates: Vec<TemplateInfo>,
}

#[derive(Debug, Serialize)]
struct TemplateInfo {
    #[serde(rename = "uriTemplate")]
    uri_template: String,
    name: String,
    description: String,
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReadParams {
    uri: String,
}

/// Result of `resources/read`.
#[derive(Debug, Serialize)]
pub struct ReadResult {
    pub contents: Vec<ResourceContents>,
}

#[derive(Debug, Serialize)]
pub struct ResourceContents {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

pub(crate) fn list(table: &ResourceTable, request: Request) -> Response<ResourceList> {
    let resources = table
        .entries
        .values()
        .filter(|e| !e.is_template())
        .map(|e| ResourceInfo {
            uri: e.uri(),
            name: e.name.clone(),
            description: e.description.clone(),
            mime_type: "application/json",
        })
        .collect();
    Response::new(ResourceList { resources }, request.id)
}

pub(crate) fn templates(table: &ResourceTable, request: Request) -> Response<TemplateList> {
    let resource_templates = table
        .entries
        .values()
        .filter(|e| e.is_template())
        .map(|e| TemplateInfo {
            uri_template: e.uri(),
            name: e.name.clone(),
            description: e.description.clone(),
            mime_type: "application/json",
        })
        .collect();
    Response::new(TemplateList { resource_templates }, request.id)
}

pub(crate) fn read(table: &ResourceTable, ctx: &Context, request: Request) -> Response<ReadResult> {
    let params = match request.params.map(serde_json::from_value::<ReadParams>) {
        Some(Ok(params)) => params,
        Some(Err(e)) => {
            return Response::err(crate::jrpc::Error::invalid_params(e.to_string()), request.id);
        }
        None => {
            return Response::err(
                crate::jrpc::Error::invalid_params("No parameters provided".to_string()),
                request.id,
            );
        }
    };
    match table.resolve(&params.uri) {
        Some((entry, arguments)) => match entry.read(&params.uri, &arguments, ctx) {
            Ok(result) => Response::new(result, request.id),
            Err(e) => Response::err(e, request.id),
        },
        None => Response::err(crate::jrpc::Error::unknown_resource(&params.uri), request.id),
    }
}

/// Decodes `%XX` escapes in one URI segment.
fn percent_decode(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = segment.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
