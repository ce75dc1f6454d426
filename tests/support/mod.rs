//! Shared fixtures: a small in-memory catalog and a dispatcher that records what it is asked.

#![allow(dead_code)]

use duplocloud_mcp::catalog::Catalog;
use duplocloud_mcp::config::{ServerConfig, ToolMode};
use duplocloud_mcp::dispatch::{DispatchFailure, Dispatcher, Invocation, Reply};
use duplocloud_mcp::jrpc::{Request, Response};
use duplocloud_mcp::registry::{ArgSpec, ArgType, CommandDescriptor, Field, Model};
use duplocloud_mcp::server::Server;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// Records every invocation. Fails with `failure` when one is set.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Invocation>>,
    failure: Option<String>,
}

impl Recorder {
    pub fn failing(message: &str) -> Self {
        Recorder {
            calls: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl Dispatcher for Recorder {
    fn dispatch(&self, invocation: &Invocation) -> Result<Reply, DispatchFailure> {
        self.calls.lock().unwrap().push(invocation.clone());
        match &self.failure {
            Some(message) => Err(DispatchFailure::Command(message.clone())),
            None => Ok(Reply::Json(json!({"argv": invocation.argv()}))),
        }
    }

    fn describe(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("Host".into(), json!("https://test.duplocloud.net"));
        map.insert("HasToken".into(), json!(true));
        map
    }
}

/// Two resources with a context parameter, a model and an alias.
pub fn catalog() -> Catalog {
    let name = || ArgSpec::positional("name", ArgType::String).required().help("The {{ kind }} name.");
    Catalog::builder()
        .command(
            CommandDescriptor::new("tenant", "list")
                .alias("ls")
                .doc("List all {{ kind }} resources.\n\nEverything the token can see.")
                .arg(ArgSpec::context("ctx")),
        )
        .command(
            CommandDescriptor::new("tenant", "find")
                .doc("Find a {{ kind }}.")
                .arg(name())
                .arg(ArgSpec::context("ctx")),
        )
        .command(
            CommandDescriptor::new("tenant", "create")
                .doc("Create a {{ kind }}.")
                .arg(ArgSpec::body().required().help("The {{ kind }}."))
                .arg(ArgSpec::context("ctx"))
                .model("AddTenantRequest"),
        )
        .command(
            CommandDescriptor::new("tenant", "delete")
                .doc("Delete a {{ kind }}.")
                .arg(name()),
        )
        .command(
            CommandDescriptor::new("service", "list")
                .doc("List all {{ kind }} resources.")
                .arg(ArgSpec::context("ctx")),
        )
        .command(
            CommandDescriptor::new("service", "restart")
                .doc("Restart a {{ kind }}.")
                .arg(name()),
        )
        .model(
            "AddTenantRequest",
            Model::new()
                .field(
                    "account_name",
                    Field::new(ArgType::String).required().alias("AccountName").describe("Tenant name."),
                )
                .field("plan_id", Field::new(ArgType::String).required().alias("PlanID"))
                .field("tags", Field::new(ArgType::Array).items("Tag")),
        )
        .model(
            "Tag",
            Model::new()
                .field("key", Field::new(ArgType::String).required().alias("Key"))
                .field("value", Field::new(ArgType::String).alias("Value")),
        )
        .build()
        .unwrap()
}

pub fn config(mode: ToolMode, resources: &str, commands: &str) -> ServerConfig {
    ServerConfig {
        tool_mode: mode,
        resource_filter: resources.into(),
        command_filter: commands.into(),
        ..ServerConfig::default()
    }
}

pub fn server(config: ServerConfig, recorder: Arc<Recorder>) -> Server {
    Server::build(config, Arc::new(catalog()), recorder).unwrap()
}

/// Sends `tools/call` and returns the result object.
pub fn call_tool(server: &Server, name: &str, arguments: Value) -> Value {
    let response = request(
        server,
        "tools/call",
        json!({"name": name, "arguments": arguments}),
    );
    response.result.unwrap()
}

pub fn request(server: &Server, method: &str, params: Value) -> Response<Value> {
    server
        .service()
        .handle(Request::new(method, Some(params), json!(1)))
}
