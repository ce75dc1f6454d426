mod support;

use duplocloud_mcp::config::ToolMode;
use duplocloud_mcp::filter::FilterRule;
use duplocloud_mcp::registry::CommandRegistry;
use duplocloud_mcp::schema;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use support::{Recorder, call_tool, catalog, config, request, server};

fn compact(resources: &str, commands: &str) -> (duplocloud_mcp::server::Server, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Compact, resources, commands), recorder.clone());
    (server, recorder)
}

#[test]
fn compact_tools_replace_command_tools() {
    let (server, _) = compact(".*", ".*");
    assert_eq!(
        server.service().tools().tool_names(),
        vec!["config", "execute", "explain", "resources"]
    );
}

#[test]
fn explain_resource_lists_commands() {
    let (server, _) = compact(".*", ".*");
    let result = call_tool(&server, "explain", json!({"resource": "tenant"}));
    let commands = &result["structuredContent"]["commands"];
    let names: Vec<&String> = commands.as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["create", "delete", "find", "list"]);
    assert_eq!(commands["list"]["summary"], "List all tenant resources.");
    assert_eq!(commands["list"]["aliases"], json!(["ls"]));
}

#[test]
fn explain_create_describes_the_body_model() {
    let (server, _) = compact(".*", ".*");
    let result = call_tool(&server, "explain", json!({"resource": "tenant", "command": "create"}));
    let detail = &result["structuredContent"];
    assert_eq!(detail["model"], "AddTenantRequest");
    let fields: Vec<&String> = detail["model_fields"].as_object().unwrap().keys().collect();
    assert_eq!(fields, vec!["account_name", "plan_id", "tags"]);
    assert_eq!(detail["model_fields"]["account_name"]["alias"], "AccountName");
    assert_eq!(detail["model_fields"]["tags"]["fields"]["key"]["required"], true);
    // the context parameter is not an argument
    let args: Vec<&Value> = detail["args"].as_array().unwrap().iter().map(|a| &a["name"]).collect();
    assert_eq!(args, vec![&json!("body")]);
}

#[test]
fn explain_and_expanded_schema_agree() {
    let catalog = catalog();
    let fields = schema::model_fields(&catalog, "AddTenantRequest").unwrap();

    let (compact_server, _) = compact(".*", ".*");
    let explained = call_tool(
        &compact_server,
        "explain",
        json!({"resource": "tenant", "command": "create"}),
    );
    assert_eq!(
        explained["structuredContent"]["model_fields"],
        serde_json::to_value(&fields).unwrap()
    );

    let expanded = server(config(ToolMode::Expanded, "tenant", "create"), Arc::new(Recorder::default()));
    let list = request(&expanded, "tools/list", json!({})).result.unwrap();
    let tool = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "tenant_create")
        .unwrap()
        .clone();
    let body = &tool["inputSchema"]["properties"]["body"];
    for (name, field) in &fields {
        assert_eq!(body["properties"][name], field.to_json_schema(), "{name}");
    }
    assert_eq!(body["properties"].as_object().unwrap().len(), fields.len());
    assert_eq!(body["required"], json!(["account_name", "plan_id"]));
}

#[test]
fn execute_unknown_resource_is_a_lookup_error() {
    let (server, recorder) = compact(".*", ".*");
    let result = call_tool(
        &server,
        "execute",
        json!({"resource": "nonexistent_resource", "command": "list"}),
    );
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"]["kind"], "LookupError");
    assert!(recorder.calls().is_empty());
}

#[test]
fn execute_reports_dispatch_failures_verbatim() {
    let recorder = Arc::new(Recorder::failing("409 Conflict: tenant 'dev' already exists"));
    let server = server(config(ToolMode::Compact, ".*", ".*"), recorder.clone());
    let result = call_tool(
        &server,
        "execute",
        json!({"resource": "tenant", "command": "create", "body": {"account_name": "dev", "plan_id": "default"}}),
    );
    assert_eq!(result["isError"], true);
    assert_eq!(
        result["structuredContent"]["error"],
        json!({"kind": "DispatchError", "message": "409 Conflict: tenant 'dev' already exists"})
    );
    assert_eq!(recorder.calls().len(), 1);
}

#[test]
fn execute_passes_name_and_invocation_options() {
    let (server, recorder) = compact(".*", ".*");
    let result = call_tool(
        &server,
        "execute",
        json!({"resource": "service", "command": "restart", "name": "api", "wait": true, "output": "yaml"}),
    );
    assert_eq!(result["isError"], false);
    assert_eq!(
        recorder.calls()[0].argv(),
        vec!["service", "restart", "api", "--output", "yaml", "--wait"]
    );
}

#[test]
fn execute_rejects_unknown_fields() {
    let (server, recorder) = compact(".*", ".*");
    let result = call_tool(
        &server,
        "execute",
        json!({"resource": "tenant", "command": "list", "tenant": "dev"}),
    );
    assert_eq!(result["structuredContent"]["error"]["kind"], "InvalidArgumentsError");
    assert!(recorder.calls().is_empty());
}

#[test]
fn filters_apply_when_executing() {
    let (server, recorder) = compact("tenant", "list|find");
    let listed = call_tool(&server, "resources", json!({}));
    assert_eq!(listed["structuredContent"], json!({"resources": ["tenant"]}));

    for (resource, command) in [("service", "list"), ("tenant", "delete"), ("tenant", "create")] {
        let result = call_tool(
            &server,
            "execute",
            json!({"resource": resource, "command": command, "name": "x"}),
        );
        assert_eq!(result["isError"], true, "{resource} {command}");
        assert_eq!(result["structuredContent"]["error"]["kind"], "LookupError");
    }
    assert!(recorder.calls().is_empty());

    let result = call_tool(&server, "execute", json!({"resource": "tenant", "command": "ls"}));
    assert_eq!(result["isError"], false);
    assert_eq!(recorder.calls().len(), 1);
}

fn command_filters() -> impl Strategy<Value = String> {
    prop::sample::subsequence(vec!["list", "find", "create", "delete", "restart"], 0..=5)
        .prop_map(|commands| {
            if commands.is_empty() {
                "none".to_string()
            } else {
                commands.join("|")
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn resources_lists_exactly_the_admitted_resources(
        resources in prop::sample::select(vec![".*", "tenant", "service", "tenant|service", "hosts"]),
        commands in command_filters(),
    ) {
        let (server, _) = compact(resources, &commands);
        let listed = call_tool(&server, "resources", json!({}));
        let listed: Vec<String> = serde_json::from_value(listed["structuredContent"]["resources"].clone()).unwrap();

        let filter = FilterRule::new(resources, &commands).unwrap();
        let catalog = catalog();
        let expected: BTreeSet<String> = catalog
            .descriptors()
            .iter()
            .filter(|d| filter.admits(d.resource(), d.name()))
            .map(|d| d.resource().to_string())
            .collect();
        prop_assert_eq!(listed, expected.into_iter().collect::<Vec<_>>());
    }
}

#[test]
fn execute_refuses_flag_like_name_and_args() {
    let (server, recorder) = compact(".*", ".*");
    for arguments in [
        json!({"resource": "tenant", "command": "find", "name": "--host=https://evil.example"}),
        json!({"resource": "service", "command": "restart", "name": "api", "args": ["--host=https://evil.example"]}),
    ] {
        let result = call_tool(&server, "execute", arguments);
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["error"]["kind"], "InvalidArgumentsError");
    }
    assert!(recorder.calls().is_empty());
}
