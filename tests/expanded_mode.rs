mod support;

use duplocloud_mcp::config::ToolMode;
use duplocloud_mcp::registrar::register_all;
use duplocloud_mcp::filter::FilterRule;
use duplocloud_mcp::mcp::tools::ToolTable;
use serde_json::{Value, json};
use std::sync::Arc;
use support::{Recorder, call_tool, catalog, config, request, server};

fn listed_tools(server: &duplocloud_mcp::server::Server) -> Vec<Value> {
    let list = request(server, "tools/list", json!({})).result.unwrap();
    list["tools"].as_array().unwrap().clone()
}

#[test]
fn tenant_list_and_find_only() {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Expanded, "tenant", "list|find"), recorder.clone());
    assert_eq!(
        server.service().tools().tool_names(),
        vec!["config", "tenant_find", "tenant_list"]
    );
    assert_eq!(
        server.service().tools().resources().uris(),
        vec!["duplo://tenant/find/{name}", "duplo://tenant/list"]
    );

    let result = call_tool(&server, "tenant_find", json!({"name": "dev"}));
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"], json!({"argv": ["tenant", "find", "dev"]}));
    assert_eq!(recorder.calls().len(), 1);
}

#[test]
fn filtered_commands_are_not_callable() {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Expanded, "tenant", "list|find"), recorder.clone());
    let response = request(
        &server,
        "tools/call",
        json!({"name": "tenant_delete", "arguments": {"name": "dev"}}),
    );
    assert_eq!(response.error.unwrap().code, -32602);
    assert!(recorder.calls().is_empty());
}

#[test]
fn context_parameters_never_reach_a_schema() {
    let server = server(config(ToolMode::Expanded, ".*", ".*"), Arc::new(Recorder::default()));
    for tool in listed_tools(&server) {
        let schema = &tool["inputSchema"];
        assert!(schema["properties"].get("ctx").is_none(), "{}", tool["name"]);
        let required = schema["required"].as_array().cloned().unwrap_or_default();
        assert!(!required.contains(&json!("ctx")));
    }
}

#[test]
fn context_parameters_are_rejected_as_arguments() {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Expanded, ".*", ".*"), recorder.clone());
    let result = call_tool(&server, "tenant_list", json!({"ctx": {}}));
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"]["kind"], "InvalidArgumentsError");
    assert!(recorder.calls().is_empty());
}

#[test]
fn descriptions_are_rendered_docstrings() {
    let server = server(config(ToolMode::Expanded, "service", ".*"), Arc::new(Recorder::default()));
    let tools = listed_tools(&server);
    let list = tools.iter().find(|t| t["name"] == "service_list").unwrap();
    assert_eq!(list["description"], "List all service resources.");
    let restart = tools.iter().find(|t| t["name"] == "service_restart").unwrap();
    assert_eq!(
        restart["inputSchema"]["properties"]["name"]["description"],
        "The service name."
    );
}

#[test]
fn body_is_sent_with_wire_aliases() {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Expanded, "tenant", "create"), recorder.clone());
    let result = call_tool(
        &server,
        "tenant_create",
        json!({"body": {"account_name": "dev", "plan_id": "default", "tags": [{"key": "team", "value": "a"}]}}),
    );
    assert_eq!(result["isError"], false);
    let calls = recorder.calls();
    assert_eq!(
        calls[0].body,
        Some(json!({
            "AccountName": "dev",
            "PlanID": "default",
            "tags": [{"Key": "team", "Value": "a"}]
        }))
    );
}

#[test]
fn dispatch_failures_are_tool_errors() {
    let recorder = Arc::new(Recorder::failing("tenant dev already exists"));
    let server = server(config(ToolMode::Expanded, "tenant", "create"), recorder);
    let result = call_tool(
        &server,
        "tenant_create",
        json!({"body": {"account_name": "dev", "plan_id": "default"}}),
    );
    assert_eq!(result["isError"], true);
    assert_eq!(result["content"][0]["text"], "DispatchError: tenant dev already exists");
}

#[test]
fn naming_is_stable_across_registrations() {
    let catalog = catalog();
    let filter = FilterRule::new(".*", ".*").unwrap();
    let mut first = ToolTable::new();
    let mut second = ToolTable::new();
    register_all(&catalog, &filter, &mut first).unwrap();
    register_all(&catalog, &filter, &mut second).unwrap();
    assert_eq!(first.tool_names(), second.tool_names());
    assert_eq!(first.resources().uris(), second.resources().uris());
}

#[test]
fn reading_a_resource_runs_the_command() {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Expanded, "service", ".*"), recorder.clone());
    let read = request(&server, "resources/read", json!({"uri": "duplo://service/list"}))
        .result
        .unwrap();
    let text = read["contents"][0]["text"].as_str().unwrap();
    let value: Value = serde_json::from_str(text).unwrap();
    assert_eq!(value, json!({"argv": ["service", "list"]}));
    assert_eq!(recorder.calls().len(), 1);
}

#[test]
fn flag_like_values_never_reach_the_command_line() {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Expanded, "tenant", "find"), recorder.clone());
    let result = call_tool(&server, "tenant_find", json!({"name": "--host=https://evil.example"}));
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"]["kind"], "InvalidArgumentsError");
    assert!(recorder.calls().is_empty());
}

#[test]
fn template_uris_are_percent_decoded() {
    let recorder = Arc::new(Recorder::default());
    let server = server(config(ToolMode::Expanded, "tenant", "find"), recorder.clone());
    let read = request(&server, "resources/read", json!({"uri": "duplo://tenant/find/my%20tenant"}))
        .result
        .unwrap();
    let value: Value = serde_json::from_str(read["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(value, json!({"argv": ["tenant", "find", "my tenant"]}));
    assert_eq!(recorder.calls().len(), 1);
}
