/*!
An MCP server that exposes DuploCloud `duploctl` commands as tools.

duplocloud-mcp reads a catalog of `duploctl` commands (their resources, arguments, docstrings and
body models) and turns it into a Model Context Protocol tool surface at startup. Agents talk to it
over newline-delimited JSON-RPC on stdio, or over HTTP at `POST /mcp`.

# Overview

Every command in the catalog belongs to a resource (`tenant`, `service`, `hosts`...). Two regular
expressions, one for resources and one for commands, decide which commands are admitted. Both must
match the whole name.

The admitted commands are exposed in one of two modes:

- **expanded** (the default): one tool per command, named `{resource}_{command}`, with a JSON
  schema generated from the command's arguments. Read-only commands are also published as MCP
  resources under `duplo://{resource}/{command}`.
- **compact**: three fixed tools. `resources` lists what is available, `explain` describes a
  resource or one of its commands, and `execute` runs a command by name.

Either way a call ends up as one [`dispatch::Invocation`] handed to a [`dispatch::Dispatcher`].
The shipped dispatcher, [`duploctl::Duploctl`], runs the `duploctl` executable.

# Key Features

- **No async runtime required**: a thread per HTTP connection, nothing else
- **Filtered at startup and at call time**: compact `execute` cannot reach what the filter hides
- **Structured errors**: per-call failures come back as tool results with `isError: true`
- **Privacy-aware logging**: logs go through logwise, and the API token is never printed

# Quick Start

```
use duplocloud_mcp::catalog::Catalog;
use duplocloud_mcp::config::ServerConfig;
use duplocloud_mcp::dispatch::{DispatchFailure, Invocation, Reply};
use duplocloud_mcp::jrpc::Request;
use duplocloud_mcp::server::Server;
use serde_json::json;
use std::sync::Arc;

// any closure can stand in for duploctl
let dispatcher = |call: &Invocation| -> Result<Reply, DispatchFailure> {
    Ok(Reply::Json(json!({"ran": call.argv()})))
};
let config = ServerConfig {
    resource_filter: "tenant".into(),
    command_filter: "list|find".into(),
    ..ServerConfig::default()
};
let server = Server::build(config, Arc::new(Catalog::builtin().unwrap()), Arc::new(dispatcher)).unwrap();
assert_eq!(server.service().tools().tool_names(), vec!["config", "tenant_find", "tenant_list"]);

let response = server.service().handle(Request::new(
    "tools/call",
    Some(json!({"name": "tenant_find", "arguments": {"name": "dev"}})),
    json!(1),
));
let result = response.result.unwrap();
assert_eq!(result["structuredContent"], json!({"ran": ["tenant", "find", "dev"]}));
```

## Running the binary

```text
duplocloud-mcp --transport stdio --resource-filter 'tenant|service' --tool-mode compact
```

Credentials are passed through to `duploctl` from `--host`, `--token` and `--tenant`, or from
`DUPLO_HOST`, `DUPLO_TOKEN` and `DUPLO_TENANT`.

# Architecture

Startup is single-threaded: the catalog is loaded, commands are registered into a
[`mcp::tools::ToolTable`], custom tools and routes are installed, and a [`context::Context`] is
built. After that everything is shared immutably and handlers may run concurrently.

Handlers take their arguments and the context explicitly, `(args, &Context)`. Context
parameters never appear in an input schema.
*/

pub mod catalog;
pub mod compact;
pub mod config;
pub mod context;
pub mod custom;
pub mod dispatch;
pub mod docstring;
pub mod duploctl;
pub mod error;
pub mod filter;
pub mod http;
pub mod jrpc;
pub mod mcp;
pub mod registrar;
pub mod registry;
pub mod schema;
pub mod server;
pub mod stdio;
pub mod wrapper;
