//! Server configuration and the command line.
//!
//! Every setting can be given as a flag or through the environment. [`Args`] is the raw clap
//! surface; [`ServerConfig`] is the resolved, immutable configuration the rest of the crate sees.

use crate::error::Error;
use crate::filter::{FilterRule, MATCH_ALL};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

/// Port used when neither `--port`, `DUPLO_MCP_PORT` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 8000;

/// The HTTP transport always listens on every interface.
pub const BIND_HOST: &str = "0.0.0.0";

/// How the server talks to its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin and stdout.
    Stdio,
    /// JSON-RPC over `POST /mcp`.
    #[default]
    Http,
}

impl Display for Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Transport::Stdio => "stdio",
            Transport::Http => "http",
        })
    }
}

/// Registration topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// One tool per admitted command.
    #[default]
    Expanded,
    /// The fixed `resources`, `explain` and `execute` tools.
    Compact,
}

impl Display for ToolMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ToolMode::Expanded => "expanded",
            ToolMode::Compact => "compact",
        })
    }
}

/// Connection details handed through to the dispatcher untouched.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub host: Option<String>,
    pub token: Option<String>,
    pub tenant: Option<String>,
}

impl Credentials {
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("tenant", &self.tenant)
            .finish()
    }
}

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub transport: Transport,
    pub port: u16,
    pub resource_filter: String,
    pub command_filter: String,
    pub tool_mode: ToolMode,
    pub credentials: Credentials,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            transport: Transport::default(),
            port: DEFAULT_PORT,
            resource_filter: MATCH_ALL.to_string(),
            command_filter: MATCH_ALL.to_string(),
            tool_mode: ToolMode::default(),
            credentials: Credentials::default(),
        }
    }
}

impl ServerConfig {
    /// Compiles the two filter patterns.
    pub fn filter(&self) -> Result<FilterRule, Error> {
        FilterRule::new(&self.resource_filter, &self.command_filter)
    }

    /// `host:port` the HTTP transport binds to.
    pub fn bind_address(&self) -> String {
        format!("{BIND_HOST}:{}", self.port)
    }

    /// The `MCP` section of the config dump.
    ///
    /// ```
    /// use duplocloud_mcp::config::ServerConfig;
    ///
    /// let summary = ServerConfig::default().mcp_summary();
    /// assert_eq!(summary["transport"], "http");
    /// assert_eq!(summary["port"], 8000);
    /// assert_eq!(summary["tool_mode"], "expanded");
    /// ```
    pub fn mcp_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "transport": self.transport,
            "port": self.port,
            "resource_filter": self.resource_filter,
            "command_filter": self.command_filter,
            "tool_mode": self.tool_mode,
        })
    }
}

/// Command line of the `duplocloud-mcp` binary.
#[derive(Parser, Debug)]
#[command(version, about = "DuploCloud MCP server: exposes duploctl commands as MCP tools")]
pub struct Args {
    /// Transport to serve on
    #[arg(long, value_enum, default_value_t = Transport::Http, env = "DUPLO_MCP_TRANSPORT")]
    pub transport: Transport,

    /// HTTP port [default: $PORT or 8000]
    #[arg(long, env = "DUPLO_MCP_PORT")]
    pub port: Option<u16>,

    /// Regex selecting the resources to expose (full match)
    #[arg(long, default_value = MATCH_ALL, env = "DUPLO_MCP_RESOURCE_FILTER")]
    pub resource_filter: String,

    /// Regex selecting the commands to expose (full match)
    #[arg(long, default_value = MATCH_ALL, env = "DUPLO_MCP_COMMAND_FILTER")]
    pub command_filter: String,

    /// Register one tool per command, or the three compact tools
    #[arg(long, value_enum, default_value_t = ToolMode::Expanded, env = "DUPLO_MCP_TOOL_MODE")]
    pub tool_mode: ToolMode,

    /// Command catalog to load instead of the built-in one
    #[arg(long, env = "DUPLO_MCP_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// duploctl executable
    #[arg(long, default_value = "duploctl", env = "DUPLO_MCP_DUPLOCTL")]
    pub duploctl: String,

    /// DuploCloud portal URL
    #[arg(long, env = "DUPLO_HOST")]
    pub host: Option<String>,

    /// DuploCloud API token
    #[arg(long, env = "DUPLO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Default tenant
    #[arg(long, env = "DUPLO_TENANT")]
    pub tenant: Option<String>,
}

impl Args {
    /// Resolves the server configuration, reading `PORT` when no port was given.
    pub fn server_config(&self) -> Result<ServerConfig, Error> {
        let fallback = std::env::var("PORT").ok();
        Ok(ServerConfig {
            transport: self.transport,
            port: resolve_port(self.port, fallback.as_deref())?,
            resource_filter: self.resource_filter.clone(),
            command_filter: self.command_filter.clone(),
            tool_mode: self.tool_mode,
            credentials: Credentials {
                host: self.host.clone(),
                token: self.token.clone(),
                tenant: self.tenant.clone(),
            },
        })
    }
}

/// Picks the port: the flag (or `DUPLO_MCP_PORT`), then `PORT`, then [`DEFAULT_PORT`].
///
/// ```
/// use duplocloud_mcp::config::resolve_port;
///
/// assert_eq!(resolve_port(Some(9000), Some("7000")).unwrap(), 9000);
/// assert_eq!(resolve_port(None, Some("7000")).unwrap(), 7000);
/// assert_eq!(resolve_port(None, None).unwrap(), 8000);
/// assert!(resolve_port(None, Some("http")).is_err());
/// ```
pub fn resolve_port(flag: Option<u16>, fallback: Option<&str>) -> Result<u16, Error> {
    match (flag, fallback) {
        (Some(port), _) => Ok(port),
        (None, Some(raw)) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid PORT '{raw}': {e}"))),
        (None, None) => Ok(DEFAULT_PORT),
    }
}
