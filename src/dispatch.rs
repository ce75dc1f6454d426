//! The dispatch port.
//!
//! A [`Dispatcher`] performs one operation against the managed infrastructure. The server builds
//! an [`Invocation`] from the caller's arguments and the command signature and hands it over; the
//! dispatcher returns a [`Reply`] or a [`DispatchFailure`]. Dispatch is synchronous and may block.

use serde::Serialize;

/// One `--flag [values...]` pair on the command line. An empty `values` is a bare switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CliOption {
    pub flag: String,
    pub values: Vec<String>,
}

/// Everything needed to run one command, already in call order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub resource: String,
    pub command: String,
    /// Positional arguments in signature order.
    pub positionals: Vec<String>,
    /// Option arguments in signature order.
    pub options: Vec<CliOption>,
    /// Structured request document, for commands that take one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// JMESPath expression applied to the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Output format override: `json`, `yaml` or `string`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Wait for asynchronous operations to finish.
    pub wait: bool,
}

impl Invocation {
    pub fn new(resource: &str, command: &str) -> Self {
        Invocation {
            resource: resource.to_string(),
            command: command.to_string(),
            positionals: Vec::new(),
            options: Vec::new(),
            body: None,
            query: None,
            output: None,
            wait: false,
        }
    }

    /// The full argument vector after the program name.
    ///
    /// ```
    /// use duplocloud_mcp::dispatch::{CliOption, Invocation};
    ///
    /// let mut call = Invocation::new("service", "logs");
    /// call.positionals.push("api".into());
    /// call.options.push(CliOption { flag: "--tail".into(), values: vec!["50".into()] });
    /// call.query = Some("[0]".into());
    /// call.wait = true;
    /// assert_eq!(
    ///     call.argv(),
    ///     vec!["service", "logs", "api", "--tail", "50", "--query", "[0]", "--wait"]
    /// );
    /// ```
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.resource.clone(), self.command.clone()];
        argv.extend(self.positionals.iter().cloned());
        for option in &self.options {
            argv.push(option.flag.clone());
            argv.extend(option.values.iter().cloned());
        }
        if self.body.is_some() {
            argv.push("-f".to_string());
            argv.push("-".to_string());
        }
        if let Some(query) = &self.query {
            argv.push("--query".to_string());
            argv.push(query.clone());
        }
        if let Some(output) = &self.output {
            argv.push("--output".to_string());
            argv.push(output.clone());
        }
        if self.wait {
            argv.push("--wait".to_string());
        }
        argv
    }
}

/// What a dispatcher produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing was printed.
    Empty,
    Json(serde_json::Value),
    Text(String),
    /// Raw output that was not decoded.
    Bytes(Vec<u8>),
}

/// Why an operation failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    /// The dispatcher could not be started at all.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The operation ran and reported an error.
    #[error("{0}")]
    Command(String),
}

impl From<DispatchFailure> for crate::error::Error {
    fn from(value: DispatchFailure) -> Self {
        crate::error::Error::Dispatch(value.to_string())
    }
}

/// Performs operations. Shared across request threads.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, invocation: &Invocation) -> Result<Reply, DispatchFailure>;

    /// Connection details shown in the config dump. Never include secrets.
    fn describe(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }
}

impl<F> Dispatcher for F
where
    F: Fn(&Invocation) -> Result<Reply, DispatchFailure> + Send + Sync,
{
    fn dispatch(&self, invocation: &Invocation) -> Result<Reply, DispatchFailure> {
        self(invocation)
    }
}
