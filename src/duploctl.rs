//! Dispatching through the `duploctl` command line.

use crate::config::Credentials;
use crate::dispatch::{DispatchFailure, Dispatcher, Invocation, Reply};
use std::io::Write;
use std::process::{Command, Stdio};

/// Runs each invocation as one `duploctl` process.
///
/// Credentials travel in `DUPLO_HOST`, `DUPLO_TOKEN` and `DUPLO_TENANT`; a body is written to the
/// child's stdin, which `-f -` tells `duploctl` to read.
#[derive(Debug, Clone)]
pub struct Duploctl {
    program: String,
    credentials: Credentials,
}

impl Duploctl {
    pub fn new(program: &str, credentials: Credentials) -> Self {
        Duploctl {
            program: program.to_string(),
            credentials,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(invocation.argv())
            .stdin(if invocation.body.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let variables = [
            ("DUPLO_HOST", &self.credentials.host),
            ("DUPLO_TOKEN", &self.credentials.token),
            ("DUPLO_TENANT", &self.credentials.tenant),
        ];
        for (name, value) in variables {
            if let Some(value) = value {
                command.env(name, value);
            }
        }
        command
    }
}

impl Dispatcher for Duploctl {
    fn dispatch(&self, invocation: &Invocation) -> Result<Reply, DispatchFailure> {
        let launch = |source| DispatchFailure::Launch {
            program: self.program.clone(),
            source,
        };
        let mut child = self.command(invocation).spawn().map_err(launch)?;
        let input = match (&invocation.body, child.stdin.take()) {
            (Some(body), Some(stdin)) => Some((body.to_string(), stdin)),
            _ => None,
        };
        // stdin is written from its own thread while stdout and stderr drain
        let output = std::thread::scope(|scope| {
            if let Some((body, mut stdin)) = input {
                scope.spawn(move || {
                    if let Err(e) = stdin.write_all(body.as_bytes()) {
                        logwise::warn_sync!(
                            "could not write request body: {error}",
                            error = logwise::privacy::LogIt(&e)
                        );
                    }
                });
            }
            child.wait_with_output()
        })
        .map_err(launch)?;
        if !output.status.success() {
            return Err(DispatchFailure::Command(failure_message(
                &output.stderr,
                &output.stdout,
                output.status,
            )));
        }
        Ok(parse_output(output.stdout))
    }

    fn describe(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("Host".to_string(), self.credentials.host.clone().into());
        map.insert("Tenant".to_string(), self.credentials.tenant.clone().into());
        map.insert("HasToken".to_string(), self.credentials.has_token().into());
        map
    }
}

/// JSON when stdout parses as JSON, text otherwise.
fn parse_output(stdout: Vec<u8>) -> Reply {
    match String::from_utf8(stdout) {
        Ok(text) => {
            let trimmed = text.trim_end();
            if trimmed.is_empty() {
                Reply::Empty
            } else if let Ok(value) = serde_json::from_str(trimmed) {
                Reply::Json(value)
            } else {
                Reply::Text(trimmed.to_string())
            }
        }
        Err(e) => Reply::Bytes(e.into_bytes()),
    }
}

fn failure_message(stderr: &[u8], stdout: &[u8], status: std::process::ExitStatus) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    let message = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    if message.is_empty() {
        format!("duploctl exited with {status}")
    } else {
        message.to_string()
    }
}
