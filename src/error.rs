//! Error kinds shared by startup and per-call paths.
//!
//! Startup errors ([`ErrorKind::Configuration`], and [`ErrorKind::Schema`] once it has been
//! promoted with [`Error::at_startup`]) abort the process. Everything else is reported to the
//! caller of a single tool and leaves the server running.

use std::fmt::{Display, Formatter};

/// Discriminant for [`Error`], used in structured tool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    #[serde(rename = "ConfigurationError")]
    Configuration,
    #[serde(rename = "LookupError")]
    Lookup,
    #[serde(rename = "DispatchError")]
    Dispatch,
    #[serde(rename = "SchemaError")]
    Schema,
    #[serde(rename = "InvalidArgumentsError")]
    InvalidArguments,
    #[serde(rename = "NormalizationError")]
    Normalization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Lookup => "LookupError",
            ErrorKind::Dispatch => "DispatchError",
            ErrorKind::Schema => "SchemaError",
            ErrorKind::InvalidArguments => "InvalidArgumentsError",
            ErrorKind::Normalization => "NormalizationError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The crate's error type.
///
/// Each variant carries a human-readable message; the variant itself is the error kind.
///
/// ```
/// use duplocloud_mcp::error::{Error, ErrorKind};
///
/// let e = Error::Lookup("Resource 'nope' not found.".to_string());
/// assert_eq!(e.kind(), ErrorKind::Lookup);
/// assert_eq!(e.to_string(), "Resource 'nope' not found.");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid startup configuration: bad filter pattern, tool name collision, unreadable catalog.
    #[error("{0}")]
    Configuration(String),
    /// An unknown or filtered-out resource or command.
    #[error("{0}")]
    Lookup(String),
    /// The underlying operation failed.
    #[error("{0}")]
    Dispatch(String),
    /// A structured-input model could not be turned into a schema.
    #[error("{0}")]
    Schema(String),
    /// Caller-supplied arguments do not fit the command signature.
    #[error("{0}")]
    InvalidArguments(String),
    /// A dispatch result could not be represented as a tool result.
    #[error("{0}")]
    Normalization(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Lookup(_) => ErrorKind::Lookup,
            Error::Dispatch(_) => ErrorKind::Dispatch,
            Error::Schema(_) => ErrorKind::Schema,
            Error::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Error::Normalization(_) => ErrorKind::Normalization,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Configuration(m)
            | Error::Lookup(m)
            | Error::Dispatch(m)
            | Error::Schema(m)
            | Error::InvalidArguments(m)
            | Error::Normalization(m) => m,
        }
    }

    /// Promotes errors raised while building the tool table into fatal configuration errors.
    pub fn at_startup(self) -> Self {
        match self {
            Error::Schema(m) => Error::Configuration(format!("schema error: {m}")),
            other => other,
        }
    }

    /// The `{"kind", "message"}` object carried in structured tool errors.
    pub fn to_structured(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind(),
            "message": self.message(),
        })
    }
}
