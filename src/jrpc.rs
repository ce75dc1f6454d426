//! JSON-RPC 2.0 message types.
//!
//! The MCP transports exchange these on the wire. A message with an `id` is a [`Request`] and
//! gets exactly one [`Response`]; a message without one is a [`Notification`] and gets nothing.
//!
//! # Examples
//!
//! ```
//! use duplocloud_mcp::jrpc::{Error, Request, Response};
//! use serde_json::json;
//!
//! let request: Request =
//!     serde_json::from_str(r#"{"jsonrpc": "2.0", "method": "ping", "id": 7}"#).unwrap();
//! assert_eq!(request.method, "ping");
//!
//! let ok = Response::new(json!({}), request.id.clone());
//! assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"jsonrpc": "2.0", "result": {}, "id": 7}));
//!
//! let failed: Response<serde_json::Value> = Response::err(Error::method_not_found(), request.id);
//! assert_eq!(failed.error.unwrap().code, -32601);
//! ```
//!
//! A notification has no `id` and so never parses as a request:
//!
//! ```
//! use duplocloud_mcp::jrpc::{Notification, Request};
//!
//! let text = r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#;
//! assert!(serde_json::from_str::<Request>(text).is_err());
//! let notification: Notification = serde_json::from_str(text).unwrap();
//! assert_eq!(notification.method, "notifications/initialized");
//! ```

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A call that expects a response.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

impl Request {
    pub fn new(method: &str, params: Option<serde_json::Value>, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

/// A one-way message.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// The reply to a [`Request`]. Exactly one of `result` and `error` is set.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Response<R> {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
    pub id: serde_json::Value,
}

impl<R> Response<R> {
    pub fn new(result: R, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn err(e: Error, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(e),
            id,
        }
    }

    /// Converts the result into a plain JSON value so responses of different methods share a type.
    ///
    /// A result that cannot be serialized turns the response into an internal error.
    pub fn erase(self) -> Response<serde_json::Value>
    where
        R: Serialize,
    {
        let result = match self.result.map(serde_json::to_value).transpose() {
            Ok(result) => result,
            Err(e) => return Response::err(Error::internal_error(e.to_string()), self.id),
        };
        Response {
            jsonrpc: self.jsonrpc,
            result,
            error: self.error,
            id: self.id,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Error {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: i32, message: String, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message,
            data,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error".to_string(), None)
    }

    pub fn invalid_request() -> Self {
        Self::new(-32600, "Invalid Request".to_string(), None)
    }

    pub fn method_not_found() -> Self {
        Self::new(-32601, "Method not found".to_string(), None)
    }

    pub fn invalid_params(detail: String) -> Self {
        Self::new(-32602, "Invalid params".to_string(), Some(detail.into()))
    }

    pub fn unknown_tool(name: String) -> Self {
        Self::new(-32602, format!("Unknown tool: {name}"), None)
    }

    /// MCP's "resource not found".
    pub fn unknown_resource(uri: &str) -> Self {
        Self::new(
            -32002,
            "Resource not found".to_string(),
            Some(serde_json::json!({ "uri": uri })),
        )
    }

    pub fn internal_error(message: String) -> Self {
        Self::new(-32603, message, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no"))
        }
    }

    #[test]
    fn erase_keeps_errors() {
        let response: Response<()> = Response::err(Error::invalid_request(), json!("a"));
        let erased = response.erase();
        assert_eq!(erased.error, Some(Error::invalid_request()));
        assert_eq!(erased.id, json!("a"));
    }

    #[test]
    fn erase_reports_serialization_failures() {
        let erased = Response::new(Unserializable, json!(3)).erase();
        assert!(erased.result.is_none());
        assert_eq!(erased.error.unwrap().code, -32603);
    }

    #[test]
    fn error_data_is_omitted_when_absent() {
        let value = serde_json::to_value(Error::method_not_found()).unwrap();
        assert_eq!(value, json!({"code": -32601, "message": "Method not found"}));
        let value = serde_json::to_value(Error::unknown_resource("duplo://x")).unwrap();
        assert_eq!(value["data"]["uri"], "duplo://x");
    }
}
