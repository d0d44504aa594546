//! JSON-RPC 2.0 envelope types.
//!
//! Request ids are `u64`, client-assigned, and must be non-zero: `id =
//! 0` is reserved to mean "no id" — used for parse failures that precede
//! knowing the real id. This departs from the JSON-RPC spec's
//! string-or-number id (teachers elsewhere in the ecosystem model it as
//! `RequestId::String | Number`); the numeric-only, monotonically increasing
//! id is what the client correlator and server dispatcher both
//! assume.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string written on the wire.
pub const JSONRPC_VERSION: &str = "2.0";

/// A non-zero, client-assigned request id. `0` means "no id".
pub type RequestId = u64;

/// A JSON-RPC request: expects exactly one response with the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name, e.g. `"call_tool"`.
    pub method: String,
    /// Method parameters, serialized as an owned JSON string by callers that
    /// need to hand it across an arena boundary; stored here as a `Value`
    /// for in-process construction and (de)serialization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Non-zero request id.
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Construct a new request.
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC notification: fire-and-forget, carries no id and expects no
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Construct a new notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    /// Error code, e.g. `-32601`.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Construct a new error with no extra data.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<crate::error::McpError> for JsonRpcError {
    fn from(err: crate::error::McpError) -> Self {
        Self::new(err.rpc_code(), err.message)
    }
}

/// The success-or-error payload half of a [`JsonRpcResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcOutcome {
    /// Successful result.
    Ok {
        /// The method's return value.
        result: Value,
    },
    /// Failure.
    Err {
        /// The error object.
        error: JsonRpcError,
    },
}

/// A JSON-RPC response, carrying the same id as the request it answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// The request id this response answers. `0` for parse errors that never
    /// resolved a real id.
    pub id: RequestId,
    /// Result or error.
    #[serde(flatten)]
    pub outcome: JsonRpcOutcome,
}

impl JsonRpcResponse {
    /// Build a successful response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: JsonRpcOutcome::Ok { result },
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: JsonRpcOutcome::Err { error },
        }
    }

    /// `true` if this response carries a successful result.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JsonRpcOutcome::Ok { .. })
    }

    /// The result value, if this is a successful response.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            JsonRpcOutcome::Ok { result } => Some(result),
            JsonRpcOutcome::Err { .. } => None,
        }
    }

    /// The error object, if this is an error response.
    #[must_use]
    pub fn error_object(&self) -> Option<&JsonRpcError> {
        match &self.outcome {
            JsonRpcOutcome::Ok { .. } => None,
            JsonRpcOutcome::Err { error } => Some(error),
        }
    }
}

/// A parsed incoming message: either a request expecting a response, or a
/// notification that does not.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request awaiting a response.
    Request(JsonRpcRequest),
    /// A fire-and-forget notification.
    Notification(JsonRpcNotification),
}

/// Parse a raw JSON-RPC message body into a request or notification.
///
/// Returns `Err` with id `0` — reserved to mean "no id" — when the body is
/// not valid JSON or is missing `method`.
pub fn parse_incoming(body: &[u8]) -> Result<IncomingMessage, crate::error::McpError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        crate::error::McpError::parse_error(format!("invalid JSON: {e}"))
    })?;

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| crate::error::McpError::invalid_request("missing 'method'"))?
        .to_string();
    let params = value.get("params").cloned();

    match value.get("id") {
        Some(id_value) => {
            let id = id_value
                .as_u64()
                .ok_or_else(|| crate::error::McpError::invalid_request("'id' must be a non-zero unsigned integer"))?;
            if id == 0 {
                return Err(crate::error::McpError::invalid_request("'id' must be non-zero"));
            }
            Ok(IncomingMessage::Request(JsonRpcRequest::new(id, method, params)))
        }
        None => Ok(IncomingMessage::Notification(JsonRpcNotification::new(method, params))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_request_with_id() {
        let body = br#"{"jsonrpc":"2.0","id":1,"method":"call_tool","params":{"name":"echo"}}"#;
        match parse_incoming(body).unwrap() {
            IncomingMessage::Request(req) => {
                assert_eq!(req.id, 1);
                assert_eq!(req.method, "call_tool");
            }
            IncomingMessage::Notification(_) => panic!("expected request"),
        }
    }

    #[test]
    fn parses_notification_without_id() {
        let body = br#"{"jsonrpc":"2.0","method":"ping"}"#;
        match parse_incoming(body).unwrap() {
            IncomingMessage::Notification(n) => assert_eq!(n.method, "ping"),
            IncomingMessage::Request(_) => panic!("expected notification"),
        }
    }

    #[test]
    fn rejects_zero_id() {
        let body = br#"{"jsonrpc":"2.0","id":0,"method":"ping"}"#;
        assert!(parse_incoming(body).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_incoming(b"not json").is_err());
    }

    #[test]
    fn success_response_round_trips() {
        let resp = JsonRpcResponse::success(7, json!({"ok": true}));
        let text = serde_json::to_string(&resp).unwrap();
        let back: JsonRpcResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back.id, 7);
        assert!(back.is_success());
    }
}
