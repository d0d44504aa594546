//! Unified error type for the MCP runtime.
//!
//! A single [`McpError`] is used across every crate in the workspace instead
//! of one bespoke error enum per component. [`ErrorKind`] classifies the
//! failure for programmatic handling; [`ErrorKind::rpc_code`] maps it to the
//! JSON-RPC error code the dispatcher puts on the wire: malformed input is
//! `Validation`, missing handlers are `NotFound`, transport hiccups are
//! `Transport`, and so on.

use std::fmt;

/// Result type alias for MCP operations.
pub type McpResult<T> = std::result::Result<T, McpError>;

/// Error classification used for both programmatic handling and JSON-RPC
/// error code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed JSON on the wire.
    ParseError,
    /// Well-formed JSON that is not a valid JSON-RPC request.
    InvalidRequest,
    /// No handler registered for the requested method.
    MethodNotFound,
    /// Request parameters failed schema or type validation.
    InvalidParams,
    /// A tool name has no matching registration.
    ToolNotFound,
    /// A registered tool handler reported failure.
    ToolExecutionFailed,
    /// A resource URI has no matching registration or cache entry.
    ResourceNotFound,
    /// Connect, read, write, or peer-close failure on a transport.
    Transport,
    /// An operation did not complete before its deadline.
    Timeout,
    /// The thread pool queue was full or a dependency is unavailable.
    Unavailable,
    /// A client exceeded its rate-limit window.
    RateLimited,
    /// Invariant violation or allocation failure with no more specific kind.
    Internal,
    /// Malformed configuration supplied by the caller.
    Configuration,
    /// Bearer API key missing or rejected.
    Authentication,
}

impl ErrorKind {
    /// The JSON-RPC error code this kind maps to on the wire.
    #[must_use]
    pub const fn rpc_code(self) -> i32 {
        use crate::error_codes::*;
        match self {
            Self::ParseError => PARSE_ERROR,
            Self::InvalidRequest => INVALID_REQUEST,
            Self::MethodNotFound => METHOD_NOT_FOUND,
            Self::InvalidParams => INVALID_PARAMS,
            Self::Internal | Self::ToolExecutionFailed => INTERNAL_ERROR,
            // Tool/resource not-found, rate limiting, capacity, and transport
            // failures all surface in the application band.
            Self::ToolNotFound
            | Self::ResourceNotFound
            | Self::Transport
            | Self::Timeout
            | Self::Unavailable
            | Self::RateLimited
            | Self::Configuration
            | Self::Authentication => APPLICATION_ERROR,
        }
    }
}

/// The unified error type returned by every fallible operation in this
/// workspace. Never panics or unwinds across an API boundary; components
/// return this instead of raising.
#[derive(Debug, Clone)]
pub struct McpError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message. Never includes secrets or internal paths.
    pub message: String,
    /// Component that raised the error, for logging (e.g. `"cache"`, `"pool"`).
    pub component: Option<&'static str>,
}

impl McpError {
    /// Create a new error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            component: None,
        }
    }

    /// Attach the originating component name, for structured logging.
    #[must_use]
    pub fn with_component(mut self, component: &'static str) -> Self {
        self.component = Some(component);
        self
    }

    /// The JSON-RPC error code for this error.
    #[must_use]
    pub const fn rpc_code(&self) -> i32 {
        self.kind.rpc_code()
    }

    /// Shorthand for [`ErrorKind::ParseError`].
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    /// Shorthand for [`ErrorKind::InvalidRequest`].
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Shorthand for [`ErrorKind::MethodNotFound`].
    #[must_use]
    pub fn method_not_found(method: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::MethodNotFound,
            format!("Method not found: {}", method.as_ref()),
        )
    }

    /// Shorthand for [`ErrorKind::InvalidParams`].
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    /// Shorthand for [`ErrorKind::ToolNotFound`].
    #[must_use]
    pub fn tool_not_found(name: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::ToolNotFound,
            format!("Tool not found: {}", name.as_ref()),
        )
        .with_component("registry")
    }

    /// Shorthand for [`ErrorKind::ResourceNotFound`].
    #[must_use]
    pub fn resource_not_found(uri: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::ResourceNotFound,
            format!("Resource not found: {}", uri.as_ref()),
        )
        .with_component("registry")
    }

    /// Shorthand for [`ErrorKind::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Shorthand for [`ErrorKind::Transport`].
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message).with_component("transport")
    }

    /// Shorthand for [`ErrorKind::Timeout`].
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Shorthand for [`ErrorKind::RateLimited`].
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message).with_component("rate_limiter")
    }

    /// Shorthand for [`ErrorKind::Unavailable`] (thread pool queue full, etc).
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component {
            Some(c) => write!(f, "[{c}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for McpError {}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_codes_match_error_bands() {
        assert_eq!(ErrorKind::ParseError.rpc_code(), -32700);
        assert_eq!(ErrorKind::InvalidRequest.rpc_code(), -32600);
        assert_eq!(ErrorKind::MethodNotFound.rpc_code(), -32601);
        assert_eq!(ErrorKind::InvalidParams.rpc_code(), -32602);
        assert_eq!(ErrorKind::Internal.rpc_code(), -32603);
        assert_eq!(ErrorKind::ToolNotFound.rpc_code(), -32000);
        assert_eq!(ErrorKind::RateLimited.rpc_code(), -32000);
    }

    #[test]
    fn display_includes_component() {
        let err = McpError::tool_not_found("echo");
        assert_eq!(err.to_string(), "[registry] Tool not found: echo");
    }
}
