//! # MCP Core
//!
//! Foundational primitives shared by every other crate in this workspace: the
//! unified error type, the JSON-RPC 2.0 envelope, a per-worker scratch arena,
//! pooled byte buffers, and thin wrappers around the synchronization
//! primitives the rest of the runtime builds on.
//!
//! ## Module organization
//!
//! - [`error`]: [`McpError`] / [`ErrorKind`], the single error type for the workspace
//! - [`jsonrpc`]: JSON-RPC 2.0 request/response/notification types
//! - [`arena`]: bump-allocated scratch arena, reset per request
//! - [`buffer_pool`]: size-classed byte buffer recycling
//! - [`sync`]: condvar-style wait primitives used by the correlator and pool

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod arena;
pub mod buffer_pool;
pub mod error;
pub mod jsonrpc;
pub mod sync;

pub use error::{ErrorKind, McpError, McpResult};
pub use jsonrpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};

/// MCP protocol version implemented by this runtime.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Maximum message size accepted by stream transports, in bytes (1 MiB).
///
/// The length prefix is sanity-checked against this bound before a body is
/// read off the wire.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default request timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default cache entry time-to-live, in milliseconds.
pub const DEFAULT_CACHE_TTL_MS: u64 = 60_000;

/// Well-known MCP method names dispatched by the server.
pub mod methods {
    /// List static resources.
    pub const LIST_RESOURCES: &str = "list_resources";
    /// List resource templates.
    pub const LIST_RESOURCE_TEMPLATES: &str = "list_resource_templates";
    /// Read a resource by URI, consulting the cache first.
    pub const READ_RESOURCE: &str = "read_resource";
    /// List registered tools.
    pub const LIST_TOOLS: &str = "list_tools";
    /// Invoke a tool by name.
    pub const CALL_TOOL: &str = "call_tool";
}

/// JSON-RPC 2.0 and MCP application error codes.
pub mod error_codes {
    /// Parse error.
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Start of the application-defined error band (inclusive).
    pub const APPLICATION_ERROR: i32 = -32000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_constants() {
        assert_eq!(MAX_MESSAGE_SIZE, 1024 * 1024);
        assert_eq!(DEFAULT_TIMEOUT_MS, 30_000);
    }
}
