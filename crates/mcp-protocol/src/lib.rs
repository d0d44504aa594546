//! MCP data model.
//!
//! Types for the pieces every transport and the dispatcher agree on:
//! resources, resource templates, tools, content items, and the JSON-RPC
//! message envelope re-exported from [`mcp_core`]. These are the wire
//! shapes; the registry that owns them lives in `mcp-server`, the
//! cache that fronts `read_resource` in `mcp-cache`.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod capabilities;
pub mod content;
pub mod resources;
pub mod tools;

pub use content::ContentItem;
pub use mcp_core::jsonrpc::{
    IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcOutcome, JsonRpcRequest,
    JsonRpcResponse, RequestId,
};
pub use mcp_core::{ErrorKind, MAX_MESSAGE_SIZE, McpError, McpResult};

/// Alias for [`RequestId`] used at the transport boundary, where a message
/// is identified before it is known to be a request, notification, or
/// response.
pub type MessageId = RequestId;
pub use resources::{ListResourceTemplatesResult, ListResourcesResult, ReadResourceResult, Resource, ResourceTemplate};
pub use tools::{CallToolResult, ListToolsResult, ParamSchema, ParamType, Tool};
