//! # MCP
//!
//! Umbrella crate for the Model Context Protocol runtime: a JSON-RPC 2.0
//! request/response and notification protocol for discovering and invoking
//! resources and tools across several wire transports.
//!
//! This crate re-exports the workspace's member crates under one namespace
//! so a consumer depends on a single `mcp = "0.1"` rather than wiring up
//! `mcp-core`, `mcp-protocol`, `mcp-transport`, `mcp-server`, and
//! `mcp-client` by hand. Each member crate still ships standalone for
//! callers who only need, say, the URI-template engine or the transport
//! trait.
//!
//! ## Layout
//!
//! - [`core`] — error type, JSON-RPC envelope, arena, buffer pools
//! - [`protocol`] — resources, tools, content items, the wire data model
//! - [`transport`] — the [`Transport`] trait and its concrete wire formats
//! - [`cache`] — the striped LRU-K cache fronting `read_resource`
//! - [`uri_template`] — the `{placeholder}` template engine
//! - [`server`] — registry, dispatcher, thread pool, rate limiter
//! - [`client`] — the request/response correlator
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp::prelude::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let registry = Registry::builder()
//!     .tool(
//!         Tool::new("echo").with_param(ParamSchema::required("text", ParamType::String)),
//!         Arc::new(EchoTool),
//!     )
//!     .build()?;
//! let dispatcher = Dispatcher::new(Arc::new(registry), DispatcherConfig::default());
//!
//! let transport = mcp_transport::tcp::TcpTransport::connect_to("127.0.0.1:9000".parse()?).await?;
//! serve(&transport, &dispatcher).await?;
//! # Ok(())
//! # }
//!
//! # struct EchoTool;
//! # impl ToolHandler for EchoTool {
//! #     fn call(&self, arguments: serde_json::Value) -> HandlerFuture<(Vec<ContentItem>, bool)> {
//! #         Box::pin(async move {
//! #             let text = arguments.get("text").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
//! #             Ok((vec![ContentItem::text(text)], false))
//! #         })
//! #     }
//! # }
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![deny(unsafe_code)]

pub use mcp_cache as cache;
pub use mcp_client as client;
pub use mcp_core as core;
pub use mcp_protocol as protocol;
pub use mcp_server as server;
pub use mcp_transport as transport;
pub use mcp_transport_traits as transport_traits;
pub use mcp_uri_template as uri_template;

pub use mcp_core::{McpError, McpResult, PROTOCOL_VERSION};
pub use mcp_server::serve;
pub use mcp_transport_traits::{Transport, TransportError, TransportResult};

/// Glob import for the common pieces a server or client binary needs:
/// the registry builder and handler traits, the dispatcher, the data
/// model, the correlator, and the `serve` loop.
pub mod prelude {
    pub use mcp_client::Correlator;
    pub use mcp_core::{McpError, McpResult};
    pub use mcp_protocol::{
        CallToolResult, ContentItem, ListResourcesResult, ListResourceTemplatesResult,
        ListToolsResult, ParamSchema, ParamType, ReadResourceResult, Resource, ResourceTemplate,
        Tool,
    };
    pub use mcp_server::{
        Dispatcher, DispatcherConfig, HandlerFuture, Registry, RegistryBuilder, ResourceHandler,
        ToolHandler, serve,
    };
    pub use mcp_transport_traits::{Transport, TransportError, TransportResult};
    pub use mcp_uri_template::Template;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_version_is_exposed() {
        assert!(!PROTOCOL_VERSION.is_empty());
    }
}
