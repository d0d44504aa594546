//! # MCP Server
//!
//! The server-side request pipeline (spec components J, L, M): a
//! [`registry::Registry`] of resources/templates/tools, a
//! [`rate_limit::RateLimiter`], a [`thread_pool::ThreadPool`] of worker
//! tasks, and the [`dispatcher::Dispatcher`] that wires them together into
//! one `message bytes -> response bytes` entry point.
//!
//! [`serve`] drives a single [`mcp_transport_traits::Transport`] connection:
//! receive a message, dispatch it, send back whatever comes out. Each
//! transport instance is one peer connection, so the transport's `endpoint`
//! doubles as the rate limiter's client key.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod dispatcher;
pub mod rate_limit;
pub mod registry;
pub mod thread_pool;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use rate_limit::RateLimiter;
pub use registry::{HandlerFuture, Registry, RegistryBuilder, ResourceHandler, ToolHandler};
pub use thread_pool::{PoolError, PoolStats, ThreadPool};

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use mcp_transport_traits::{Transport, TransportMessage};

/// Drive one transport connection to completion: loop `receive -> dispatch
/// -> send` until the transport reports a clean end-of-stream (`Ok(None)`)
/// or a transport-level error.
///
/// # Errors
/// Returns the transport's error if `receive` or `send` fails. A dispatch
/// failure never reaches here — the dispatcher always turns it into a
/// JSON-RPC error response instead.
pub async fn serve(transport: &dyn Transport, dispatcher: &Arc<Dispatcher>) -> mcp_transport_traits::TransportResult<()> {
    let client_key = transport.endpoint().unwrap_or_else(|| "unknown".to_string());
    loop {
        let Some(message) = transport.receive().await? else {
            debug!(client_key, "transport closed, ending serve loop");
            return Ok(());
        };
        let id = message.id;
        let Some(response_bytes) = dispatcher.dispatch(message.payload.to_vec(), client_key.clone()).await else {
            continue;
        };
        let response = TransportMessage::new(id, Bytes::from(response_bytes));
        if let Err(err) = transport.send(response).await {
            warn!(client_key, %err, "failed to send response, ending serve loop");
            return Err(err);
        }
    }
}
