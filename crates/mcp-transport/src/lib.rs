//! Wire transport implementations for MCP.
//!
//! Every transport in this crate implements [`mcp_transport_traits::Transport`]
//! so the client and server can hold a heterogeneous set of them behind one
//! dynamic-dispatch boundary. `mcp-transport-traits` owns the contract itself;
//! this crate only supplies concrete wire formats:
//!
//! - [`stdio`] — newline-delimited JSON over stdin/stdout (the default MCP
//!   wire for subprocess servers).
//! - [`tcp`] — length-prefixed framed TCP, both client and server sides.
//! - [`pool`] — a bounded, stripe-locked pool of pre-connected TCP transports.
//! - [`websocket`] — framed JSON over a `tokio-tungstenite` WebSocket.
//! - [`mqtt`] — a request/response topic pair over an MQTT broker, gated
//!   behind the `mqtt` feature.
//! - [`http`] — a single-shot `POST /call_tool` demo endpoint.
//! - [`streamable_http`] — the hybrid POST + resumable-SSE server transport.
//! - [`streamable_http_client`] — the matching client state machine.
//! - [`framing`] — the shared `[u32 length_be][payload]` codec used by any
//!   stream transport (TCP, stdio-binary).

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod framing;
pub mod http;
pub mod pool;
pub mod stdio;
pub mod streamable_http;
pub mod streamable_http_client;
pub mod tcp;
pub mod websocket;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use mcp_transport_traits::{
    LimitsConfig, TimeoutConfig, TlsConfig, Transport, TransportCapabilities, TransportConfig,
    TransportError, TransportMessage, TransportMessageMetadata, TransportResult, TransportState,
    TransportType,
};
