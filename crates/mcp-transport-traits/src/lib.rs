//! Transport trait contract.
//!
//! Every wire transport (stdio, TCP, WebSocket, MQTT, HTTP, Streamable HTTP)
//! implements the same [`Transport`] trait so the client and server can hold
//! a heterogeneous set of them behind one dynamic-dispatch boundary. This
//! crate carries only the contract and its supporting types — no transport
//! runs here.
//!
//! - **Traits**: [`Transport`]
//! - **Types**: [`TransportType`], [`TransportState`], [`TransportCapabilities`], [`TransportMessage`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`LimitsConfig`], [`TimeoutConfig`], [`TlsConfig`]
//! - **Metrics**: [`TransportMetrics`], [`AtomicMetrics`]
//!
//! ```rust,ignore
//! use mcp_transport_traits::{Transport, TransportResult, TransportMessage};
//! use async_trait::async_trait;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     fn transport_type(&self) -> TransportType { /* ... */ }
//!     // ... other trait methods
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod config;
mod error;
mod message;
mod metrics;
mod traits;
mod types;

// Re-export all public items
pub use config::{LimitsConfig, TimeoutConfig, TlsConfig, TlsVersion};
pub use error::{TransportError, TransportResult};
pub use message::{TransportMessage, TransportMessageMetadata};
pub use metrics::{AtomicMetrics, TransportMetrics};
pub use traits::Transport;
pub use types::{TransportCapabilities, TransportConfig, TransportState, TransportType};

// Re-export validation functions
pub use error::{validate_request_size, validate_response_size};
