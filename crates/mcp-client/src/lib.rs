//! # MCP Client
//!
//! The client-side correlation layer (spec component M): assigns request
//! ids, tracks pending requests against a deadline, and routes inbound
//! messages back to their waiting caller or, for messages with no matching
//! id, to a notification callback.
//!
//! [`correlator::Correlator`] is transport-agnostic — it holds any
//! `Arc<dyn Transport>` and works the same way whether that transport is a
//! TCP socket, a WebSocket, or a one-shot HTTP POST.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod correlator;

pub use correlator::{Correlator, NotificationCallback};
