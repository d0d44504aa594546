//! Core transport traits.

use std::future::Future;
use std::pin::Pin;

use crate::error::TransportResult;
use crate::message::TransportMessage;
use crate::metrics::TransportMetrics;
use crate::types::{TransportCapabilities, TransportConfig, TransportState, TransportType};

/// The core trait for all transport implementations.
///
/// This trait defines the essential, asynchronous operations for a message-based
/// communication channel, such as connecting, disconnecting, sending, and receiving.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Returns the type of this transport.
    fn transport_type(&self) -> TransportType;

    /// Returns the capabilities of this transport.
    fn capabilities(&self) -> &TransportCapabilities;

    /// Returns the current state of the transport.
    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>>;

    /// Establishes a connection to the remote endpoint.
    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Closes the connection to the remote endpoint.
    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Sends a single message over the transport.
    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Receives a single message from the transport in a non-blocking way.
    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>>;

    /// Returns a snapshot of the transport's current performance metrics.
    fn metrics(&self) -> Pin<Box<dyn Future<Output = TransportMetrics> + Send + '_>>;

    /// Returns `true` if the transport is currently in the `Connected` state.
    fn is_connected(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { matches!(self.state().await, TransportState::Connected) })
    }

    /// Returns the endpoint address or identifier for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }

    /// Applies a new configuration to the transport.
    fn configure(
        &self,
        config: TransportConfig,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let _ = config;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait can be used as a trait object.
    fn _test_transport_object(_t: &dyn Transport) {}
}
