//! WebSocket transport — one JSON-RPC message per WebSocket text frame.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{error, info};

use mcp_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A client-side WebSocket transport. One message per text frame, carrying
/// the JSON-RPC body verbatim — no length-prefix framing is needed since
/// the WebSocket protocol already delimits frames.
#[derive(Debug)]
pub struct WebSocketTransport {
    sink: AsyncMutex<Option<futures::stream::SplitSink<WsStream, Message>>>,
    inbox: AsyncMutex<mpsc::Receiver<TransportMessage>>,
    inbox_tx: mpsc::Sender<TransportMessage>,
    state: SyncMutex<TransportState>,
    capabilities: TransportCapabilities,
    metrics: Arc<AtomicMetrics>,
    reader_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
    url: String,
}

impl WebSocketTransport {
    /// Connect to `url` (`ws://` or `wss://`) and spawn the read loop.
    pub async fn connect_url(url: impl Into<String>) -> TransportResult<Self> {
        let url = url.into();
        let (stream, _response) = connect_async(&url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (sink, mut stream) = stream.split();
        let (tx, rx) = mpsc::channel(256);
        let metrics = Arc::new(AtomicMetrics::default());
        let reader_metrics = metrics.clone();
        let reader_tx = tx.clone();
        let handle = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        reader_metrics
                            .bytes_received
                            .fetch_add(text.len() as u64, Ordering::Relaxed);
                        reader_metrics
                            .messages_received
                            .fetch_add(1, Ordering::Relaxed);
                        let msg = TransportMessage::new(0, Bytes::from(text.into_bytes()));
                        if reader_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Binary(bytes)) => {
                        let msg = TransportMessage::new(0, Bytes::from(bytes));
                        if reader_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket peer closed connection");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!(error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
        });
        Ok(Self {
            sink: AsyncMutex::new(Some(sink)),
            inbox: AsyncMutex::new(rx),
            inbox_tx: tx,
            state: SyncMutex::new(TransportState::Connected),
            capabilities: TransportCapabilities {
                max_message_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
                supports_bidirectional: true,
                supports_streaming: true,
                ..Default::default()
            },
            metrics,
            reader_task: SyncMutex::new(Some(handle)),
            url,
        })
    }

    /// A disconnected transport with no live socket, useful for tests.
    #[doc(hidden)]
    #[must_use]
    pub fn new_disconnected(url: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            sink: AsyncMutex::new(None),
            inbox: AsyncMutex::new(rx),
            inbox_tx: tx,
            state: SyncMutex::new(TransportState::Disconnected),
            capabilities: TransportCapabilities::default(),
            metrics: Arc::new(AtomicMetrics::default()),
            reader_task: SyncMutex::new(None),
            url: url.into(),
        }
    }
}

impl Transport for WebSocketTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().clone() })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(mut sink) = self.sink.lock().await.take() {
                let _ = sink.close().await;
            }
            if let Some(handle) = self.reader_task.lock().take() {
                handle.abort();
            }
            *self.state.lock() = TransportState::Disconnected;
            Ok(())
        })
    }

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut guard = self.sink.lock().await;
            let sink = guard
                .as_mut()
                .ok_or_else(|| TransportError::ConnectionLost("WebSocket not connected".into()))?;
            let text = String::from_utf8(message.payload.to_vec())
                .map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
            sink.send(Message::Text(text.clone().into()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            self.metrics
                .bytes_sent
                .fetch_add(text.len() as u64, Ordering::Relaxed);
            self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }

    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move { Ok(self.inbox.lock().await.recv().await) })
    }

    fn metrics(&self) -> Pin<Box<dyn Future<Output = TransportMetrics> + Send + '_>> {
        Box::pin(async move { self.metrics.snapshot() })
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.url.clone())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_transport_reports_its_state() {
        let t = WebSocketTransport::new_disconnected("ws://example.invalid/mcp");
        assert_eq!(t.state().await, TransportState::Disconnected);
        assert_eq!(t.endpoint(), Some("ws://example.invalid/mcp".to_string()));
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let t = WebSocketTransport::new_disconnected("ws://example.invalid/mcp");
        let err = t
            .send(TransportMessage::new(0, Bytes::from("{}")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost(_)));
    }
}
