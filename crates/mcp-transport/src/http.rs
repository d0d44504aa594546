//! Plain request/response HTTP transport — the `POST /call_tool` demo
//! endpoint.
//!
//! Unlike the stream transports, plain HTTP has no standing connection to
//! read from: each POST body is one request, and the handler blocks until
//! [`Transport::send`] delivers the matching response. This transport
//! bridges that shape onto the same `receive`/`send` contract as the other
//! transports by handing each inbound POST a locally unique id and parking
//! a oneshot reply channel under it until `send` is called with that id.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use mcp_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};

struct Shared {
    inbox_tx: mpsc::Sender<TransportMessage>,
    pending: SyncMutex<HashMap<u64, oneshot::Sender<Bytes>>>,
    next_id: AtomicU64,
    metrics: Arc<AtomicMetrics>,
}

/// A `POST /call_tool` HTTP server transport.
#[derive(Debug)]
pub struct HttpTransport {
    shared: Arc<Shared>,
    inbox: tokio::sync::Mutex<mpsc::Receiver<TransportMessage>>,
    addr: SocketAddr,
    capabilities: TransportCapabilities,
    server_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Bind the demo endpoint to `addr` and start serving immediately.
    pub async fn bind(addr: SocketAddr) -> TransportResult<Self> {
        let (tx, rx) = mpsc::channel(256);
        let shared = Arc::new(Shared {
            inbox_tx: tx,
            pending: SyncMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            metrics: Arc::new(AtomicMetrics::default()),
        });

        let router = axum::Router::new()
            .route("/call_tool", post(handle_call_tool))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let bound_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!(error = %e, "HTTP demo transport server exited");
            }
        });

        Ok(Self {
            shared,
            inbox: tokio::sync::Mutex::new(rx),
            addr: bound_addr,
            capabilities: TransportCapabilities {
                max_message_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
                supports_bidirectional: false,
                ..Default::default()
            },
            server_task: SyncMutex::new(Some(handle)),
        })
    }
}

async fn handle_call_tool(
    State(shared): State<Arc<Shared>>,
    body: Bytes,
) -> impl IntoResponse {
    shared
        .metrics
        .bytes_received
        .fetch_add(body.len() as u64, Ordering::Relaxed);
    shared.metrics.messages_received.fetch_add(1, Ordering::Relaxed);

    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
    let (reply_tx, reply_rx) = oneshot::channel();
    shared.pending.lock().insert(id, reply_tx);

    if shared
        .inbox_tx
        .send(TransportMessage::new(id, body))
        .await
        .is_err()
    {
        shared.pending.lock().remove(&id);
        return (StatusCode::SERVICE_UNAVAILABLE, "dispatcher unavailable").into_response();
    }

    match reply_rx.await {
        Ok(response) => {
            shared
                .metrics
                .bytes_sent
                .fetch_add(response.len() as u64, Ordering::Relaxed);
            shared.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
            (
                StatusCode::OK,
                [("content-type", "application/json")],
                response,
            )
                .into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "response dropped").into_response(),
    }
}

impl Transport for HttpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { TransportState::Connected })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(handle) = self.server_task.lock().take() {
                handle.abort();
            }
            Ok(())
        })
    }

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let sender = self.shared.pending.lock().remove(&message.id);
            match sender {
                Some(sender) => sender
                    .send(message.payload)
                    .map_err(|_| TransportError::SendFailed("caller hung up".into())),
                None => Err(TransportError::ProtocolError(format!(
                    "no pending HTTP request for id {}",
                    message.id
                ))),
            }
        })
    }

    fn receive(
        &self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move { Ok(self.inbox.lock().await.recv().await) })
    }

    fn metrics(&self) -> Pin<Box<dyn Future<Output = TransportMetrics> + Send + '_>> {
        Box::pin(async move { self.shared.metrics.snapshot() })
    }

    fn endpoint(&self) -> Option<String> {
        Some(format!("http://{}/call_tool", self.addr))
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.server_task.lock().take() {
            handle.abort();
        }
    }
}

/// Client side of the `POST /call_tool` demo endpoint.
///
/// Plain HTTP has no standing connection to multiplex responses over, so
/// `send` performs the whole request/response round trip itself and queues
/// the result for `receive` to pick up — the correlator's wait resolves the
/// moment `send` returns, same as the spec's other HTTP-style transports.
#[derive(Debug)]
pub struct HttpClientTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    inbox_tx: mpsc::Sender<TransportMessage>,
    inbox: tokio::sync::Mutex<mpsc::Receiver<TransportMessage>>,
    metrics: Arc<AtomicMetrics>,
    capabilities: TransportCapabilities,
}

impl HttpClientTransport {
    /// Point a client at `base_url` (no trailing slash), optionally
    /// authenticating with a bearer `api_key`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            inbox_tx: tx,
            inbox: tokio::sync::Mutex::new(rx),
            metrics: Arc::new(AtomicMetrics::default()),
            capabilities: TransportCapabilities {
                max_message_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
                supports_bidirectional: false,
                ..Default::default()
            },
        }
    }
}

impl Transport for HttpClientTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { TransportState::Connected })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.metrics
                .bytes_sent
                .fetch_add(message.payload.len() as u64, Ordering::Relaxed);
            self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);

            let mut req = self
                .client
                .post(format!("{}/call_tool", self.base_url))
                .header("content-type", "application/json")
                .body(message.payload);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            let response = req
                .send()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            if !status.is_success() {
                return Err(TransportError::ProtocolError(format!(
                    "HTTP {status} from {}",
                    self.base_url
                )));
            }

            self.metrics
                .bytes_received
                .fetch_add(body.len() as u64, Ordering::Relaxed);
            self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);

            self.inbox_tx
                .send(TransportMessage::new(message.id, body))
                .await
                .map_err(|_| TransportError::Internal("response inbox closed".into()))
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
        Some(format!("{}/call_tool", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn posts_are_delivered_and_answered() {
        let transport = HttpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let endpoint = transport.endpoint().unwrap();

        let responder = tokio::spawn(async move {
            let msg = transport.receive().await.unwrap().unwrap();
            let reply = Bytes::from(json!({"jsonrpc": "2.0", "id": 1, "result": {}}).to_string());
            transport
                .send(TransportMessage::new(msg.id, reply))
                .await
                .unwrap();
        });

        let client = reqwest::Client::new();
        let response = client
            .post(&endpoint)
            .body(json!({"jsonrpc": "2.0", "id": 1, "method": "call_tool"}).to_string())
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        responder.await.unwrap();
    }
}
