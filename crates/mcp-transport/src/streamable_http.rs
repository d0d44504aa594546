//! Streamable HTTP server transport: one `POST /mcp` request/response
//! endpoint plus a `GET /mcp` resumable Server-Sent-Events stream, joined
//! by an optional `Mcp-Session-Id`.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;

use mcp_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};

const SESSION_HEADER: &str = "mcp-session-id";
const LAST_EVENT_HEADER: &str = "last-event-id";
/// How many past events each session keeps for SSE resume.
const EVENT_HISTORY: usize = 256;

#[derive(Clone)]
struct SseEvent {
    id: u64,
    event_type: String,
    data: String,
}

struct Session {
    history: SyncMutex<VecDeque<SseEvent>>,
    next_event_id: AtomicU64,
    broadcaster: broadcast::Sender<SseEvent>,
}

impl Session {
    fn new() -> Self {
        let (broadcaster, _) = broadcast::channel(256);
        Self {
            history: SyncMutex::new(VecDeque::with_capacity(EVENT_HISTORY)),
            next_event_id: AtomicU64::new(1),
            broadcaster,
        }
    }

    fn emit(&self, event_type: &str, data: String) -> u64 {
        let id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        let event = SseEvent {
            id,
            event_type: event_type.to_string(),
            data,
        };
        let mut history = self.history.lock();
        if history.len() == EVENT_HISTORY {
            history.pop_front();
        }
        history.push_back(event.clone());
        drop(history);
        let _ = self.broadcaster.send(event);
        id
    }

    fn replay_after(&self, last_event_id: u64) -> Vec<SseEvent> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.id > last_event_id)
            .cloned()
            .collect()
    }
}

struct Shared {
    inbox_tx: mpsc::Sender<TransportMessage>,
    pending: SyncMutex<HashMap<u64, oneshot::Sender<Bytes>>>,
    pending_session: SyncMutex<HashMap<u64, String>>,
    sessions: SyncMutex<HashMap<String, Arc<Session>>>,
    next_id: AtomicU64,
    metrics: Arc<AtomicMetrics>,
    mcp_path: String,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}

/// Hybrid POST request/response + resumable SSE server transport.
#[derive(Debug)]
pub struct StreamableHttpTransport {
    shared: Arc<Shared>,
    inbox: tokio::sync::Mutex<mpsc::Receiver<TransportMessage>>,
    addr: SocketAddr,
    capabilities: TransportCapabilities,
    server_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StreamableHttpTransport {
    /// Bind the `/mcp` endpoint (configurable path) and start serving.
    pub async fn bind(addr: SocketAddr, mcp_path: &str) -> TransportResult<Self> {
        let (tx, rx) = mpsc::channel(256);
        let shared = Arc::new(Shared {
            inbox_tx: tx,
            pending: SyncMutex::new(HashMap::new()),
            pending_session: SyncMutex::new(HashMap::new()),
            sessions: SyncMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            metrics: Arc::new(AtomicMetrics::default()),
            mcp_path: mcp_path.to_string(),
        });

        let router = axum::Router::new()
            .route(
                mcp_path,
                post(handle_post).get(handle_sse).delete(handle_terminate),
            )
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let bound_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!(error = %e, "Streamable HTTP transport server exited");
            }
        });

        Ok(Self {
            shared,
            inbox: tokio::sync::Mutex::new(rx),
            addr: bound_addr,
            capabilities: TransportCapabilities {
                max_message_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
                supports_bidirectional: true,
                supports_streaming: true,
                ..Default::default()
            },
            server_task: SyncMutex::new(Some(handle)),
        })
    }

    /// Push a server-initiated SSE event (type `message` unless `event_type`
    /// overrides it) to every SSE stream open on `session_id`.
    pub fn push_event(&self, session_id: &str, event_type: &str, data: String) -> Option<u64> {
        let sessions = self.shared.sessions.lock();
        sessions.get(session_id).map(|s| s.emit(event_type, data))
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

async fn handle_post(
    State(shared): State<Arc<Shared>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    shared
        .metrics
        .bytes_received
        .fetch_add(body.len() as u64, Ordering::Relaxed);
    shared.metrics.messages_received.fetch_add(1, Ordering::Relaxed);

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(new_session_id);
    shared
        .sessions
        .lock()
        .entry(session_id.clone())
        .or_insert_with(|| Arc::new(Session::new()));

    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
    let (reply_tx, reply_rx) = oneshot::channel();
    shared.pending.lock().insert(id, reply_tx);
    shared
        .pending_session
        .lock()
        .insert(id, session_id.clone());

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
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json");
            if let Ok(value) = HeaderValue::from_str(&session_id) {
                builder = builder.header(SESSION_HEADER, value);
            }
            builder.body(Body::from(response)).into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "response dropped").into_response(),
    }
}

async fn handle_sse(State(shared): State<Arc<Shared>>, headers: HeaderMap) -> Response {
    let Some(session_id) = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return (StatusCode::BAD_REQUEST, "missing Mcp-Session-Id").into_response();
    };
    let session = {
        let mut sessions = shared.sessions.lock();
        sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Session::new()))
            .clone()
    };
    let last_event_id: u64 = headers
        .get(LAST_EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let backlog = VecDeque::from(session.replay_after(last_event_id));
    let receiver = session.broadcaster.subscribe();

    let stream = futures::stream::unfold((backlog, receiver), |(mut backlog, mut receiver)| async move {
        if let Some(event) = backlog.pop_front() {
            return Some((Ok::<_, std::convert::Infallible>(format_sse(&event)), (backlog, receiver)));
        }
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((Ok(format_sse(&event)), (backlog, receiver))),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .expect("static SSE response is well-formed")
}

fn format_sse(event: &SseEvent) -> String {
    format!(
        "id: {}\nevent: {}\ndata: {}\n\n",
        event.id, event.event_type, event.data
    )
}

async fn handle_terminate(State(shared): State<Arc<Shared>>, headers: HeaderMap) -> Response {
    if let Some(session_id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        shared.sessions.lock().remove(session_id);
    }
    StatusCode::NO_CONTENT.into_response()
}

impl Transport for StreamableHttpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::StreamableHttp
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
            self.shared.pending_session.lock().remove(&message.id);
            let sender = self.shared.pending.lock().remove(&message.id);
            match sender {
                Some(sender) => sender
                    .send(message.payload)
                    .map_err(|_| TransportError::SendFailed("caller hung up".into())),
                None => Err(TransportError::ProtocolError(format!(
                    "no pending request for id {}",
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
        Some(format!("http://{}{}", self.addr, self.shared.mcp_path))
    }
}

impl Drop for StreamableHttpTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.server_task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sse_replays_events_after_last_event_id() {
        let session = Session::new();
        session.emit("message", "one".into());
        session.emit("message", "two".into());
        session.emit("message", "three".into());
        let replay = session.replay_after(1);
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].id, 2);
        assert_eq!(replay[1].id, 3);
    }

    #[tokio::test]
    async fn history_caps_at_event_history_limit() {
        let session = Session::new();
        for i in 0..(EVENT_HISTORY + 10) {
            session.emit("message", i.to_string());
        }
        assert_eq!(session.history.lock().len(), EVENT_HISTORY);
    }
}
