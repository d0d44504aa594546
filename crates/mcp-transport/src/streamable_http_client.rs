//! Streamable HTTP client: the `Disconnected → Connecting → Connected →
//! SseConnecting → SseConnected ↔ Reconnecting → Error` state machine that
//! pairs POST request/response with a resumable SSE stream.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use mcp_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};

/// The client-visible connection phase, richer than [`TransportState`]:
/// `TransportState::Connected` covers both `Connected` and `SseConnected`
/// here, since only the SSE half of the machine has these extra phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// No POST has succeeded yet and no SSE stream is open.
    Disconnected,
    /// A POST or the first SSE GET is in flight.
    Connecting,
    /// Ready to POST; no SSE stream open.
    Connected,
    /// The SSE GET is being (re)established.
    SseConnecting,
    /// The SSE stream is open and delivering events.
    SseConnected,
    /// The SSE stream dropped and is waiting to retry.
    Reconnecting,
    /// `max_reconnect_attempts` was exhausted.
    Error,
}

/// Configuration for the SSE half of the state machine.
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Delay between a dropped stream and the next reconnect attempt.
    pub reconnect_delay: Duration,
    /// `0` means unlimited attempts.
    pub max_reconnect_attempts: u32,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_attempts: 0,
        }
    }
}

struct State {
    phase: ClientPhase,
    session_id: Option<String>,
    last_event_id: u64,
}

/// A Streamable HTTP client transport.
#[derive(Debug)]
pub struct StreamableHttpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    sse_config: SseConfig,
    state: SyncMutex<State>,
    inbox: tokio::sync::Mutex<mpsc::Receiver<TransportMessage>>,
    inbox_tx: mpsc::Sender<TransportMessage>,
    capabilities: TransportCapabilities,
    metrics: Arc<AtomicMetrics>,
    sse_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
    sse_events_received: AtomicU64,
}

impl StreamableHttpClient {
    /// Build a client pointed at `base_url` (e.g. `http://host:port/mcp`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, sse_config: SseConfig) -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            sse_config,
            state: SyncMutex::new(State {
                phase: ClientPhase::Disconnected,
                session_id: None,
                last_event_id: 0,
            }),
            inbox: tokio::sync::Mutex::new(rx),
            inbox_tx: tx,
            capabilities: TransportCapabilities {
                max_message_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
                supports_bidirectional: true,
                supports_streaming: true,
                ..Default::default()
            },
            metrics: Arc::new(AtomicMetrics::default()),
            sse_task: SyncMutex::new(None),
            sse_events_received: AtomicU64::new(0),
        }
    }

    /// The current, more granular client phase.
    #[must_use]
    pub fn phase(&self) -> ClientPhase {
        self.state.lock().phase
    }

    /// Total SSE events delivered across the whole connection lifetime,
    /// including before any reconnect.
    #[must_use]
    pub fn sse_events_received(&self) -> u64 {
        self.sse_events_received.load(Ordering::Relaxed)
    }

    fn auth_header(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Open the resumable SSE stream. Safe to call once; reconnects happen
    /// internally without the caller re-invoking this.
    pub fn start_sse(self: &Arc<Self>) {
        self.state.lock().phase = ClientPhase::SseConnecting;
        let this = self.clone();
        let handle = tokio::spawn(async move { this.sse_loop().await });
        *self.sse_task.lock() = Some(handle);
    }

    async fn sse_loop(self: Arc<Self>) {
        let mut attempts: u32 = 0;
        loop {
            let last_event_id = self.state.lock().last_event_id;
            let session_id = self.state.lock().session_id.clone();
            let mut request = self.http.get(&self.base_url).header("accept", "text/event-stream");
            request = self.auth_header(request);
            if last_event_id > 0 {
                request = request.header("last-event-id", last_event_id.to_string());
            }
            if let Some(session) = &session_id {
                request = request.header("mcp-session-id", session.clone());
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    attempts = 0;
                    self.state.lock().phase = ClientPhase::SseConnected;
                    if let Err(e) = self.drain_sse_body(response).await {
                        warn!(error = %e, "SSE stream ended");
                    }
                }
                Ok(response) => {
                    error!(status = %response.status(), "SSE GET rejected");
                }
                Err(e) => {
                    error!(error = %e, "SSE GET failed");
                }
            }

            attempts += 1;
            if self.sse_config.max_reconnect_attempts != 0
                && attempts >= self.sse_config.max_reconnect_attempts
            {
                self.state.lock().phase = ClientPhase::Error;
                return;
            }
            self.state.lock().phase = ClientPhase::Reconnecting;
            tokio::time::sleep(self.sse_config.reconnect_delay).await;
            self.state.lock().phase = ClientPhase::SseConnecting;
        }
    }

    async fn drain_sse_body(&self, response: reqwest::Response) -> TransportResult<()> {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buffer.find("\n\n") {
                let record = buffer[..pos].to_string();
                buffer.drain(..pos + 2);
                self.handle_sse_record(&record).await;
            }
        }
        Ok(())
    }

    async fn handle_sse_record(&self, record: &str) {
        let mut id: Option<u64> = None;
        let mut event_type = "message".to_string();
        let mut data = String::new();
        for line in record.lines() {
            if let Some(rest) = line.strip_prefix("id:") {
                id = rest.trim().parse().ok();
            } else if let Some(rest) = line.strip_prefix("event:") {
                event_type = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data.push_str(rest.trim());
            }
        }
        if let Some(id) = id {
            self.state.lock().last_event_id = id;
        }
        self.sse_events_received.fetch_add(1, Ordering::Relaxed);
        self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
        if event_type == "message" && !data.is_empty() {
            let msg = TransportMessage::new(0, Bytes::from(data.into_bytes()));
            let _ = self.inbox_tx.send(msg).await;
        }
    }
}

impl Transport for StreamableHttpClient {
    fn transport_type(&self) -> TransportType {
        TransportType::StreamableHttp
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move {
            match self.state.lock().phase {
                ClientPhase::Disconnected => TransportState::Disconnected,
                ClientPhase::Connecting | ClientPhase::SseConnecting => {
                    TransportState::Connecting
                }
                ClientPhase::Connected | ClientPhase::SseConnected => TransportState::Connected,
                ClientPhase::Reconnecting => TransportState::Connecting,
                ClientPhase::Error => TransportState::Failed {
                    reason: "SSE reconnect attempts exhausted".into(),
                },
            }
        })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().phase = ClientPhase::Connecting;
            self.state.lock().phase = ClientPhase::Connected;
            Ok(())
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(handle) = self.sse_task.lock().take() {
                handle.abort();
            }
            let mut state = self.state.lock();
            state.phase = ClientPhase::Disconnected;
            state.session_id = None;
            Ok(())
        })
    }

    fn send(
        &self,
        message: TransportMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut request = self.http.post(&self.base_url).body(message.payload.to_vec());
            request = self.auth_header(request).header("content-type", "application/json");
            if let Some(session) = self.state.lock().session_id.clone() {
                request = request.header("mcp-session-id", session);
            }
            let response = request
                .send()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;

            if matches!(response.status().as_u16(), 401 | 410) {
                self.state.lock().session_id = None;
            }
            if let Some(session) = response
                .headers()
                .get("mcp-session-id")
                .and_then(|v| v.to_str().ok())
            {
                self.state.lock().session_id = Some(session.to_string());
            }
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            if !status.is_success() {
                return Err(TransportError::ProtocolError(format!(
                    "POST {} returned {status}",
                    self.base_url
                )));
            }
            self.metrics
                .bytes_sent
                .fetch_add(message.payload.len() as u64, Ordering::Relaxed);
            self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
            let reply = TransportMessage::new(message.id, body);
            self.inbox_tx
                .send(reply)
                .await
                .map_err(|_| TransportError::Internal("inbox closed".into()))
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
        Some(self.base_url.clone())
    }
}

impl Drop for StreamableHttpClient {
    fn drop(&mut self) {
        if let Some(handle) = self.sse_task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_maps_onto_transport_state() {
        let client = StreamableHttpClient::new("http://x/mcp", None, SseConfig::default());
        assert_eq!(client.phase(), ClientPhase::Disconnected);
    }
}
