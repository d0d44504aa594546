//! Client-side request/response correlation (spec component M).
//!
//! One [`Correlator`] wraps a single [`Transport`] and assigns every
//! outgoing request a fresh, non-zero [`RequestId`]. A background task reads
//! every inbound message off the transport, extracts its id, and resolves
//! the matching pending [`WaitCell`] — or, for messages carrying no `id`
//! field this correlator recognizes, routes them to the notification
//! callback instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use mcp_core::jsonrpc::{JsonRpcError, JsonRpcOutcome, JsonRpcRequest, JsonRpcResponse, RequestId};
use mcp_core::sync::WaitCell;
use mcp_core::{McpError, McpResult};
use mcp_transport_traits::{Transport, TransportMessage};

type Pending = Arc<WaitCell<Result<Value, JsonRpcError>>>;

/// Called for every inbound message that does not correlate to a pending
/// request — i.e. a server-initiated notification.
pub type NotificationCallback = Box<dyn Fn(String, Option<Value>) + Send + Sync>;

struct Shared {
    next_id: AtomicU64,
    pending: Mutex<HashMap<RequestId, Pending>>,
}

/// Request/response correlation over one transport connection.
///
/// Construct with [`Correlator::spawn`], which starts the background
/// receive loop; the returned handle is cheap to clone and share across
/// callers issuing concurrent requests.
#[derive(Clone)]
pub struct Correlator {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator").finish_non_exhaustive()
    }
}

impl Correlator {
    /// Wrap `transport` and start its background receive loop.
    ///
    /// `on_notification` is invoked, off the receive loop, for every inbound
    /// message whose id does not match a pending request (including
    /// id-less notifications).
    #[must_use]
    pub fn spawn(transport: Arc<dyn Transport>, on_notification: NotificationCallback) -> Self {
        let shared = Arc::new(Shared {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        });
        let correlator = Self {
            shared: Arc::clone(&shared),
            transport: Arc::clone(&transport),
        };
        tokio::spawn(receive_loop(transport, shared, on_notification));
        correlator
    }

    /// Send `method`/`params` as a request and wait up to `timeout` for its
    /// response, returning the result value.
    ///
    /// HTTP-style transports complete the round trip inside `send` itself
    /// and the pending slot is already filled by the time `send` returns;
    /// streaming transports fill it asynchronously once the matching
    /// inbound message arrives on the receive loop. Either way this waits
    /// on the same [`WaitCell`].
    ///
    /// # Errors
    /// Returns [`mcp_core::ErrorKind::Timeout`] if no response arrives
    /// before `timeout`, [`mcp_core::ErrorKind::Transport`] if the send
    /// itself fails, and the server's own error otherwise.
    pub async fn send_request(&self, method: &str, params: Option<Value>, timeout: Duration) -> McpResult<Value> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let cell: Pending = WaitCell::new();
        self.shared.pending.lock().insert(id, Arc::clone(&cell));

        let request = JsonRpcRequest::new(id, method, params);
        let payload = serde_json::to_vec(&request)?;
        let message = TransportMessage::new(id, payload.into());

        if let Err(err) = self.transport.send(message).await {
            self.shared.pending.lock().remove(&id);
            return Err(McpError::transport(err.to_string()));
        }

        match cell.wait(timeout).await {
            Some(Ok(result)) => Ok(result),
            Some(Err(error)) => Err(McpError::new(
                kind_for_rpc_code(error.code),
                error.message,
            )),
            None => {
                self.shared.pending.lock().remove(&id);
                Err(McpError::timeout(format!("no response to '{method}' within {timeout:?}")))
            }
        }
    }
}

async fn receive_loop(transport: Arc<dyn Transport>, shared: Arc<Shared>, on_notification: NotificationCallback) {
    loop {
        let message = match transport.receive().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("transport closed, ending correlator receive loop");
                return;
            }
            Err(err) => {
                warn!(%err, "transport receive failed, ending correlator receive loop");
                return;
            }
        };

        let Ok(response) = serde_json::from_slice::<JsonRpcResponse>(&message.payload) else {
            let value: Option<Value> = serde_json::from_slice(&message.payload).ok();
            let method = value
                .as_ref()
                .and_then(|v| v.get("method"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let params = value.as_ref().and_then(|v| v.get("params")).cloned();
            on_notification(method, params);
            continue;
        };

        let cell = shared.pending.lock().remove(&response.id);
        match cell {
            Some(cell) => {
                let outcome = match response.outcome {
                    JsonRpcOutcome::Ok { result } => Ok(result),
                    JsonRpcOutcome::Err { error } => Err(error),
                };
                cell.complete(outcome);
            }
            None => {
                debug!(id = response.id, "response for unknown or already-timed-out request id");
            }
        }
    }
}

fn kind_for_rpc_code(code: i32) -> mcp_core::ErrorKind {
    use mcp_core::ErrorKind;
    match code {
        mcp_core::error_codes::PARSE_ERROR => ErrorKind::ParseError,
        mcp_core::error_codes::INVALID_REQUEST => ErrorKind::InvalidRequest,
        mcp_core::error_codes::METHOD_NOT_FOUND => ErrorKind::MethodNotFound,
        mcp_core::error_codes::INVALID_PARAMS => ErrorKind::InvalidParams,
        mcp_core::error_codes::INTERNAL_ERROR => ErrorKind::Internal,
        _ => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex as SyncMutex;
    use tokio::sync::mpsc;

    use mcp_transport_traits::{
        TransportCapabilities, TransportResult, TransportState, TransportType,
    };

    #[derive(Debug)]
    struct LoopbackTransport {
        capabilities: TransportCapabilities,
        inbound_tx: mpsc::Sender<TransportMessage>,
        inbound_rx: tokio::sync::Mutex<mpsc::Receiver<TransportMessage>>,
        sent: SyncMutex<Vec<TransportMessage>>,
    }

    impl LoopbackTransport {
        fn new() -> Arc<Self> {
            let (tx, rx) = mpsc::channel(16);
            Arc::new(Self {
                capabilities: TransportCapabilities::default(),
                inbound_tx: tx,
                inbound_rx: tokio::sync::Mutex::new(rx),
                sent: SyncMutex::new(Vec::new()),
            })
        }

        async fn push_inbound(&self, message: TransportMessage) {
            self.inbound_tx.send(message).await.unwrap();
        }
    }

    impl Transport for LoopbackTransport {
        fn transport_type(&self) -> TransportType {
            TransportType::Tcp
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
                self.sent.lock().unwrap().push(message);
                Ok(())
            })
        }

        fn receive(
            &self,
        ) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
            Box::pin(async move { Ok(self.inbound_rx.lock().await.recv().await) })
        }

        fn metrics(
            &self,
        ) -> Pin<Box<dyn Future<Output = mcp_transport_traits::TransportMetrics> + Send + '_>> {
            Box::pin(async move { mcp_transport_traits::TransportMetrics::default() })
        }
    }

    #[tokio::test]
    async fn resolves_response_matching_sent_request_id() {
        let transport = LoopbackTransport::new();
        let correlator = Correlator::spawn(transport.clone(), Box::new(|_, _| {}));

        let responder = transport.clone();
        tokio::spawn(async move {
            loop {
                if let Some(sent) = responder.sent.lock().unwrap().pop() {
                    let response = JsonRpcResponse::success(sent.id, serde_json::json!({"ok": true}));
                    responder.push_inbound(TransportMessage::new(sent.id, serde_json::to_vec(&response).unwrap().into())).await;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let result = correlator
            .send_request("ping", None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn times_out_with_no_response() {
        let transport = LoopbackTransport::new();
        let correlator = Correlator::spawn(transport, Box::new(|_, _| {}));
        let err = correlator
            .send_request("ping", None, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.kind, mcp_core::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn notification_without_matching_id_invokes_callback() {
        let transport = LoopbackTransport::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let correlator = Correlator::spawn(
            transport.clone(),
            Box::new(move |method, _params| {
                let _ = tx.send(method);
            }),
        );
        let _ = &correlator;

        let note = serde_json::json!({"jsonrpc": "2.0", "method": "progress"});
        transport
            .push_inbound(TransportMessage::new(0, serde_json::to_vec(&note).unwrap().into()))
            .await;

        let method = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(method, "progress");
    }

    #[tokio::test]
    async fn server_error_response_maps_to_matching_error_kind() {
        let transport = LoopbackTransport::new();
        let correlator = Correlator::spawn(transport.clone(), Box::new(|_, _| {}));

        let responder = transport.clone();
        tokio::spawn(async move {
            loop {
                if let Some(sent) = responder.sent.lock().unwrap().pop() {
                    let response = JsonRpcResponse::error(sent.id, JsonRpcError::new(-32601, "Method not found: nope"));
                    responder.push_inbound(TransportMessage::new(sent.id, serde_json::to_vec(&response).unwrap().into())).await;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let err = correlator
            .send_request("nope", None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, mcp_core::ErrorKind::MethodNotFound);
    }
}
