//! Standard I/O transport — newline-delimited JSON over stdin/stdout, the
//! default wire for subprocess MCP servers.
//!
//! Interior mutability follows the pattern the rest of this crate uses:
//! `std::sync::Mutex` for short, synchronous state/metadata; an atomic
//! metrics struct for lock-free counters; `tokio::sync::Mutex` only around
//! the actual I/O handles, which are held across `.await` points.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{error, info};

use mcp_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};

/// A stdio transport bound to the process's own `stdin`/`stdout`.
///
/// Each line on stdin is one JSON-RPC message; each write is terminated
/// with `\n`. `start` launches the read loop; `stop`/`disconnect` only
/// drops the sender side of the inbox channel (stdin itself can't be
/// closed out from under the process, so a blocked `read_line` is instead
/// left to return on the next EOF or line).
#[derive(Debug)]
pub struct StdioTransport {
    stdout: AsyncMutex<Option<Stdout>>,
    inbox: AsyncMutex<mpsc::Receiver<TransportMessage>>,
    state: SyncMutex<TransportState>,
    capabilities: TransportCapabilities,
    metrics: Arc<AtomicMetrics>,
    reader_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioTransport {
    /// Create a transport over the process's stdin/stdout and start its
    /// background read loop immediately.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(256);
        let metrics = Arc::new(AtomicMetrics::default());
        let reader_metrics = metrics.clone();
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        reader_metrics
                            .bytes_received
                            .fetch_add(line.len() as u64, Ordering::Relaxed);
                        reader_metrics
                            .messages_received
                            .fetch_add(1, Ordering::Relaxed);
                        let msg = TransportMessage::new(0, Bytes::from(line.into_bytes()));
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed (EOF)");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });
        Self {
            stdout: AsyncMutex::new(Some(tokio::io::stdout())),
            inbox: AsyncMutex::new(rx),
            state: SyncMutex::new(TransportState::Connected),
            capabilities: TransportCapabilities {
                max_message_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
                supports_bidirectional: true,
                supports_streaming: false,
                ..Default::default()
            },
            metrics,
            reader_task: SyncMutex::new(Some(handle)),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
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
            *self.stdout.lock().await = None;
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
            let mut guard = self.stdout.lock().await;
            let stdout = guard
                .as_mut()
                .ok_or_else(|| TransportError::ConnectionLost("stdout not connected".into()))?;
            stdout
                .write_all(&message.payload)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            stdout
                .write_all(b"\n")
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            stdout
                .flush()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            self.metrics
                .bytes_sent
                .fetch_add(message.payload.len() as u64, Ordering::Relaxed);
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
        Some("stdio".to_string())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_task.lock().take() {
            handle.abort();
        }
    }
}
