//! Length-prefixed framed TCP transport — both client and server sides.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::io::{ReadHalf, WriteHalf, split};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{error, info};

use mcp_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};

use crate::framing::{MAX_MESSAGE_SIZE, read_frame, write_frame};

/// A connected, length-prefix-framed TCP transport.
///
/// One background task owns the read half and forwards decoded frames into
/// a bounded channel that [`Transport::receive`] drains; the write half is
/// shared behind an async mutex for `send`. `disconnect` drops the stream,
/// which unblocks any in-flight read.
#[derive(Debug)]
pub struct TcpTransport {
    peer: SocketAddr,
    writer: AsyncMutex<Option<WriteHalf<TcpStream>>>,
    inbox: AsyncMutex<mpsc::Receiver<TransportMessage>>,
    inbox_tx: mpsc::Sender<TransportMessage>,
    state: SyncMutex<TransportState>,
    capabilities: TransportCapabilities,
    metrics: Arc<AtomicMetrics>,
    reader_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TcpTransport {
    /// Wrap an already-connected stream (used by [`connect_to`](Self::connect_to)
    /// and by the TCP server's accept loop).
    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let transport = Self {
            peer,
            writer: AsyncMutex::new(None),
            inbox: AsyncMutex::new(rx),
            inbox_tx: tx,
            state: SyncMutex::new(TransportState::Disconnected),
            capabilities: TransportCapabilities {
                max_message_size: Some(MAX_MESSAGE_SIZE),
                supports_bidirectional: true,
                supports_streaming: true,
                ..Default::default()
            },
            metrics: Arc::new(AtomicMetrics::default()),
            reader_task: SyncMutex::new(None),
        };
        transport.spawn_reader(stream)
    }

    fn spawn_reader(self, stream: TcpStream) -> Self {
        let (read_half, write_half): (ReadHalf<TcpStream>, WriteHalf<TcpStream>) = split(stream);
        *self.writer.try_lock().expect("fresh mutex") = Some(write_half);
        *self.state.lock() = TransportState::Connected;
        let tx = self.inbox_tx.clone();
        let metrics = self.metrics.clone();
        let peer = self.peer;
        let handle = tokio::spawn(async move {
            let mut read_half = read_half;
            loop {
                match read_frame(&mut read_half).await {
                    Ok(Some(body)) => {
                        metrics
                            .bytes_received
                            .fetch_add(body.len() as u64, Ordering::Relaxed);
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        let msg = TransportMessage::new(0, Bytes::from(body));
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!(%peer, "TCP peer closed connection");
                        break;
                    }
                    Err(TransportError::ConnectionLost(reason)) => {
                        error!(%peer, %reason, "TCP peer closed mid-body");
                        break;
                    }
                    Err(e) => {
                        error!(%peer, error = %e, "TCP read failed");
                        break;
                    }
                }
            }
        });
        *self.reader_task.lock() = Some(handle);
        self
    }

    /// Connect to a remote MCP server over plain TCP.
    pub async fn connect_to(addr: SocketAddr) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self::from_stream(stream, addr))
    }

    /// Wrap a stream accepted by a [`TcpListener`](tokio::net::TcpListener).
    #[must_use]
    pub fn from_accepted(stream: TcpStream, peer: SocketAddr) -> Self {
        Self::from_stream(stream, peer)
    }

    /// The remote peer's address, used as the rate-limit key by the server
    /// dispatcher.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
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
            *self.writer.lock().await = None;
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
            let mut guard = self.writer.lock().await;
            let writer = guard
                .as_mut()
                .ok_or_else(|| TransportError::ConnectionLost("TCP writer not connected".into()))?;
            write_frame(writer, &message.payload).await?;
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
        Some(self.peer.to_string())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn client_and_server_exchange_a_framed_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            let t = TcpTransport::from_accepted(stream, peer);
            let msg = t.receive().await.unwrap().unwrap();
            assert_eq!(&msg.payload[..], b"ping");
            t.send(TransportMessage::new(0, Bytes::from("pong")))
                .await
                .unwrap();
        });

        let client = TcpTransport::connect_to(addr).await.unwrap();
        client
            .send(TransportMessage::new(0, Bytes::from("ping")))
            .await
            .unwrap();
        let reply = client.receive().await.unwrap().unwrap();
        assert_eq!(&reply.payload[..], b"pong");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_stops_further_sends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        let client = TcpTransport::connect_to(addr).await.unwrap();
        client.disconnect().await.unwrap();
        let err = client
            .send(TransportMessage::new(0, Bytes::from("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost(_)));
    }
}
