//! MQTT transport — a request/response topic pair over a broker.
//!
//! Gated behind the `mqtt` feature and off by default: `rumqttc` 0.25 pins a
//! `rustls-webpki` release flagged by RUSTSEC-2026-0049 with no upstream fix
//! yet. Callers who need MQTT and accept that advisory enable the feature
//! explicitly.
//!
//! Requests are published to `{topic_prefix}/request`; responses are read
//! back from a subscription on `{topic_prefix}/response`. Framing is not
//! needed — MQTT already delimits messages as whole payloads.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{error, warn};

use mcp_transport_traits::{
    AtomicMetrics, Transport, TransportCapabilities, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};

/// An MQTT transport bound to one `{topic_prefix}/request` /
/// `{topic_prefix}/response` topic pair.
#[derive(Debug)]
pub struct MqttTransport {
    client: AsyncClient,
    request_topic: String,
    inbox: AsyncMutex<mpsc::Receiver<TransportMessage>>,
    state: SyncMutex<TransportState>,
    capabilities: TransportCapabilities,
    metrics: Arc<AtomicMetrics>,
    poll_task: SyncMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MqttTransport {
    /// Connect to `host:port` and subscribe to the response topic.
    pub async fn connect(
        client_id: &str,
        host: &str,
        port: u16,
        topic_prefix: &str,
    ) -> TransportResult<Self> {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        let (client, mut event_loop) = AsyncClient::new(options, 64);

        let response_topic = format!("{topic_prefix}/response");
        client
            .subscribe(&response_topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (tx, rx) = mpsc::channel(256);
        let metrics = Arc::new(AtomicMetrics::default());
        let poll_metrics = metrics.clone();
        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        poll_metrics
                            .bytes_received
                            .fetch_add(publish.payload.len() as u64, Ordering::Relaxed);
                        poll_metrics
                            .messages_received
                            .fetch_add(1, Ordering::Relaxed);
                        let msg = TransportMessage::new(0, Bytes::from(publish.payload));
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!(error = %e, "MQTT event loop error");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            client,
            request_topic: format!("{topic_prefix}/request"),
            inbox: AsyncMutex::new(rx),
            state: SyncMutex::new(TransportState::Connected),
            capabilities: TransportCapabilities {
                max_message_size: Some(mcp_protocol::MAX_MESSAGE_SIZE),
                supports_bidirectional: true,
                supports_streaming: false,
                ..Default::default()
            },
            metrics,
            poll_task: SyncMutex::new(Some(handle)),
        })
    }
}

impl Transport for MqttTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Mqtt
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
            if let Some(handle) = self.poll_task.lock().take() {
                handle.abort();
            }
            if let Err(e) = self.client.disconnect().await {
                warn!(error = %e, "MQTT disconnect reported an error");
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
            self.client
                .publish(
                    &self.request_topic,
                    QoS::AtLeastOnce,
                    false,
                    message.payload.to_vec(),
                )
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
        Some(self.request_topic.clone())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_task.lock().take() {
            handle.abort();
        }
    }
}
