//! A bounded pool of pre-connected [`TcpTransport`]s with timed wait,
//! idle reaping, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::time::timeout as tokio_timeout;
use tracing::info;

use mcp_transport_traits::{Transport, TransportError, TransportResult};

use crate::tcp::TcpTransport;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Remote host to connect to.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Minimum number of connections kept warm by the reaper.
    pub min_size: usize,
    /// Hard cap on outstanding connections (idle + in-use).
    pub max_size: usize,
    /// Deadline for establishing a new connection.
    pub connect_timeout: Duration,
    /// A connection idle longer than this (and above `min_size`) is closed
    /// by the reaper.
    pub idle_timeout: Duration,
    /// How often the reaper sweeps idle connections.
    pub health_check_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            min_size: 1,
            max_size: 8,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

struct IdleSlot {
    conn: Arc<TcpTransport>,
    last_used_at: Instant,
}

struct Inner {
    idle: Vec<IdleSlot>,
    in_use: usize,
    closing: bool,
}

/// A bounded, single-mutex TCP connection pool.
///
/// Unlike the resource cache (which stripes its locks for independent-key
/// throughput), the pool guards its whole slot table with one mutex: every
/// operation's critical section is a handful of pointer operations, so
/// striping would add complexity without reducing contention that matters.
pub struct ConnectionPool {
    config: PoolConfig,
    inner: Mutex<Inner>,
    available: Notify,
    reaper: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Create a pool and start its reaper task.
    #[must_use]
    pub fn new(config: PoolConfig) -> Arc<Self> {
        let pool = Arc::new(Self {
            config,
            inner: Mutex::new(Inner {
                idle: Vec::new(),
                in_use: 0,
                closing: false,
            }),
            available: Notify::new(),
            reaper: std::sync::Mutex::new(None),
        });
        let reaper_pool = pool.clone();
        let handle = tokio::spawn(async move { reaper_pool.reap_loop().await });
        *pool.reaper.lock().expect("reaper mutex poisoned") = Some(handle);
        pool
    }

    async fn reap_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(self.config.health_check_interval).await;
            let mut inner = self.inner.lock().await;
            if inner.closing {
                return;
            }
            let now = Instant::now();
            let min_size = self.config.min_size;
            let in_use = inner.in_use;
            let mut total = inner.idle.len() + in_use;
            let mut survivors = Vec::with_capacity(inner.idle.len());
            for slot in inner.idle.drain(..) {
                let stale = now.duration_since(slot.last_used_at) > self.config.idle_timeout;
                if stale && total > min_size {
                    let conn = slot.conn.clone();
                    tokio::spawn(async move {
                        let _ = conn.disconnect().await;
                    });
                    total -= 1;
                } else {
                    survivors.push(slot);
                }
            }
            inner.idle = survivors;
        }
    }

    /// Acquire a connection, blocking up to `timeout` if the pool is at
    /// capacity and every connection is in use.
    pub async fn get_connection(
        self: &Arc<Self>,
        deadline: Duration,
    ) -> TransportResult<PooledGuard> {
        let started = Instant::now();
        loop {
            {
                let mut inner = self.inner.lock().await;
                if inner.closing {
                    return Err(TransportError::NotAvailable("pool is shutting down".into()));
                }
                if let Some(slot) = inner.idle.pop() {
                    inner.in_use += 1;
                    return Ok(PooledGuard {
                        pool: self.clone(),
                        conn: Some(slot.conn),
                        ok: true,
                    });
                }
                if inner.in_use < self.config.max_size {
                    inner.in_use += 1;
                    drop(inner);
                    let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
                        .parse()
                        .map_err(|e| TransportError::ConfigurationError(format!("{e}")))?;
                    let connect = TcpTransport::connect_to(addr);
                    let conn = match tokio_timeout(self.config.connect_timeout, connect).await {
                        Ok(Ok(conn)) => conn,
                        Ok(Err(e)) => {
                            self.inner.lock().await.in_use -= 1;
                            return Err(e);
                        }
                        Err(_) => {
                            self.inner.lock().await.in_use -= 1;
                            return Err(TransportError::ConnectionTimeout {
                                operation: "pool connect".into(),
                                timeout: self.config.connect_timeout,
                            });
                        }
                    };
                    return Ok(PooledGuard {
                        pool: self.clone(),
                        conn: Some(Arc::new(conn)),
                        ok: true,
                    });
                }
            }
            let remaining = deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(TransportError::Timeout);
            }
            let notified = self.available.notified();
            if tokio_timeout(remaining, notified).await.is_err() {
                return Err(TransportError::Timeout);
            }
        }
    }

    async fn return_connection(&self, conn: Arc<TcpTransport>, ok: bool) {
        let mut inner = self.inner.lock().await;
        inner.in_use = inner.in_use.saturating_sub(1);
        if ok && !inner.closing {
            inner.idle.push(IdleSlot {
                conn,
                last_used_at: Instant::now(),
            });
        } else {
            let _ = conn.disconnect().await;
        }
        drop(inner);
        self.available.notify_one();
    }

    /// Stop the reaper, close every idle connection, and reject further
    /// `get_connection` calls.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.closing = true;
        for slot in inner.idle.drain(..) {
            let _ = slot.conn.disconnect().await;
        }
        drop(inner);
        self.available.notify_waiters();
        if let Some(handle) = self.reaper.lock().expect("reaper mutex poisoned").take() {
            handle.abort();
        }
        info!("connection pool shut down");
    }
}

/// An in-use connection borrowed from a [`ConnectionPool`]. Returned to the
/// pool (or closed, if marked unhealthy) on drop.
pub struct PooledGuard {
    pool: Arc<ConnectionPool>,
    conn: Option<Arc<TcpTransport>>,
    ok: bool,
}

impl PooledGuard {
    /// The borrowed connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<TcpTransport> {
        self.conn.as_ref().expect("guard dropped twice")
    }

    /// Mark this connection as unhealthy so it is closed instead of
    /// returned to the idle set when the guard drops.
    pub fn mark_failed(&mut self) {
        self.ok = false;
    }
}

impl Drop for PooledGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let pool = self.pool.clone();
            let ok = self.ok;
            tokio::spawn(async move { pool.return_connection(conn, ok).await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else {
                    break;
                };
                let t = TcpTransport::from_accepted(stream, peer);
                tokio::spawn(async move {
                    while let Ok(Some(msg)) = t.receive().await {
                        let _ = t.send(msg).await;
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn acquires_and_returns_a_connection() {
        let addr = echo_server().await;
        let pool = ConnectionPool::new(PoolConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            max_size: 2,
            ..Default::default()
        });
        let guard = pool.get_connection(Duration::from_secs(1)).await.unwrap();
        assert!(
            matches!(
                guard.connection().state().await,
                mcp_transport_traits::TransportState::Connected
            )
        );
        drop(guard);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn blocks_then_times_out_when_exhausted() {
        let addr = echo_server().await;
        let pool = ConnectionPool::new(PoolConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            max_size: 1,
            ..Default::default()
        });
        let _held = pool.get_connection(Duration::from_secs(1)).await.unwrap();
        let err = pool
            .get_connection(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
        pool.shutdown().await;
    }
}
