//! Connection pooling over the upstream data port.

use std::collections::HashMap;
use std::time::Duration;

use iqmux_config::{PoolConfig, UpstreamConfig};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use utils::write_line;

use crate::error::PoolError;

/// A pooled upstream connection with its buffered reader and wear state.
///
/// Either held exclusively by one caller or stored in the pool map under a
/// unique key, never both.
pub struct PooledConn {
    pub(crate) io: BufReader<TcpStream>,
    pub(crate) reuse: u32,
    pub(crate) grace: Duration,
}

impl PooledConn {
    fn new(stream: TcpStream) -> Self {
        Self {
            io: BufReader::new(stream),
            reuse: 0,
            grace: Duration::ZERO,
        }
    }

    /// Extra per-line budget earned when the acquire probe drained heavy
    /// residue off this connection.
    pub fn grace(&self) -> Duration {
        self.grace
    }
}

pub(crate) struct PoolInner {
    pub(crate) conns: HashMap<u64, PooledConn>,
    pub(crate) counter: u64,
}

impl PoolInner {
    /// Remove and return an arbitrary idle entry ("random conn trick").
    fn pop_any(&mut self) -> Option<PooledConn> {
        let key = *self.conns.keys().next()?;
        self.conns.remove(&key)
    }
}

/// Idle-connection cache keyed by a monotonic integer.
///
/// Entries are removed from the map before any I/O runs against them; only
/// the sweep holds the mutex across probe I/O, which intentionally
/// serializes it against acquire/release.
pub struct Pool {
    data_addr: String,
    connect_timeout: Duration,
    command_budget: Duration,
    request_budget: Duration,
    stale_grace: Duration,
    reuse_cap: u32,
    pub(crate) probe_line_cap: usize,
    pub(crate) inner: Mutex<PoolInner>,
}

impl Pool {
    pub fn new(upstream: &UpstreamConfig, pool: &PoolConfig) -> Self {
        Self {
            data_addr: upstream.data_addr.clone(),
            connect_timeout: upstream.connect_timeout(),
            command_budget: upstream.command_deadline(),
            request_budget: upstream.stream_deadline(),
            stale_grace: pool.stale_grace(),
            reuse_cap: pool.reuse_cap,
            probe_line_cap: pool.probe_line_cap,
            inner: Mutex::new(PoolInner {
                conns: HashMap::new(),
                counter: 0,
            }),
        }
    }

    pub(crate) fn command_budget(&self) -> Duration {
        self.command_budget
    }

    /// Takes a probe-passing idle connection or dials a fresh one.
    pub async fn acquire(&self) -> Result<PooledConn, PoolError> {
        loop {
            let popped = {
                let mut inner = self.inner.lock().await;
                inner.pop_any()
            };
            let Some(mut conn) = popped else { break };

            match self.probe(&mut conn, self.request_budget).await {
                Ok(stale) => {
                    // More than one flushed line means a slow upstream is
                    // still catching up; widen this request's budget.
                    conn.grace = if stale > 1 {
                        self.stale_grace
                    } else {
                        Duration::ZERO
                    };
                    debug!(target: "iqmux::pool", "Reusing pooled upstream connection");
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(target: "iqmux::pool", error = %e, "Probe failed; destroying pooled connection");
                }
            }
        }

        info!(target: "iqmux::pool", upstream = %self.data_addr, "Creating new upstream connection");
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.data_addr))
            .await
            .map_err(|_| PoolError::ConnectTimeout(self.data_addr.clone()))??;

        let mut conn = PooledConn::new(stream);
        self.handshake(&mut conn).await?;
        Ok(conn)
    }

    /// Returns a connection after a request; re-probes before re-lending.
    pub async fn release(&self, mut conn: PooledConn) {
        conn.reuse += 1;
        if conn.reuse > self.reuse_cap {
            debug!(
                target: "iqmux::pool",
                reuse = conn.reuse,
                "Reuse cap reached; retiring connection"
            );
            let _ = write_line(&mut conn.io, parser::QUIT_CMD, self.command_budget).await;
            return;
        }

        match self.probe(&mut conn, self.request_budget).await {
            Ok(_) => {
                conn.grace = Duration::ZERO;
                let mut inner = self.inner.lock().await;
                let key = inner.counter;
                inner.counter += 1;
                inner.conns.insert(key, conn);
                debug!(target: "iqmux::pool", key, "Returned upstream connection to pool");
            }
            Err(e) => {
                warn!(target: "iqmux::pool", error = %e, "Release probe failed; destroying connection");
            }
        }
    }

    /// Periodic probe over every idle entry; failing entries are removed.
    ///
    /// Holds the pool mutex for the whole pass so it never races a
    /// concurrent acquire/release. Must not run concurrently with itself.
    pub async fn sweep(&self) {
        let mut inner = self.inner.lock().await;
        debug!(target: "iqmux::pool", idle = inner.conns.len(), "Sweep start");

        let keys: Vec<u64> = inner.conns.keys().copied().collect();
        for key in keys {
            let Some(mut conn) = inner.conns.remove(&key) else {
                continue;
            };
            match self.probe(&mut conn, self.request_budget).await {
                Ok(_) => {
                    inner.conns.insert(key, conn);
                }
                Err(e) => {
                    warn!(target: "iqmux::pool", key, error = %e, "Sweep evicting dead connection");
                }
            }
        }

        debug!(target: "iqmux::pool", idle = inner.conns.len(), "Sweep finish");
    }
}
