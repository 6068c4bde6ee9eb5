//! Proxy core: one upstream command per pooled connection, reply lines
//! streamed to a sink until end-of-message, error, or line limit.

use std::sync::Arc;
use std::time::Duration;

use iqmux_config::IqmuxConfig;
use registry::Registry;
use tokio::time::interval;
use tracing::debug;
use utils::{read_line, wire_verbose, write_line};

use crate::error::ProxyError;
use crate::pool::{Pool, PooledConn};

/// Receiver of streamed reply lines. Lines arrive trimmed, without CR/LF.
///
/// A sink error stops the proxy and surfaces to the caller.
pub trait LineSink {
    async fn on_line(&mut self, line: Vec<u8>) -> Result<(), ProxyError>;
}

/// Plain functions work as sinks wherever no client deadline has to be
/// refreshed between lines.
impl<F> LineSink for F
where
    F: FnMut(Vec<u8>) -> Result<(), ProxyError>,
{
    async fn on_line(&mut self, line: Vec<u8>) -> Result<(), ProxyError> {
        self(line)
    }
}

/// Shared proxy state: the liveness registry view and the upstream pool.
pub struct Proxy {
    registry: Arc<Registry>,
    pub(crate) pool: Pool,
    command_budget: Duration,
    stream_budget: Duration,
    sweep_interval: Duration,
}

impl Proxy {
    pub fn new(registry: Arc<Registry>, cfg: &IqmuxConfig) -> Self {
        Self {
            registry,
            pool: Pool::new(&cfg.upstream, &cfg.pool),
            command_budget: cfg.upstream.command_deadline(),
            stream_budget: cfg.upstream.stream_deadline(),
            sweep_interval: cfg.pool.sweep_interval(),
        }
    }

    /// Start the background pool sweep task.
    pub fn start_sweep(self: &Arc<Self>) {
        let proxy = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(proxy.sweep_interval);
            // interval fires immediately; the first sweep waits a full period
            ticker.tick().await;
            loop {
                ticker.tick().await;
                proxy.pool.sweep().await;
            }
        });
    }

    /// Run one command against the upstream and stream its reply.
    ///
    /// `line_limit` of -1 disables the bound. On any return the caller owns
    /// no connection and no partially consumed reply remains buffered: the
    /// release re-probe drains or destroys the socket.
    pub async fn serve(
        &self,
        cmd: &[u8],
        line_limit: i64,
        sink: &mut impl LineSink,
    ) -> Result<(), ProxyError> {
        if !self.registry.is_up(registry::FEED) {
            return Err(ProxyError::FeedNotRunning);
        }
        if !self.registry.is_up(registry::ADMIN) {
            return Err(ProxyError::AdminNotReady);
        }

        let mut conn = self.pool.acquire().await?;
        let res = self.relay(&mut conn, cmd, line_limit, sink).await;
        // Runs on success and on every error return path.
        self.pool.release(conn).await;
        res
    }

    async fn relay(
        &self,
        conn: &mut PooledConn,
        cmd: &[u8],
        line_limit: i64,
        sink: &mut impl LineSink,
    ) -> Result<(), ProxyError> {
        if wire_verbose() {
            debug!(target: "iqmux::proxy", cmd = %String::from_utf8_lossy(cmd), "stream>>");
        }
        write_line(&mut conn.io, cmd, self.command_budget).await?;

        // Streaming gets extra time per line, plus whatever grace the
        // acquire probe granted for a slow upstream.
        let budget = self.stream_budget + conn.grace();
        let mut read: i64 = 0;
        loop {
            let line = read_line(&mut conn.io, budget).await?;
            read += 1;
            if line_limit != -1 && read >= line_limit {
                return Err(ProxyError::LimitReached(line_limit));
            }
            if wire_verbose() {
                debug!(target: "iqmux::proxy", line = %String::from_utf8_lossy(&line), "stream<<");
            }

            if let Some(reason) = parser::error_reason(&line) {
                return Err(ProxyError::Upstream(
                    String::from_utf8_lossy(reason).into_owned(),
                ));
            }
            if parser::is_eom(&line) {
                if wire_verbose() {
                    debug!(target: "iqmux::proxy", "End-Of-Stream");
                }
                return Ok(());
            }

            sink.on_line(line).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::spawn_upstream;
    use registry::{ADMIN, FEED, Liveness};

    fn proxy_for(addr: &str, registry: Arc<Registry>) -> Proxy {
        let mut cfg = IqmuxConfig::default();
        cfg.upstream.data_addr = addr.to_string();
        cfg.upstream.connect_timeout_secs = 1;
        cfg.upstream.command_deadline_secs = 1;
        cfg.upstream.stream_deadline_secs = 1;
        Proxy::new(registry, &cfg)
    }

    fn ready_registry() -> Arc<Registry> {
        let registry = Arc::new(Registry::new());
        registry.store(FEED, Liveness::Pid(1));
        registry.store(ADMIN, Liveness::Ready);
        registry
    }

    #[tokio::test]
    async fn refuses_when_feed_is_not_running() {
        let registry = Arc::new(Registry::new());
        // Unroutable address on purpose: the guard must fire before any dial.
        let proxy = proxy_for("127.0.0.1:1", registry);

        let mut sink = |_line: Vec<u8>| -> Result<(), ProxyError> { Ok(()) };
        let err = proxy
            .serve(b"HDX,AAPL,2", -1, &mut sink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "iqfeed not running");
    }

    #[tokio::test]
    async fn refuses_when_admin_is_not_ready() {
        let registry = Arc::new(Registry::new());
        registry.store(FEED, Liveness::Pid(1));
        let proxy = proxy_for("127.0.0.1:1", registry);

        let mut sink = |_line: Vec<u8>| -> Result<(), ProxyError> { Ok(()) };
        let err = proxy
            .serve(b"HDX,AAPL,2", -1, &mut sink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "admin not ready");
    }

    #[tokio::test]
    async fn streams_data_lines_until_eom() {
        let addr = spawn_upstream(vec![("HDX,AAPL,2", vec!["A", "B", "!ENDMSG!,"])]).await;
        let proxy = proxy_for(&addr, ready_registry());

        let mut lines: Vec<Vec<u8>> = Vec::new();
        let mut sink = |line: Vec<u8>| -> Result<(), ProxyError> {
            lines.push(line);
            Ok(())
        };
        proxy.serve(b"HDX,AAPL,2", -1, &mut sink).await.unwrap();

        assert_eq!(lines, vec![b"A".to_vec(), b"B".to_vec()]);
    }

    #[tokio::test]
    async fn connection_returns_to_the_pool_after_a_request() {
        let addr = spawn_upstream(vec![("HDX,AAPL,1", vec!["A", "!ENDMSG!,"])]).await;
        let proxy = proxy_for(&addr, ready_registry());

        let mut sink = |_line: Vec<u8>| -> Result<(), ProxyError> { Ok(()) };
        proxy.serve(b"HDX,AAPL,1", -1, &mut sink).await.unwrap();

        assert_eq!(proxy.pool.inner.lock().await.conns.len(), 1);
    }

    #[tokio::test]
    async fn upstream_error_frame_maps_to_its_reason_field() {
        let addr = spawn_upstream(vec![("HDX,MISSING,2", vec!["E,!NO_DATA!,,"])]).await;
        let proxy = proxy_for(&addr, ready_registry());

        let mut sink = |_line: Vec<u8>| -> Result<(), ProxyError> { Ok(()) };
        let err = proxy
            .serve(b"HDX,MISSING,2", -1, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Upstream(_)));
        assert_eq!(err.to_string(), "!NO_DATA!");
    }

    #[tokio::test]
    async fn line_limit_stops_a_runaway_reply() {
        let addr = spawn_upstream(vec![(
            "SBF,s,ALL,t,1",
            vec!["LS,1", "LS,2", "LS,3", "LS,4", "LS,5", "!ENDMSG!,"],
        )])
        .await;
        let proxy = proxy_for(&addr, ready_registry());

        let mut seen = 0usize;
        let mut sink = |_line: Vec<u8>| -> Result<(), ProxyError> {
            seen += 1;
            Ok(())
        };
        let err = proxy
            .serve(b"SBF,s,ALL,t,1", 3, &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::LimitReached(3)));
        assert!(seen <= 2, "sink saw {seen} lines past the limit");
    }

    #[tokio::test]
    async fn sink_errors_stop_the_stream_and_surface() {
        let addr = spawn_upstream(vec![("HDX,AAPL,2", vec!["A", "B", "!ENDMSG!,"])]).await;
        let proxy = proxy_for(&addr, ready_registry());

        let mut sink = |_line: Vec<u8>| -> Result<(), ProxyError> {
            Err(ProxyError::Sink("client went away".into()))
        };
        let err = proxy
            .serve(b"HDX,AAPL,2", -1, &mut sink)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "client went away");
    }
}
