use std::sync::Arc;

use iqmux_config::IqmuxConfig;
use registry::{ADMIN, FEED, Registry};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use utils::{read_line, wire_verbose, write_line};

/// Keepalive loop: opens a short-lived data-port session and heartbeats it
/// so the upstream never drops the connection for idleness.
///
/// Never writes to the registry; its only effect is on upstream session
/// state. Every error path closes the connection and re-enters the outer
/// loop.
pub async fn keepalive_loop(registry: Arc<Registry>, cfg: Arc<IqmuxConfig>) {
    sleep(cfg.monitor.keepalive_grace()).await;
    let deadline = cfg.upstream.monitor_deadline();

    loop {
        sleep(cfg.monitor.keepalive_interval()).await;

        if !registry.is_up(FEED) {
            info!(target: "iqmux::keepalive", "iqfeed not running");
            continue;
        }
        if !registry.is_up(ADMIN) {
            info!(target: "iqmux::keepalive", "admin flag not set");
            continue;
        }

        let stream = match timeout(
            cfg.upstream.connect_timeout(),
            TcpStream::connect(&cfg.upstream.data_addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(target: "iqmux::keepalive", error = %e, "Dial failed");
                continue;
            }
            Err(_) => {
                warn!(target: "iqmux::keepalive", addr = %cfg.upstream.data_addr, "Dial timed out");
                continue;
            }
        };
        let mut io = BufReader::new(stream);

        if let Err(e) = write_line(&mut io, parser::SET_PROTOCOL, deadline).await {
            warn!(target: "iqmux::keepalive", error = %e, "Protocol write failed");
            continue;
        }
        if let Err(e) = write_line(&mut io, parser::CLIENT_NAME_KEEPALIVE, deadline).await {
            warn!(target: "iqmux::keepalive", error = %e, "Client-name write failed");
            continue;
        }

        // Heartbeat until the session errors out.
        loop {
            if let Err(e) = write_line(&mut io, parser::TIME_CMD, deadline).await {
                warn!(target: "iqmux::keepalive", error = %e, "Heartbeat write failed");
                break;
            }
            match read_line(&mut io, deadline).await {
                Ok(line) => {
                    if wire_verbose() {
                        debug!(
                            target: "iqmux::keepalive",
                            line = %String::from_utf8_lossy(&line),
                            "Heartbeat reply"
                        );
                    }
                }
                Err(e) => {
                    warn!(target: "iqmux::keepalive", error = %e, "Heartbeat read failed");
                    break;
                }
            }
            sleep(cfg.monitor.keepalive_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::Liveness;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Data port that records every line it receives and answers `T`.
    async fn spawn_data_port(seen: Arc<Mutex<Vec<String>>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let seen = seen.clone();
                tokio::spawn(async move {
                    let mut io = BufReader::new(stream);
                    loop {
                        let Ok(line) = read_line(&mut io, Duration::from_secs(5)).await else {
                            break;
                        };
                        let text = String::from_utf8_lossy(&line).into_owned();
                        let is_heartbeat = line == parser::TIME_CMD;
                        seen.lock().unwrap().push(text);
                        if is_heartbeat
                            && io.write_all(b"T,20230530 05:58:26\r\n").await.is_err()
                        {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn heartbeats_once_both_flags_are_up() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let addr = spawn_data_port(seen.clone()).await;

        let mut cfg = IqmuxConfig::default();
        cfg.upstream.data_addr = addr;
        cfg.upstream.connect_timeout_secs = 1;
        cfg.upstream.monitor_deadline_secs = 1;
        cfg.monitor.keepalive_grace_secs = 0;
        cfg.monitor.keepalive_interval_secs = 1;

        let registry = Arc::new(Registry::new());
        registry.store(FEED, Liveness::Pid(1));
        registry.store(ADMIN, Liveness::Ready);

        let task = tokio::spawn(keepalive_loop(registry, Arc::new(cfg)));
        sleep(Duration::from_millis(2500)).await;
        task.abort();

        let seen = seen.lock().unwrap();
        let text = seen.join("\n");
        assert!(text.contains("S,SET PROTOCOL,6.2"), "{text}");
        assert!(text.contains("S,SET CLIENT NAME,KEEPALIVE"), "{text}");
        assert!(seen.iter().any(|l| l == "T"), "{text}");
    }

    #[tokio::test]
    async fn skips_the_round_while_liveness_is_missing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let addr = spawn_data_port(seen.clone()).await;

        let mut cfg = IqmuxConfig::default();
        cfg.upstream.data_addr = addr;
        cfg.monitor.keepalive_grace_secs = 0;
        cfg.monitor.keepalive_interval_secs = 1;

        // Registry stays empty: the loop must never dial.
        let registry = Arc::new(Registry::new());
        let task = tokio::spawn(keepalive_loop(registry, Arc::new(cfg)));
        sleep(Duration::from_millis(2300)).await;
        task.abort();

        assert!(seen.lock().unwrap().is_empty());
    }
}
