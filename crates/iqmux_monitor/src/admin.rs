use std::sync::Arc;
use std::time::Duration;

use iqmux_config::IqmuxConfig;
use parser::ConnState;
use registry::{ADMIN, FEED, Liveness, Registry};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};
use utils::{read_line, wire_verbose, write_line};

/// Pacing of the outer loop after the first pass.
const PACE: Duration = Duration::from_secs(1);

/// Admin loop: single writer of the `admin` flag.
///
/// Holds one long-lived connection to the admin port and mirrors the
/// connection state of the upstream's status frames into the registry.
/// When the admin port stops answering altogether, kills the upstream so
/// the supervisor respawns it.
pub async fn admin_loop(registry: Arc<Registry>, cfg: Arc<IqmuxConfig>) {
    let mut fail_counter: u32 = 0;
    let mut first = true;
    let deadline = cfg.upstream.monitor_deadline();

    loop {
        if !first {
            // Always sleep after the first try.
            sleep(PACE).await;
        }
        first = false;

        await_feed(&registry, &cfg).await;

        let stream = match timeout(
            cfg.upstream.connect_timeout(),
            TcpStream::connect(&cfg.upstream.admin_addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(target: "iqmux::admin", error = %e, "Dial failed");
                note_failure(&registry, &mut fail_counter, &cfg);
                continue;
            }
            Err(_) => {
                warn!(target: "iqmux::admin", addr = %cfg.upstream.admin_addr, "Dial timed out");
                note_failure(&registry, &mut fail_counter, &cfg);
                continue;
            }
        };
        let mut io = BufReader::new(stream);

        // Check the connection actually answers before trusting it.
        if let Err(e) = write_line(&mut io, parser::TIME_CMD, deadline).await {
            warn!(target: "iqmux::admin", error = %e, "Probe write failed");
            note_failure(&registry, &mut fail_counter, &cfg);
            continue;
        }
        match read_line(&mut io, deadline).await {
            Ok(line) => {
                if wire_verbose() {
                    debug!(
                        target: "iqmux::admin",
                        line = %String::from_utf8_lossy(&line),
                        "Probe reply"
                    );
                }
            }
            Err(e) => {
                warn!(target: "iqmux::admin", error = %e, "Probe read failed");
                note_failure(&registry, &mut fail_counter, &cfg);
                continue;
            }
        }
        fail_counter = 0;

        loop {
            let line = match read_line(&mut io, deadline).await {
                Ok(line) => line,
                Err(e) => {
                    debug!(target: "iqmux::admin", error = %e, "Status read ended");
                    break;
                }
            };
            if wire_verbose() {
                debug!(
                    target: "iqmux::admin",
                    line = %String::from_utf8_lossy(&line),
                    "Status frame"
                );
            }

            match parser::stats_state(&line) {
                Some(ConnState::Connected) => registry.store(ADMIN, Liveness::Ready),
                Some(ConnState::NotConnected) => registry.delete(ADMIN),
                None => {}
            }
        }

        registry.delete(ADMIN);
    }
}

async fn await_feed(registry: &Registry, cfg: &IqmuxConfig) {
    loop {
        if registry.is_up(FEED) {
            return;
        }
        sleep(cfg.supervisor.dep_poll()).await;
    }
}

/// Count a probe failure; at exactly the threshold, pull the kill lever so
/// the supervisor respawns the upstream. The counter resets only on a
/// successful probe, so one streak kills at most once.
fn note_failure(registry: &Registry, fail_counter: &mut u32, cfg: &IqmuxConfig) {
    *fail_counter += 1;
    if *fail_counter == cfg.monitor.admin_fail_threshold {
        warn!(
            target: "iqmux::admin",
            failures = *fail_counter,
            "Admin port unresponsive; killing upstream"
        );
        if let Err(e) = iqmux_supervisor::kill(registry, FEED) {
            error!(target: "iqmux::admin", error = %e, "Kill failed");
        }
    }
}
