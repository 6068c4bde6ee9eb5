use std::time::Duration;

use serde::Deserialize;

// =======================================================
// UPSTREAM CONFIG — the market-data daemon's ports
// =======================================================
//
// The daemon answers lookup traffic on the data port and emits status
// frames on the admin port. Both live on localhost; the sidecar is the
// only client that talks to them directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub data_addr: String,
    pub admin_addr: String,
    pub connect_timeout_secs: u64,
    pub command_deadline_secs: u64,
    pub stream_deadline_secs: u64,
    pub monitor_deadline_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            data_addr: "127.0.0.1:9100".into(),
            admin_addr: "127.0.0.1:9300".into(),
            connect_timeout_secs: 3,
            command_deadline_secs: 5,
            stream_deadline_secs: 15,
            monitor_deadline_secs: 10,
        }
    }
}

impl UpstreamConfig {
    /// Dial timeout for any upstream connection.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Budget for writing one command and its single-line replies.
    pub fn command_deadline(&self) -> Duration {
        Duration::from_secs(self.command_deadline_secs)
    }

    /// Per-line budget while a streaming reply is in progress.
    pub fn stream_deadline(&self) -> Duration {
        Duration::from_secs(self.stream_deadline_secs)
    }

    /// Per-step budget of the admin and keepalive loops.
    pub fn monitor_deadline(&self) -> Duration {
        Duration::from_secs(self.monitor_deadline_secs)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &UpstreamConfig) {
        if self.data_addr.is_empty() {
            self.data_addr = defaults.data_addr.clone();
        }
        if self.admin_addr.is_empty() {
            self.admin_addr = defaults.admin_addr.clone();
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = defaults.connect_timeout_secs;
        }
        if self.command_deadline_secs == 0 {
            self.command_deadline_secs = defaults.command_deadline_secs;
        }
        if self.stream_deadline_secs == 0 {
            self.stream_deadline_secs = defaults.stream_deadline_secs;
        }
        if self.monitor_deadline_secs == 0 {
            self.monitor_deadline_secs = defaults.monitor_deadline_secs;
        }
    }
}
