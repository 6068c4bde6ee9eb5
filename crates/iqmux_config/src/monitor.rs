use std::time::Duration;

use serde::Deserialize;

// =======================================================
// MONITOR CONFIG — admin and keepalive loops
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Consecutive admin probe failures before the upstream is killed.
    pub admin_fail_threshold: u32,
    /// Initial delay before the keepalive loop starts.
    pub keepalive_grace_secs: u64,
    /// Heartbeat cadence of the keepalive loop.
    pub keepalive_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            admin_fail_threshold: 10,
            keepalive_grace_secs: 10,
            keepalive_interval_secs: 30,
        }
    }
}

impl MonitorConfig {
    pub fn keepalive_grace(&self) -> Duration {
        Duration::from_secs(self.keepalive_grace_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &MonitorConfig) {
        if self.admin_fail_threshold == 0 {
            self.admin_fail_threshold = defaults.admin_fail_threshold;
        }
        if self.keepalive_interval_secs == 0 {
            self.keepalive_interval_secs = defaults.keepalive_interval_secs;
        }
    }
}
