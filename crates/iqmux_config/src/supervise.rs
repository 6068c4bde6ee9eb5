use std::time::Duration;

use serde::Deserialize;

// =======================================================
// SUPERVISOR CONFIG
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How long a child must survive before it is marked running.
    pub stabilize_secs: u64,
    /// Poll cadence while waiting for a dependency to appear.
    pub dep_poll_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stabilize_secs: 1,
            dep_poll_ms: 250,
        }
    }
}

impl SupervisorConfig {
    pub fn stabilize(&self) -> Duration {
        Duration::from_secs(self.stabilize_secs)
    }

    pub fn dep_poll(&self) -> Duration {
        Duration::from_millis(self.dep_poll_ms)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &SupervisorConfig) {
        if self.stabilize_secs == 0 {
            self.stabilize_secs = defaults.stabilize_secs;
        }
        if self.dep_poll_ms == 0 {
            self.dep_poll_ms = defaults.dep_poll_ms;
        }
    }
}
