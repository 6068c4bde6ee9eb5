use std::time::Duration;

use serde::Deserialize;

// =======================================================
// POOL CONFIG — idle upstream connection cache
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Times a connection may be re-lent before retirement.
    pub reuse_cap: u32,
    /// Cadence of the background probe sweep over idle entries.
    pub sweep_interval_secs: u64,
    /// Abort a probe that flushes this many lines without the sentinel.
    pub probe_line_cap: usize,
    /// Extra request budget granted when a probe drains heavy residue.
    pub stale_grace_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            reuse_cap: 2000,
            sweep_interval_secs: 40,
            probe_line_cap: 10_000,
            stale_grace_secs: 2,
        }
    }
}

impl PoolConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_secs(self.stale_grace_secs)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &PoolConfig) {
        if self.reuse_cap == 0 {
            self.reuse_cap = defaults.reuse_cap;
        }
        if self.sweep_interval_secs == 0 {
            self.sweep_interval_secs = defaults.sweep_interval_secs;
        }
        if self.probe_line_cap == 0 {
            self.probe_line_cap = defaults.probe_line_cap;
        }
    }
}
