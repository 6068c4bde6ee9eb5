use std::time::Duration;

use serde::Deserialize;

// =======================================================
// LISTEN CONFIG — client-facing sockets
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Line-protocol facade address.
    pub proxy_addr: String,
    /// HTTP facade address.
    pub http_addr: String,
    /// Per-step budget when reading from or writing to a proxy client.
    pub client_deadline_secs: u64,
    /// Size of the buffered writer in front of each proxy client.
    pub write_buffer_bytes: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            proxy_addr: "0.0.0.0:9101".into(),
            http_addr: "0.0.0.0:8080".into(),
            client_deadline_secs: 5,
            write_buffer_bytes: 1024 * 1024,
        }
    }
}

impl ListenConfig {
    pub fn client_deadline(&self) -> Duration {
        Duration::from_secs(self.client_deadline_secs)
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &ListenConfig) {
        if self.proxy_addr.is_empty() {
            self.proxy_addr = defaults.proxy_addr.clone();
        }
        if self.http_addr.is_empty() {
            self.http_addr = defaults.http_addr.clone();
        }
        if self.client_deadline_secs == 0 {
            self.client_deadline_secs = defaults.client_deadline_secs;
        }
        if self.write_buffer_bytes == 0 {
            self.write_buffer_bytes = defaults.write_buffer_bytes;
        }
    }
}
