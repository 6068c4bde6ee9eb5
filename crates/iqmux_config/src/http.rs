use serde::Deserialize;

// =======================================================
// HTTP FACADE CONFIG
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound on data lines per historical query; doubles as the
    /// proxy line limit for facade requests.
    pub max_datapoints: i64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_datapoints: 10_000,
        }
    }
}

impl HttpConfig {
    pub(crate) fn apply_defaults_from(&mut self, defaults: &HttpConfig) {
        if self.max_datapoints == 0 {
            self.max_datapoints = defaults.max_datapoints;
        }
    }
}
