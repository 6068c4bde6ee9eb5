use serde::Deserialize;

use crate::validation::{ConfigReport, validate};
use crate::{
    GlobalConfig, HttpConfig, ListenConfig, MonitorConfig, PoolConfig, SupervisorConfig,
    UpstreamConfig,
};

// =======================================================
// IQMUX CONFIG — main config
// =======================================================
#[derive(Debug, Clone, Deserialize)]
pub struct IqmuxConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub listen: ListenConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for IqmuxConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            upstream: UpstreamConfig::default(),
            pool: PoolConfig::default(),
            listen: ListenConfig::default(),
            supervisor: SupervisorConfig::default(),
            monitor: MonitorConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl IqmuxConfig {
    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Ini).required(false))
            .build()?;

        let mut cfg: IqmuxConfig = built.try_deserialize()?;

        cfg.apply_defaults();
        Ok(cfg)
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => {
                let report = cfg.validate();
                if report.has_errors() {
                    eprintln!("Invalid config in '{file_name}':");
                    eprintln!("{}", report.format());
                    eprintln!("Using default config (in-memory)...");
                    IqmuxConfig::default()
                } else {
                    if !report.warnings().is_empty() {
                        eprintln!("Config warnings in '{file_name}':");
                        eprintln!("{}", report.format());
                    }
                    cfg
                }
            }
            Err(e) => {
                eprintln!("Error reading config '{file_name}': {e}");
                eprintln!("Using default config (in-memory)...");
                IqmuxConfig::default()
            }
        }
    }

    fn apply_defaults(&mut self) {
        self.global.apply_defaults_from(&GlobalConfig::default());
        self.upstream.apply_defaults_from(&UpstreamConfig::default());
        self.pool.apply_defaults_from(&PoolConfig::default());
        self.listen.apply_defaults_from(&ListenConfig::default());
        self.supervisor
            .apply_defaults_from(&SupervisorConfig::default());
        self.monitor.apply_defaults_from(&MonitorConfig::default());
        self.http.apply_defaults_from(&HttpConfig::default());
    }

    pub fn print(&self) {
        println!("================ IQMUX CONFIG ================");

        println!("\n[global]");
        println!("  log_level            = {}", self.global.log_level);
        println!("  wire_verbose         = {}", self.global.wire_verbose);

        println!("\n[upstream]");
        println!("  data_addr            = {}", self.upstream.data_addr);
        println!("  admin_addr           = {}", self.upstream.admin_addr);
        println!(
            "  connect_timeout_secs = {}",
            self.upstream.connect_timeout_secs
        );
        println!(
            "  command_deadline_secs = {}",
            self.upstream.command_deadline_secs
        );
        println!(
            "  stream_deadline_secs = {}",
            self.upstream.stream_deadline_secs
        );
        println!(
            "  monitor_deadline_secs = {}",
            self.upstream.monitor_deadline_secs
        );

        println!("\n[pool]");
        println!("  reuse_cap            = {}", self.pool.reuse_cap);
        println!("  sweep_interval_secs  = {}", self.pool.sweep_interval_secs);
        println!("  probe_line_cap       = {}", self.pool.probe_line_cap);
        println!("  stale_grace_secs     = {}", self.pool.stale_grace_secs);

        println!("\n[listen]");
        println!("  proxy_addr           = {}", self.listen.proxy_addr);
        println!("  http_addr            = {}", self.listen.http_addr);
        println!(
            "  client_deadline_secs = {}",
            self.listen.client_deadline_secs
        );
        println!(
            "  write_buffer_bytes   = {}",
            self.listen.write_buffer_bytes
        );

        println!("\n[supervisor]");
        println!("  stabilize_secs       = {}", self.supervisor.stabilize_secs);
        println!("  dep_poll_ms          = {}", self.supervisor.dep_poll_ms);

        println!("\n[monitor]");
        println!(
            "  admin_fail_threshold = {}",
            self.monitor.admin_fail_threshold
        );
        println!(
            "  keepalive_grace_secs = {}",
            self.monitor.keepalive_grace_secs
        );
        println!(
            "  keepalive_interval_secs = {}",
            self.monitor.keepalive_interval_secs
        );

        println!("\n[http]");
        println!("  max_datapoints       = {}", self.http.max_datapoints);

        println!("==============================================");
    }
}
