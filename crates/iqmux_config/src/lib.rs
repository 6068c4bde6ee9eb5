mod global;
mod http;
mod iqmux;
mod listen;
mod monitor;
mod pool;
mod supervise;
mod upstream;
mod validation;

pub use global::GlobalConfig;
pub use http::HttpConfig;
pub use iqmux::IqmuxConfig;
pub use listen::ListenConfig;
pub use monitor::MonitorConfig;
pub use pool::PoolConfig;
pub use supervise::SupervisorConfig;
pub use upstream::UpstreamConfig;
pub use validation::ConfigReport;
