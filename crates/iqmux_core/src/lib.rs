//! Master boot orchestration and the per-client TCP facade worker.

use std::sync::Arc;

use iqmux_config::IqmuxConfig;
use iqmux_proxy::Proxy;
use registry::Registry;

pub mod master;
pub mod worker;

/// Shared runtime handed to every task: the configuration, the liveness
/// registry and the pooled proxy. Nothing in here is process-global.
pub struct Runtime {
    pub cfg: Arc<IqmuxConfig>,
    pub registry: Arc<Registry>,
    pub proxy: Arc<Proxy>,
}

impl Runtime {
    pub fn new(cfg: IqmuxConfig) -> Self {
        let cfg = Arc::new(cfg);
        let registry = Arc::new(Registry::new());
        let proxy = Arc::new(Proxy::new(registry.clone(), &cfg));
        Self {
            cfg,
            registry,
            proxy,
        }
    }
}
