mod accept;

use std::sync::Arc;

use iqmux_config::IqmuxConfig;
use iqmux_monitor::{admin_loop, keepalive_loop};
use iqmux_supervisor::{ChildSpec, supervise};
use tracing::{error, info, instrument};

use crate::Runtime;

pub struct Master {
    runtime: Arc<Runtime>,
    children: Vec<ChildSpec>,
}

impl Master {
    pub fn new(cfg: IqmuxConfig, children: Vec<ChildSpec>) -> Self {
        Self {
            runtime: Arc::new(Runtime::new(cfg)),
            children,
        }
    }

    /// Boot every background task, then run the TCP facade accept loop in
    /// the foreground.
    #[instrument(skip(self), fields(
        proxy_addr = %self.runtime.cfg.listen.proxy_addr,
        http_addr = %self.runtime.cfg.listen.http_addr,
    ))]
    pub async fn run(self) -> anyhow::Result<()> {
        let rt = self.runtime;
        info!(target: "iqmux::master", "Starting IQMUX MASTER");

        // Supervised children, dependency order enforced per worker.
        for spec in self.children {
            info!(target: "iqmux::master", child = %spec.name, "Starting supervisor worker");
            let registry = rt.registry.clone();
            let sup_cfg = rt.cfg.supervisor.clone();
            tokio::spawn(async move {
                supervise(spec, registry, sup_cfg).await;
            });
        }

        // Pool hygiene.
        rt.proxy.start_sweep();

        // Upstream health monitors.
        tokio::spawn(admin_loop(rt.registry.clone(), rt.cfg.clone()));
        tokio::spawn(keepalive_loop(rt.registry.clone(), rt.cfg.clone()));

        // HTTP facade.
        {
            let cfg = rt.cfg.clone();
            let proxy = rt.proxy.clone();
            tokio::spawn(async move {
                if let Err(e) = iqmux_http::listen(cfg, proxy).await {
                    error!(target: "iqmux::master", error = ?e, "HTTP facade exited");
                }
            });
        }

        accept::accept_loop(rt).await
    }
}
