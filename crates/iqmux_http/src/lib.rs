//! HTTP facade: historical OHLC and symbol search over the line protocol.
//!
//! A thin hyper front end that turns query parameters into upstream lookup
//! commands, runs them through the proxy core, and encodes the parsed rows
//! per the caller's `Accept` header.

mod encode;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use iqmux_config::IqmuxConfig;
use iqmux_proxy::Proxy;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Bind the facade address and serve connections until the task is dropped.
pub async fn listen(cfg: Arc<IqmuxConfig>, proxy: Arc<Proxy>) -> anyhow::Result<()> {
    let addr = cfg.listen.http_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind HTTP facade on {addr}"))?;
    info!(target: "iqmux::http", listen = %addr, "HTTP facade listening");

    loop {
        let (stream, client_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(target: "iqmux::http", error = ?e, "Failed to accept connection");
                continue;
            }
        };

        let cfg = cfg.clone();
        let proxy = proxy.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let cfg = cfg.clone();
                let proxy = proxy.clone();
                async move { Ok::<_, hyper::Error>(routes::dispatch(req, cfg, proxy).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(
                    target: "iqmux::http",
                    client = %client_addr,
                    error = %e,
                    "HTTP connection error"
                );
            }
        });
    }
}
