use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::{Runtime, worker::handle_client};

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    info!(
        target: "iqmux::master",
        listen = %listen_addr,
        "Binding listener"
    );

    match TcpListener::bind(listen_addr).await {
        Ok(listener) => {
            info!(
                target: "iqmux::master",
                listen = %listen_addr,
                "Bind() successful"
            );
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "iqmux::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(e.into())
        }
    }
}

pub(crate) async fn accept_loop(rt: Arc<Runtime>) -> anyhow::Result<()> {
    let listen_addr = rt.cfg.listen.proxy_addr.clone();
    let listener = bind_listener(&listen_addr).await?;

    info!(
        target: "iqmux::master",
        listen = %listen_addr,
        "accept_loop started for listening socket"
    );

    loop {
        let (stream, client_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    target: "iqmux::master",
                    listen = %listen_addr,
                    error = ?e,
                    "Failed to accept connection"
                );
                return Err(e.into());
            }
        };

        let rt = rt.clone();
        tokio::spawn(async move {
            debug!(
                target: "iqmux::worker",
                client_addr = %client_addr,
                "Worker spawned for incoming connection"
            );

            if let Err(e) = handle_client(stream, client_addr, rt).await {
                error!(
                    target: "iqmux::worker",
                    client_addr = %client_addr,
                    error = ?e,
                    "Error while handling connection"
                );
            } else {
                debug!(
                    target: "iqmux::worker",
                    client_addr = %client_addr,
                    "Connection handled successfully"
                );
            }
        });
    }
}
