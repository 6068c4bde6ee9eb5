//! Per-connection line-protocol facade worker.
//!
//! Reads one client command per iteration, answers protocol negotiation
//! locally, and delegates everything else to the proxy core. The upstream
//! wire format is preserved 1:1 apart from that handshake, which each
//! pooled connection has already negotiated once.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use iqmux_proxy::{LineSink, ProxyError};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, instrument, warn};
use utils::{read_line, wire_verbose, write_line};

use crate::Runtime;

const ERR_READ_CMD: &[u8] = b"E,CONN_READ_CMD";
const ERR_PROTOCOL: &[u8] = b"E,PROTOCOL_DEPRECATED_NEED_6.2";
const ERR_SET_DEADLINE: &str = "CONN_SET_DEADLINE";

/// Forwards reply lines to the client, refreshing the client-side deadline
/// per line.
struct ClientSink<'a> {
    writer: &'a mut BufWriter<OwnedWriteHalf>,
    deadline: Duration,
}

impl LineSink for ClientSink<'_> {
    async fn on_line(&mut self, line: Vec<u8>) -> Result<(), ProxyError> {
        write_line(self.writer, &line, self.deadline)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut => ProxyError::Sink(ERR_SET_DEADLINE.into()),
                _ => ProxyError::Sink(e.to_string()),
            })
    }
}

/// Entry point for a "logical worker" that handles a single client.
#[instrument(skip(stream, rt), fields(client = %client_addr))]
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    rt: Arc<Runtime>,
) -> anyhow::Result<()> {
    info!(target: "iqmux::worker", "Handling new client connection");

    let deadline = rt.cfg.listen.client_deadline();
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::with_capacity(rt.cfg.listen.write_buffer_bytes, write_half);

    let result = client_loop(&mut reader, &mut writer, &rt, deadline).await;

    // Push out whatever is still buffered before the socket drops.
    let _ = writer.flush().await;
    debug!(target: "iqmux::worker", "Dropped client connection");
    result
}

async fn client_loop(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut BufWriter<OwnedWriteHalf>,
    rt: &Runtime,
    deadline: Duration,
) -> anyhow::Result<()> {
    loop {
        let cmd = match read_line(reader, deadline).await {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!(target: "iqmux::worker", error = %e, "Client command read failed");
                let _ = write_line(writer, ERR_READ_CMD, deadline).await;
                return Ok(());
            }
        };
        if wire_verbose() {
            debug!(
                target: "iqmux::worker",
                cmd = %String::from_utf8_lossy(&cmd),
                "client<<"
            );
        }

        // Fake the negotiation reply; the pool already takes care of this
        // once per upstream connection.
        if cmd.starts_with(parser::SET_PROTOCOL_PREFIX) {
            if !cmd.ends_with(parser::PROTOCOL_VERSION) {
                let _ = write_line(writer, ERR_PROTOCOL, deadline).await;
                return Ok(());
            }
            write_line(writer, parser::CURRENT_PROTOCOL, deadline).await?;
            writer.flush().await?;
            continue;
        }

        let mut sink = ClientSink {
            writer: &mut *writer,
            deadline,
        };
        match rt.proxy.serve(&cmd, -1, &mut sink).await {
            Ok(()) => {
                // The proxy consumed the terminator; restore it on the
                // client wire.
                write_line(writer, parser::EOM, deadline).await?;
                writer.flush().await?;
            }
            Err(e) => {
                warn!(target: "iqmux::worker", error = %e, "Proxy call failed");
                let msg = format!("E,{e}");
                let _ = write_line(writer, msg.as_bytes(), deadline).await;
                return Ok(());
            }
        }
    }
}
