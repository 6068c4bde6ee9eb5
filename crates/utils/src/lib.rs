use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,iqmux=debug,iqmux_proxy=debug,iqmux_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false),
        )
        .init();
}

// Wire-level verbosity, toggled at runtime over the HTTP facade. Gates the
// per-line logging of raw upstream/client traffic, which is far too chatty
// to leave on unconditionally.
static WIRE_VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn wire_verbose() -> bool {
    WIRE_VERBOSE.load(Ordering::Relaxed)
}

pub fn set_wire_verbose(on: bool) {
    WIRE_VERBOSE.store(on, Ordering::Relaxed);
}

/// Flip the wire-verbosity flag, returning the new value.
pub fn toggle_wire_verbose() -> bool {
    !WIRE_VERBOSE.fetch_xor(true, Ordering::Relaxed)
}

/// Read one CR/LF-terminated line within `deadline`, trimmed of surrounding
/// whitespace.
///
/// A closed peer surfaces as `UnexpectedEof`, an expired deadline as
/// `TimedOut`; both match how the blocking-socket original reported them.
pub async fn read_line<R>(reader: &mut R, deadline: Duration) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = timeout(deadline, reader.read_until(b'\n', &mut buf))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read deadline exceeded"))??;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed",
        ));
    }
    Ok(buf.trim_ascii().to_vec())
}

/// Write `line` followed by CR/LF within `deadline`.
pub async fn write_line<W>(writer: &mut W, line: &[u8], deadline: Duration) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    timeout(deadline, async {
        writer.write_all(line).await?;
        writer.write_all(b"\r\n").await
    })
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))?
}
