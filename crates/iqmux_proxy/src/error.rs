use thiserror::Error;

/// Pool-side failures. Any of these destroys the affected socket; pooled
/// connections are never recycled after an error.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("upstream connect timeout to {0}")]
    ConnectTimeout(String),

    #[error("invalid handshake reply: {0}")]
    Handshake(String),

    #[error("probe flushed {0} lines without hitting the syntax-error sentinel")]
    ProbeOverflow(usize),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Proxy-core failures. The `Display` text is the wire contract: the TCP
/// facade sends it to clients verbatim as `E,<message>`.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("iqfeed not running")]
    FeedNotRunning,

    #[error("admin not ready")]
    AdminNotReady,

    /// Error frame reported by the upstream; payload is the second comma
    /// field of the `E,...` line.
    #[error("{0}")]
    Upstream(String),

    #[error("CRIT: line limit {0} reached")]
    LimitReached(i64),

    /// Failure raised by the caller's line sink.
    #[error("{0}")]
    Sink(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
