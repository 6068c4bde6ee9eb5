//! Pooled line-protocol proxy over the upstream data port.
//!
//! One upstream command runs per pooled connection at a time; reply lines
//! stream to a caller-supplied sink until the end-of-message sentinel, an
//! error frame, or the line limit.

mod error;
mod pool;
mod probe;
mod proxy;

pub use error::{PoolError, ProxyError};
pub use pool::{Pool, PooledConn};
pub use proxy::{LineSink, Proxy};

#[cfg(test)]
pub(crate) mod testsupport {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use utils::read_line;

    /// Scripted upstream for tests: answers the protocol handshake, the
    /// probe, the timestamp command and a fixed per-command reply table.
    /// Returns the address it listens on.
    pub(crate) async fn spawn_upstream(table: Vec<(&str, Vec<&str>)>) -> String {
        let table: Arc<HashMap<String, Vec<String>>> = Arc::new(
            table
                .into_iter()
                .map(|(cmd, lines)| {
                    (
                        cmd.to_string(),
                        lines.into_iter().map(String::from).collect(),
                    )
                })
                .collect(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let table = Arc::clone(&table);
                tokio::spawn(async move {
                    let mut io = BufReader::new(stream);
                    loop {
                        let Ok(line) = read_line(&mut io, Duration::from_secs(5)).await else {
                            break;
                        };
                        if line == parser::QUIT_CMD {
                            break;
                        }

                        let reply: Vec<String> = if line == parser::SET_PROTOCOL {
                            vec![String::from_utf8_lossy(parser::CURRENT_PROTOCOL).into_owned()]
                        } else if line == parser::TIME_CMD {
                            vec!["T,20230530 05:58:26".into()]
                        } else if let Some(lines) =
                            table.get(String::from_utf8_lossy(&line).as_ref())
                        {
                            lines.clone()
                        } else {
                            // Everything unknown (including S,TEST) draws
                            // the syntax-error sentinel, like the real thing.
                            vec![String::from_utf8_lossy(parser::SYNTAX_ERROR).into_owned()]
                        };

                        for l in &reply {
                            if io.write_all(format!("{l}\r\n").as_bytes()).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        addr
    }
}
