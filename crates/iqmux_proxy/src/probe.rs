//! Connection health probe and protocol handshake.
//!
//! The upstream protocol allows a prior command's results to arrive after
//! the caller has moved on, so the pool probes with a command whose reply
//! shape is known and drains whatever residue precedes it.

use std::time::Duration;

use tracing::debug;
use utils::{read_line, wire_verbose, write_line};

use crate::error::PoolError;
use crate::pool::{Pool, PooledConn};

impl Pool {
    /// Send the test command and read until its deterministic syntax-error
    /// reply. Returns how many stale residue lines were flushed first.
    pub(crate) async fn probe(
        &self,
        conn: &mut PooledConn,
        budget: Duration,
    ) -> Result<usize, PoolError> {
        write_line(&mut conn.io, parser::TEST_CMD, budget).await?;

        let mut stale = 0usize;
        loop {
            let line = read_line(&mut conn.io, budget).await?;
            if line == parser::SYNTAX_ERROR {
                return Ok(stale);
            }

            stale += 1;
            debug!(
                target: "iqmux::pool",
                stale,
                line = %String::from_utf8_lossy(&line),
                "Flushed stale line during probe"
            );
            if stale > self.probe_line_cap {
                return Err(PoolError::ProbeOverflow(stale));
            }
        }
    }

    /// Negotiate the wire protocol on a fresh connection. Any reply other
    /// than the exact current-protocol line is fatal.
    pub(crate) async fn handshake(&self, conn: &mut PooledConn) -> Result<(), PoolError> {
        write_line(&mut conn.io, parser::SET_PROTOCOL, self.command_budget()).await?;

        let line = read_line(&mut conn.io, self.command_budget()).await?;
        if wire_verbose() {
            debug!(
                target: "iqmux::pool",
                line = %String::from_utf8_lossy(&line),
                "Handshake reply"
            );
        }
        if line != parser::CURRENT_PROTOCOL {
            return Err(PoolError::Handshake(
                String::from_utf8_lossy(&line).into_owned(),
            ));
        }
        Ok(())
    }
}
