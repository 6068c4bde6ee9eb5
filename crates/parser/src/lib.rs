//! Upstream line-frame vocabulary.
//!
//! The upstream speaks CR/LF-terminated comma-separated text lines. This
//! crate knows the handful of distinguished frames the sidecar cares about;
//! everything else is treated as opaque data and passed through.

/// End-of-message sentinel terminating a streaming reply.
pub const EOM: &[u8] = b"!ENDMSG!,";

/// Deterministic reply to [`TEST_CMD`]; doubles as the drain marker when
/// flushing residue off a pooled connection.
pub const SYNTAX_ERROR: &[u8] = b"E,!SYNTAX_ERROR!,";

/// Probe command whose only reply is [`SYNTAX_ERROR`].
pub const TEST_CMD: &[u8] = b"S,TEST";

/// Timestamp request; single `T,<timestamp>` reply.
pub const TIME_CMD: &[u8] = b"T";

/// Session retirement command written before closing a worn-out connection.
pub const QUIT_CMD: &[u8] = b"S,QUIT";

/// Protocol negotiation request the pool sends once per fresh connection.
pub const SET_PROTOCOL: &[u8] = b"S,SET PROTOCOL,6.2";

/// Exact expected reply to [`SET_PROTOCOL`].
pub const CURRENT_PROTOCOL: &[u8] = b"S,CURRENT PROTOCOL,6.2";

/// Prefix of client-side protocol negotiation, answered locally by the
/// facade.
pub const SET_PROTOCOL_PREFIX: &[u8] = b"S,SET PROTOCOL";

/// Session label the keepalive loop announces after its handshake.
pub const CLIENT_NAME_KEEPALIVE: &[u8] = b"S,SET CLIENT NAME,KEEPALIVE";

/// Required protocol version suffix on client negotiation lines.
pub const PROTOCOL_VERSION: &[u8] = b"6.2";

const STATS_PREFIX: &[u8] = b"S,STATS";
const ERROR_PREFIX: &[u8] = b"E,";

/// Connection state reported in a status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connected,
    NotConnected,
}

/// Split a comma-separated line into at most `max` fields, the last field
/// keeping the remainder unsplit.
pub fn split_fields(line: &[u8], max: usize) -> Vec<&[u8]> {
    let mut fields = Vec::new();
    let mut rest = line;
    while fields.len() + 1 < max {
        match rest.iter().position(|&b| b == b',') {
            Some(i) => {
                fields.push(&rest[..i]);
                rest = &rest[i + 1..];
            }
            None => {
                fields.push(rest);
                return fields;
            }
        }
    }
    fields.push(rest);
    fields
}

/// Error-frame fields, e.g. `E,!NO_DATA!,,` or `E,Unauthorized user ID.,`.
///
/// Returns the comma fields (at most 4) when the line is an error frame.
pub fn error_fields(line: &[u8]) -> Option<Vec<&[u8]>> {
    if line.starts_with(ERROR_PREFIX) {
        Some(split_fields(line, 4))
    } else {
        None
    }
}

/// Human-readable reason of an error frame: the second comma field.
pub fn error_reason(line: &[u8]) -> Option<&[u8]> {
    let fields = error_fields(line)?;
    fields.get(1).copied()
}

/// True when the line is the end-of-message sentinel.
pub fn is_eom(line: &[u8]) -> bool {
    line == EOM
}

/// Connection state carried by an `S,STATS` frame, if any.
///
/// Field index 12 (zero-based) is the state string; frames too short to
/// carry it are ignored.
pub fn stats_state(line: &[u8]) -> Option<ConnState> {
    if !line.starts_with(STATS_PREFIX) {
        return None;
    }
    let fields = split_fields(line, 16);
    match fields.get(12).copied() {
        Some(b"Connected") => Some(ConnState::Connected),
        Some(b"Not Connected") => Some(ConnState::NotConnected),
        _ => None,
    }
}
