//! Running registry: the process-wide liveness map.
//!
//! The supervisor and the admin loop are the only writers; every other
//! component only observes. Observation is allowed to be stale and is
//! rechecked by socket deadlines downstream.

use dashmap::DashMap;

/// Key of the supervised X display child.
pub const DISPLAY: &str = "xvfb";
/// Key of the supervised market-data daemon child.
pub const FEED: &str = "iqfeed";
/// Key of the logical "upstream is Connected" flag owned by the admin loop.
pub const ADMIN: &str = "admin";

/// Liveness token stored per service name.
///
/// Supervised children record their OS pid so the kill lever can reach
/// them; logical flags carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Pid(i32),
    Ready,
}

/// Concurrency-safe name -> liveness mapping.
///
/// At most one entry per key; an entry is present iff the service is
/// believed healthy. No iteration is exposed.
#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<String, Liveness>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn store(&self, name: &str, value: Liveness) {
        self.entries.insert(name.to_string(), value);
    }

    pub fn load(&self, name: &str) -> Option<Liveness> {
        self.entries.get(name).map(|e| *e.value())
    }

    pub fn delete(&self, name: &str) {
        self.entries.remove(name);
    }

    /// True when an entry exists for `name`, whatever its shape.
    pub fn is_up(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Pid of a supervised child, `None` when absent or not a child entry.
    pub fn pid(&self, name: &str) -> Option<i32> {
        match self.load(name)? {
            Liveness::Pid(pid) => Some(pid),
            Liveness::Ready => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ADMIN, FEED, Liveness, Registry};

    #[test]
    fn store_load_delete_roundtrip() {
        let reg = Registry::new();
        assert!(!reg.is_up(FEED));

        reg.store(FEED, Liveness::Pid(4242));
        assert!(reg.is_up(FEED));
        assert_eq!(reg.load(FEED), Some(Liveness::Pid(4242)));

        reg.delete(FEED);
        assert!(!reg.is_up(FEED));
        assert_eq!(reg.load(FEED), None);
    }

    #[test]
    fn pid_is_total_over_entry_shapes() {
        let reg = Registry::new();
        reg.store(FEED, Liveness::Pid(77));
        reg.store(ADMIN, Liveness::Ready);

        assert_eq!(reg.pid(FEED), Some(77));
        assert_eq!(reg.pid(ADMIN), None);
        assert_eq!(reg.pid("missing"), None);
    }

    #[test]
    fn store_replaces_existing_entry() {
        let reg = Registry::new();
        reg.store(FEED, Liveness::Pid(1));
        reg.store(FEED, Liveness::Pid(2));
        assert_eq!(reg.pid(FEED), Some(2));
    }
}
