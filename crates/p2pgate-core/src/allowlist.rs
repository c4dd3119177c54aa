//! Destination allowlist — which hosts may be relayed to, and on which ports.
//!
//! The allowlist is split into two types:
//!
//! - [`Allowlist`] — an immutable-once-built index from hostname to the list
//!   of ports that host may receive connections on.
//! - [`AllowlistHandle`] — the shared owner of the current [`Allowlist`]
//!   snapshot. Readers clone an `Arc` and keep using their snapshot; a
//!   refresh replaces the whole structure in one swap, never mutating a map
//!   a reader might be iterating.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Ports permitted for hosts that do not appear in the allowlist at all.
///
/// An absent hostname means "use default ports", not "deny all".
pub const DEFAULT_ALLOWED_PORTS: &[&str] = &["80", "443"];

/// Index of allowed relay destinations.
///
/// Ports accumulate as recorded: a host listed by several registry records
/// keeps every port from every record, duplicates included.
#[derive(Debug, Clone)]
pub struct Allowlist {
    ports: HashMap<String, Vec<String>>,
    default_ports: Vec<String>,
}

impl Allowlist {
    /// Create an empty allowlist with an explicit default port set.
    pub fn new(default_ports: Vec<String>) -> Self {
        Self {
            ports: HashMap::new(),
            default_ports,
        }
    }

    /// Create an empty allowlist using [`DEFAULT_ALLOWED_PORTS`].
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_ALLOWED_PORTS.iter().map(|p| p.to_string()).collect())
    }

    /// Record `port` as allowed for `host`.
    pub fn insert(&mut self, host: impl Into<String>, port: impl Into<String>) {
        self.ports.entry(host.into()).or_default().push(port.into());
    }

    /// Check whether a relay to `hostname:port` is permitted.
    ///
    /// Known hosts are checked against their recorded ports; unknown hosts
    /// fall back to the default port set. Pure lookup, safe for unbounded
    /// concurrent callers.
    pub fn is_allowed(&self, hostname: &str, port: &str) -> bool {
        let allowed = match self.ports.get(hostname) {
            Some(ports) => ports.as_slice(),
            None => self.default_ports.as_slice(),
        };
        allowed.iter().any(|p| p == port)
    }

    /// All hostnames with an explicit entry.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(|h| h.as_str())
    }

    /// Recorded ports for `host`, if it has an explicit entry.
    pub fn ports(&self, host: &str) -> Option<&[String]> {
        self.ports.get(host).map(|p| p.as_slice())
    }

    /// The first port recorded for `host` (the report's representative port).
    pub fn first_port(&self, host: &str) -> Option<&str> {
        self.ports
            .get(host)
            .and_then(|p| p.first())
            .map(|p| p.as_str())
    }

    /// Number of hosts with an explicit entry.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Shared owner of the current allowlist snapshot.
///
/// `snapshot` hands out the current `Arc<Allowlist>`; `replace` swaps in a
/// freshly built list. The lock is held only for the pointer operation, so
/// request handlers never contend with a refresh mid-lookup.
#[derive(Debug)]
pub struct AllowlistHandle {
    inner: RwLock<Arc<Allowlist>>,
}

impl AllowlistHandle {
    pub fn new(list: Allowlist) -> Self {
        Self {
            inner: RwLock::new(Arc::new(list)),
        }
    }

    /// The current snapshot. Callers keep it valid for as long as they hold it,
    /// even across a concurrent `replace`.
    pub fn snapshot(&self) -> Arc<Allowlist> {
        self.inner.read().expect("allowlist lock poisoned").clone()
    }

    /// Atomically replace the whole allowlist with a new snapshot.
    pub fn replace(&self, list: Allowlist) {
        *self.inner.write().expect("allowlist lock poisoned") = Arc::new(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Allowlist {
        let mut list = Allowlist::with_defaults();
        list.insert("203.0.113.5", "9999");
        list.insert("203.0.113.5", "19999");
        list
    }

    #[test]
    fn known_host_checks_recorded_ports() {
        let list = sample();
        assert!(list.is_allowed("203.0.113.5", "9999"));
        assert!(list.is_allowed("203.0.113.5", "19999"));
        assert!(!list.is_allowed("203.0.113.5", "80"));
    }

    #[test]
    fn unknown_host_falls_back_to_default_ports() {
        let list = sample();
        assert!(list.is_allowed("198.51.100.7", "80"));
        assert!(list.is_allowed("198.51.100.7", "443"));
        assert!(!list.is_allowed("198.51.100.7", "8080"));
    }

    #[test]
    fn custom_default_ports() {
        let list = Allowlist::new(vec!["8443".to_string()]);
        assert!(list.is_allowed("anything", "8443"));
        assert!(!list.is_allowed("anything", "443"));
    }

    #[test]
    fn duplicate_ports_are_preserved() {
        let mut list = Allowlist::with_defaults();
        list.insert("10.0.0.1", "9999");
        list.insert("10.0.0.1", "9999");
        assert_eq!(list.ports("10.0.0.1").unwrap().len(), 2);
    }

    #[test]
    fn handle_replaces_whole_snapshot() {
        let handle = AllowlistHandle::new(sample());
        let before = handle.snapshot();
        assert!(before.is_allowed("203.0.113.5", "9999"));

        handle.replace(Allowlist::with_defaults());
        let after = handle.snapshot();
        assert!(!after.is_allowed("203.0.113.5", "9999"));
        // The old snapshot is unaffected by the swap.
        assert!(before.is_allowed("203.0.113.5", "9999"));
    }
}
