//! Connection targets and the last-connection record.

use std::fmt;

use crate::store::{shared_get, shared_set, SharedStore, StoreError};

pub const LAST_IP: &str = "LAST_IP";
pub const LAST_PORT: &str = "LAST_PORT";
pub const LAST_NAME: &str = "LAST_NAME";

// ── ConnectionTarget ──────────────────────────────────────────────────────────

/// Where to connect and who to log in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self { host: host.into(), port, username: username.into() }
    }

    /// The login line sent immediately after the TCP connect.
    pub fn login_line(&self) -> String {
        format!("LOGIN={};\n", self.username)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Parse a port number, rejecting 0.
pub fn parse_port(s: &str) -> Option<u16> {
    s.parse::<u16>().ok().filter(|&p| p != 0)
}

/// Check a username for the login line: non-empty, no `;` and no control
/// characters.
pub fn valid_username(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c == ';' || c.is_control())
}

// ── ConnectionRegistry ────────────────────────────────────────────────────────

/// Remembers the most recently used [`ConnectionTarget`].
#[derive(Clone)]
pub struct ConnectionRegistry {
    store: SharedStore,
}

impl ConnectionRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Upsert `target` as the last connection.
    pub fn record(&self, target: &ConnectionTarget) -> Result<(), StoreError> {
        shared_set(&self.store, LAST_IP, &target.host)?;
        shared_set(&self.store, LAST_PORT, &target.port.to_string())?;
        shared_set(&self.store, LAST_NAME, &target.username)
    }

    /// The last recorded target, if all three fields are present and valid.
    pub fn load(&self) -> Option<ConnectionTarget> {
        let host = shared_get(&self.store, LAST_IP)?;
        let port = parse_port(&shared_get(&self.store, LAST_PORT)?)?;
        let username = shared_get(&self.store, LAST_NAME)?;
        Some(ConnectionTarget { host, port, username })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{shared, MemoryStore};

    #[test]
    fn load_when_never_recorded() {
        let reg = ConnectionRegistry::new(shared(MemoryStore::new()));
        assert_eq!(reg.load(), None);
    }

    #[test]
    fn record_then_load() {
        let reg = ConnectionRegistry::new(shared(MemoryStore::new()));
        let target = ConnectionTarget::new("10.0.0.5", 2112, "bob");
        reg.record(&target).unwrap();
        assert_eq!(reg.load(), Some(target));
    }

    #[test]
    fn record_overwrites() {
        let reg = ConnectionRegistry::new(shared(MemoryStore::new()));
        reg.record(&ConnectionTarget::new("a", 1, "x")).unwrap();
        reg.record(&ConnectionTarget::new("b", 2, "y")).unwrap();
        assert_eq!(reg.load(), Some(ConnectionTarget::new("b", 2, "y")));
    }

    #[test]
    fn bad_stored_port_loads_nothing() {
        let store = shared(MemoryStore::new());
        shared_set(&store, LAST_IP, "host").unwrap();
        shared_set(&store, LAST_PORT, "lots").unwrap();
        shared_set(&store, LAST_NAME, "bob").unwrap();
        assert_eq!(ConnectionRegistry::new(store).load(), None);
    }

    #[test]
    fn partial_record_loads_nothing() {
        let store = shared(MemoryStore::new());
        shared_set(&store, LAST_IP, "host").unwrap();
        shared_set(&store, LAST_PORT, "2112").unwrap();
        assert_eq!(ConnectionRegistry::new(store).load(), None);
    }

    #[test]
    fn port_parsing() {
        assert_eq!(parse_port("2112"), Some(2112));
        assert_eq!(parse_port("65535"), Some(65535));
        assert_eq!(parse_port("0"), None);
        assert_eq!(parse_port("65536"), None);
        assert_eq!(parse_port("-1"), None);
        assert_eq!(parse_port("notaport"), None);
    }

    #[test]
    fn username_validation() {
        assert!(valid_username("Bob"));
        assert!(valid_username("Bob Smith"));
        assert!(!valid_username(""));
        assert!(!valid_username("a\nMSGALL x"));
        assert!(!valid_username("a;b"));
        assert!(!valid_username("tab\there"));
    }

    #[test]
    fn login_line_format() {
        let t = ConnectionTarget::new("h", 1, "Bob");
        assert_eq!(t.login_line(), "LOGIN=Bob;\n");
        assert_eq!(t.to_string(), "Bob@h:1");
    }
}
