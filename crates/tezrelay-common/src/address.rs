//! Tez-address parsing.
//!
//! A tez-address is the string `"<userId>@<host>"` uniquely identifying a user
//! on a given relay. A bare id with no `@` refers to a user on the local relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parsed tez-address: a user part and an optional relay host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TezAddress {
    pub user: String,
    pub host: Option<String>,
}

impl TezAddress {
    /// Parse an address string. Returns `None` for shapes that can never
    /// resolve anywhere: empty user part, empty host part, or more than one `@`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split('@').collect::<Vec<_>>().as_slice() {
            [user] => Some(Self { user: (*user).to_owned(), host: None }),
            [user, host] if !user.is_empty() && !host.is_empty() => {
                Some(Self { user: (*user).to_owned(), host: Some((*host).to_owned()) })
            }
            _ => None,
        }
    }

    /// True if this address is hosted on `our_host` (explicitly, or bare).
    pub fn is_local_to(&self, our_host: &str) -> bool {
        match &self.host {
            None => true,
            Some(h) => h == our_host,
        }
    }

    /// The user part as a Uuid, for local contact lookups.
    pub fn local_user_id(&self) -> Option<Uuid> {
        self.user.parse().ok()
    }
}

impl fmt::Display for TezAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{}@{}", self.user, host),
            None => write!(f, "{}", self.user),
        }
    }
}

/// Build the canonical address for a local user.
pub fn tez_address(user_id: Uuid, relay_host: &str) -> String {
    format!("{user_id}@{relay_host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qualified_address() {
        let a = TezAddress::parse("alice@relay.example.com").unwrap();
        assert_eq!(a.user, "alice");
        assert_eq!(a.host.as_deref(), Some("relay.example.com"));
        assert!(a.is_local_to("relay.example.com"));
        assert!(!a.is_local_to("other.example.com"));
    }

    #[test]
    fn bare_id_is_local_everywhere() {
        let a = TezAddress::parse("d9b2d63d-a233-4123-847a-7b1b83b44c4f").unwrap();
        assert!(a.host.is_none());
        assert!(a.is_local_to("any.host"));
        assert!(a.local_user_id().is_some());
    }

    #[test]
    fn rejects_malformed() {
        assert!(TezAddress::parse("").is_none());
        assert!(TezAddress::parse("@host").is_none());
        assert!(TezAddress::parse("user@").is_none());
        assert!(TezAddress::parse("a@b@c").is_none());
    }

    #[test]
    fn display_round_trips() {
        for raw in ["alice@relay.example.com", "alice"] {
            let a = TezAddress::parse(raw).unwrap();
            assert_eq!(a.to_string(), raw);
        }
    }
}
