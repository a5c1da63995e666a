//! Recipient partitioning — splits a share's recipient list into local ids
//! and per-host remote address groups.
//!
//! A bare id, or an address whose host equals ours, is local; anything else
//! is grouped under its host for one outbound bundle per peer.

use std::collections::BTreeMap;

use uuid::Uuid;

use tezrelay_common::address::TezAddress;
use tezrelay_common::error::RelayError;

/// The result of partitioning a recipient list.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecipientSplit {
    /// Local user ids, in input order, de-duplicated.
    pub local: Vec<Uuid>,
    /// Remote addresses grouped by host, each slice in input order.
    pub remote: BTreeMap<String, Vec<String>>,
}

/// Partition raw recipient addresses relative to `our_host`.
///
/// Malformed addresses and local parts that are not valid user ids raise a
/// validation error naming the offending input.
pub fn partition_recipients(
    addresses: &[String],
    our_host: &str,
) -> Result<RecipientSplit, RelayError> {
    let mut split = RecipientSplit::default();

    for raw in addresses {
        let addr = TezAddress::parse(raw).ok_or_else(|| RelayError::Validation {
            message: format!("malformed recipient address '{raw}'"),
        })?;

        if addr.is_local_to(our_host) {
            let user_id = addr.local_user_id().ok_or_else(|| RelayError::Validation {
                message: format!("'{raw}' is not a valid local user id"),
            })?;
            if !split.local.contains(&user_id) {
                split.local.push(user_id);
            }
        } else {
            let host = addr.host.clone().expect("non-local address always has a host");
            let entry = split.remote.entry(host).or_default();
            let canonical = addr.to_string();
            if !entry.contains(&canonical) {
                entry.push(canonical);
            }
        }
    }

    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUR: &str = "relay-a.example";

    fn uid(n: u8) -> String {
        Uuid::from_bytes([n; 16]).to_string()
    }

    #[test]
    fn bare_ids_and_our_host_are_local() {
        let addrs = vec![uid(1), format!("{}@{OUR}", uid(2))];
        let split = partition_recipients(&addrs, OUR).unwrap();
        assert_eq!(split.local.len(), 2);
        assert!(split.remote.is_empty());
    }

    #[test]
    fn remote_addresses_group_by_host() {
        let addrs = vec![
            format!("{}@relay-b.example", uid(1)),
            format!("{}@relay-c.example", uid(2)),
            format!("{}@relay-b.example", uid(3)),
            uid(4),
        ];
        let split = partition_recipients(&addrs, OUR).unwrap();
        assert_eq!(split.local, vec![Uuid::from_bytes([4; 16])]);
        assert_eq!(split.remote.len(), 2);
        assert_eq!(split.remote["relay-b.example"].len(), 2);
        assert_eq!(
            split.remote["relay-b.example"][0],
            format!("{}@relay-b.example", uid(1))
        );
    }

    #[test]
    fn duplicates_collapse() {
        let addrs = vec![
            uid(1),
            uid(1),
            format!("{}@relay-b.example", uid(2)),
            format!("{}@relay-b.example", uid(2)),
        ];
        let split = partition_recipients(&addrs, OUR).unwrap();
        assert_eq!(split.local.len(), 1);
        assert_eq!(split.remote["relay-b.example"].len(), 1);
    }

    #[test]
    fn malformed_address_is_a_validation_error() {
        for bad in ["@host", "user@", "a@b@c", "not-a-uuid"] {
            let err = partition_recipients(&[bad.to_string()], OUR).unwrap_err();
            assert!(matches!(err, RelayError::Validation { .. }), "{bad} should fail");
        }
    }
}
