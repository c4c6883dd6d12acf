//! Source IP allow-list for inbound notifications.
//!
//! Entries are exact addresses or CIDR ranges. An empty list allows every
//! source. IPv4-mapped IPv6 peers (`::ffff:a.b.c.d`) match IPv4 entries.

use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;

#[derive(Debug, thiserror::Error)]
#[error("invalid allow-list entry '{entry}': {reason}")]
pub struct AllowListError {
    pub entry: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpAllowList {
    networks: Vec<IpNetwork>,
}

impl IpAllowList {
    /// Parse a comma-separated list of IPs and CIDR ranges.
    pub fn parse(list: &str) -> Result<Self, AllowListError> {
        let mut networks = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let network = if entry.contains('/') {
                IpNetwork::from_str(entry).map_err(|e| AllowListError {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                })?
            } else {
                let ip = IpAddr::from_str(entry).map_err(|e| AllowListError {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                })?;
                IpNetwork::from(ip)
            };
            networks.push(network);
        }
        Ok(Self { networks })
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// True when `source` is allowed. Unparseable sources are refused
    /// unless the list is empty.
    pub fn allows(&self, source: &str) -> bool {
        if self.networks.is_empty() {
            return true;
        }
        let Ok(ip) = IpAddr::from_str(source.trim()) else {
            return false;
        };

        let mapped = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4),
            IpAddr::V4(_) => None,
        };

        self.networks
            .iter()
            .any(|net| net.contains(ip) || mapped.is_some_and(|v4| net.contains(v4)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_allows_all() {
        let list = IpAllowList::parse(" , ").unwrap();
        assert!(list.is_empty());
        assert!(list.allows("203.0.113.9"));
        assert!(list.allows("not-an-ip"));
    }

    #[test]
    fn test_exact_and_cidr_entries() {
        let list = IpAllowList::parse("192.0.2.10, 10.0.0.0/8, 2001:db8::/32").unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.allows("192.0.2.10"));
        assert!(!list.allows("192.0.2.11"));
        assert!(list.allows("10.200.3.4"));
        assert!(list.allows("2001:db8::1"));
        assert!(!list.allows("2001:db9::1"));
        assert!(!list.allows("garbage"));
    }

    #[test]
    fn test_ipv4_mapped_ipv6_matches() {
        let list = IpAllowList::parse("10.0.0.0/8").unwrap();
        assert!(list.allows("::ffff:10.1.2.3"));
    }

    #[test]
    fn test_invalid_entry_rejected() {
        let err = IpAllowList::parse("10.0.0.0/33").unwrap_err();
        assert_eq!(err.entry, "10.0.0.0/33");
        assert!(IpAllowList::parse("example.com").is_err());
    }
}
