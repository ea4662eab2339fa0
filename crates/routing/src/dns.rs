//! Name and IP resolution.

use crate::Address;
use dashmap::DashMap;
use meshsim_types::HostId;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

/// Errors from address registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DnsError {
    #[error("hostname '{0}' is already registered")]
    NameInUse(String),

    #[error("ip address {0} is already registered")]
    IpInUse(Ipv4Addr),
}

/// Bidirectional host registry: name ↔ address and IP ↔ address.
///
/// Registration happens single-threaded during setup; resolution is called
/// concurrently from every worker thread, so both tables are `DashMap`s.
#[derive(Debug, Default)]
pub struct Dns {
    by_ip: DashMap<Ipv4Addr, Address>,
    by_name: DashMap<String, Address>,
    next_id: AtomicU64,
}

impl Dns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host, assigning it a fresh [`HostId`].
    ///
    /// Both the name and the IP must be unused.
    pub fn register(&self, name: &str, ip: Ipv4Addr) -> Result<Address, DnsError> {
        if self.by_name.contains_key(name) {
            return Err(DnsError::NameInUse(name.to_owned()));
        }
        if self.by_ip.contains_key(&ip) {
            return Err(DnsError::IpInUse(ip));
        }

        let id = HostId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let address = Address::new(id, ip, name);
        self.by_name.insert(name.to_owned(), address.clone());
        self.by_ip.insert(ip, address.clone());

        debug!(%id, %ip, name, "registered host address");
        Ok(address)
    }

    pub fn resolve_ip(&self, ip: Ipv4Addr) -> Option<Address> {
        self.by_ip.get(&ip).map(|a| a.clone())
    }

    pub fn resolve_name(&self, name: &str) -> Option<Address> {
        self.by_name.get(name).map(|a| a.clone())
    }

    /// Number of registered hosts.
    pub fn len(&self) -> usize {
        self.by_ip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ip.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let dns = Dns::new();
        let ip = Ipv4Addr::new(11, 0, 0, 1);
        let addr = dns.register("relay1", ip).unwrap();

        assert_eq!(dns.resolve_ip(ip), Some(addr.clone()));
        assert_eq!(dns.resolve_name("relay1"), Some(addr.clone()));
        assert_eq!(addr.name(), "relay1");
        assert_eq!(addr.ip(), ip);
    }

    #[test]
    fn test_ids_are_unique() {
        let dns = Dns::new();
        let a = dns.register("a", Ipv4Addr::new(11, 0, 0, 1)).unwrap();
        let b = dns.register("b", Ipv4Addr::new(11, 0, 0, 2)).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let dns = Dns::new();
        let ip = Ipv4Addr::new(11, 0, 0, 1);
        dns.register("a", ip).unwrap();

        assert_eq!(
            dns.register("a", Ipv4Addr::new(11, 0, 0, 2)),
            Err(DnsError::NameInUse("a".to_owned()))
        );
        assert_eq!(dns.register("b", ip), Err(DnsError::IpInUse(ip)));
        assert_eq!(dns.len(), 1);
    }

    #[test]
    fn test_unknown_lookups_return_none() {
        let dns = Dns::new();
        assert!(dns.resolve_ip(Ipv4Addr::new(10, 0, 0, 1)).is_none());
        assert!(dns.resolve_name("nobody").is_none());
    }
}
