//! Host addresses.

use meshsim_types::HostId;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// A resolved host address: the stable identifier, IPv4 address, and
/// hostname registered with the [`Dns`](crate::Dns).
///
/// Addresses are small and cheap to clone; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    id: HostId,
    ip: Ipv4Addr,
    name: Arc<str>,
}

impl Address {
    pub(crate) fn new(id: HostId, ip: Ipv4Addr, name: &str) -> Self {
        Self {
            id,
            ip,
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.ip)
    }
}
