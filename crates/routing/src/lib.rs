//! Addressing and routing for meshsim.
//!
//! This crate models the network plane the simulated hosts sit on:
//!
//! - [`Address`] / [`Dns`]: host naming and resolution
//! - [`Packet`]: the unit of simulated traffic, with delivery-status flags
//! - [`Topology`]: per-path latency, reliability, and packet counters
//! - [`Router`]: the upstream queue packets land in at their destination
//!
//! Everything here is shared freely between worker threads; all types use
//! interior mutability and are `Send + Sync`.

mod address;
mod dns;
mod packet;
mod router;
mod topology;

pub use address::Address;
pub use dns::{Dns, DnsError};
pub use packet::{Packet, PacketDeliveryStatus};
pub use router::Router;
pub use topology::{PathProperties, Topology};
