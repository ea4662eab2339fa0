//! Foundational types for the meshsim discrete-event network simulator.
//!
//! This crate provides the types shared by every layer of the simulator:
//!
//! - **Time**: [`SimulationTime`] and [`EmulatedTime`], the monotonic
//!   nanosecond clocks that all events are ordered by
//! - **Identifiers**: [`HostId`]
//! - **Counters**: [`Counter`], the named tally map used for object
//!   allocation and syscall accounting
//!
//! # Design Philosophy
//!
//! This crate is self-contained with no dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod counter;
mod time;

pub use counter::Counter;
pub use time::{EmulatedTime, SimulationTime, EMULATED_TIME_OFFSET};

/// Identifier for a simulated host.
///
/// Assigned by the DNS registry when a host's address is registered and used
/// as the key for scheduler queues and topology paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostId(pub u64);

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host#{}", self.0)
    }
}
