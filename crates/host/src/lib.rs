//! Simulated hosts and their applications.
//!
//! A [`Host`] is a node in the simulated network: it owns an upstream
//! [`Router`](meshsim_routing::Router), a seeded RNG used for packet-drop
//! draws, an execution timer, and a set of [`Process`]es. Hosts are shared
//! across worker threads as `Arc<Host>` and use interior mutability
//! throughout; at most one worker executes a given host's events at a time,
//! so the internal locks are uncontended.

mod host;
mod process;

pub use host::Host;
pub use process::Process;
