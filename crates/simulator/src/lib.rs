//! Simulation runner for meshsim.
//!
//! Wires the pieces together (DNS, topology, hosts, scheduler, manager,
//! worker pool), seeds a ping workload, and drives synchronous rounds until
//! the configured stop time. Given the same configuration and seed, a run
//! is deterministic.

mod runner;

pub use runner::{RunStats, Runner, RunnerConfig, RunnerError};
