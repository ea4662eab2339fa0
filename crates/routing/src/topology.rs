//! Network topology: path latency, reliability, and traffic counters.

use crate::Address;
use dashmap::DashMap;
use meshsim_types::HostId;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Properties of one directed path between two hosts.
#[derive(Debug)]
pub struct PathProperties {
    /// One-way latency in milliseconds.
    pub latency_ms: f64,
    /// Probability in `[0, 1]` that a packet survives the path.
    pub reliability: f64,
    /// Packets scheduled across this path so far.
    packet_count: AtomicU64,
}

impl PathProperties {
    pub fn new(latency_ms: f64, reliability: f64) -> Self {
        Self {
            latency_ms,
            reliability: reliability.clamp(0.0, 1.0),
            packet_count: AtomicU64::new(0),
        }
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count.load(Ordering::Relaxed)
    }
}

/// The simulated network graph.
///
/// Modeled as a complete graph with a default path, plus per-pair overrides
/// keyed by `(source, destination)`. Lookups happen on every packet send
/// from every worker thread; the override table is a `DashMap` and the
/// counters are atomic, so no lookup takes an exclusive lock.
#[derive(Debug)]
pub struct Topology {
    default_path: PathProperties,
    paths: DashMap<(HostId, HostId), PathProperties>,
}

impl Topology {
    /// Build a topology where every pair of hosts is connected by a path
    /// with the given latency and reliability.
    pub fn new(default_latency_ms: f64, default_reliability: f64) -> Self {
        Self {
            default_path: PathProperties::new(default_latency_ms, default_reliability),
            paths: DashMap::new(),
        }
    }

    /// Override the path from `src` to `dst`.
    pub fn set_path(&self, src: HostId, dst: HostId, latency_ms: f64, reliability: f64) {
        self.paths
            .insert((src, dst), PathProperties::new(latency_ms, reliability));
    }

    pub fn get_reliability(&self, src: &Address, dst: &Address) -> f64 {
        match self.paths.get(&(src.id(), dst.id())) {
            Some(p) => p.reliability,
            None => self.default_path.reliability,
        }
    }

    /// One-way latency in milliseconds from `src` to `dst`.
    pub fn get_latency(&self, src: &Address, dst: &Address) -> f64 {
        match self.paths.get(&(src.id(), dst.id())) {
            Some(p) => p.latency_ms,
            None => self.default_path.latency_ms,
        }
    }

    /// Record one packet scheduled across the `src → dst` path.
    ///
    /// Pairs without an explicit override accumulate on the default path.
    pub fn increment_path_packet_counter(&self, src: &Address, dst: &Address) {
        let count = match self.paths.get(&(src.id(), dst.id())) {
            Some(p) => {
                p.packet_count.fetch_add(1, Ordering::Relaxed);
                p.packet_count()
            }
            None => {
                self.default_path.packet_count.fetch_add(1, Ordering::Relaxed);
                self.default_path.packet_count()
            }
        };
        trace!(src = %src.ip(), dst = %dst.ip(), count, "path packet counter");
    }

    /// Total packets scheduled across all paths.
    pub fn total_packet_count(&self) -> u64 {
        self.default_path.packet_count()
            + self
                .paths
                .iter()
                .map(|p| p.packet_count())
                .sum::<u64>()
    }

    /// The smallest one-way latency of any path, in milliseconds.
    ///
    /// Used to bound how far simulated time may jump between rounds.
    pub fn minimum_latency_ms(&self) -> f64 {
        self.paths
            .iter()
            .map(|p| p.latency_ms)
            .fold(self.default_path.latency_ms, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr_pair() -> (Address, Address) {
        let dns = crate::Dns::new();
        let a = dns.register("h1", Ipv4Addr::new(11, 0, 0, 1)).unwrap();
        let b = dns.register("h2", Ipv4Addr::new(11, 0, 0, 2)).unwrap();
        (a, b)
    }

    #[test]
    fn test_default_path() {
        let topology = Topology::new(20.0, 0.98);
        let (a, b) = addr_pair();
        assert_eq!(topology.get_latency(&a, &b), 20.0);
        assert_eq!(topology.get_reliability(&a, &b), 0.98);
    }

    #[test]
    fn test_path_override_is_directional() {
        let topology = Topology::new(20.0, 1.0);
        let (a, b) = addr_pair();
        topology.set_path(a.id(), b.id(), 5.0, 0.5);

        assert_eq!(topology.get_latency(&a, &b), 5.0);
        assert_eq!(topology.get_reliability(&a, &b), 0.5);
        // Reverse direction keeps the default
        assert_eq!(topology.get_latency(&b, &a), 20.0);
        assert_eq!(topology.get_reliability(&b, &a), 1.0);
    }

    #[test]
    fn test_reliability_clamped() {
        let topology = Topology::new(20.0, 1.7);
        let (a, b) = addr_pair();
        assert_eq!(topology.get_reliability(&a, &b), 1.0);
    }

    #[test]
    fn test_packet_counters() {
        let topology = Topology::new(20.0, 1.0);
        let (a, b) = addr_pair();
        topology.set_path(a.id(), b.id(), 5.0, 1.0);

        topology.increment_path_packet_counter(&a, &b);
        topology.increment_path_packet_counter(&a, &b);
        topology.increment_path_packet_counter(&b, &a); // default path

        assert_eq!(topology.total_packet_count(), 3);
    }

    #[test]
    fn test_minimum_latency() {
        let topology = Topology::new(20.0, 1.0);
        let (a, b) = addr_pair();
        assert_eq!(topology.minimum_latency_ms(), 20.0);
        topology.set_path(a.id(), b.id(), 3.5, 1.0);
        assert_eq!(topology.minimum_latency_ms(), 3.5);
    }
}
