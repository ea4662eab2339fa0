//! The manager: cross-worker aggregation and collaborator access.

use crate::{counters, Scheduler, SimulationConfig};
use meshsim_routing::{Address, Dns, Topology};
use meshsim_types::{Counter, HostId, SimulationTime};
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Owns the simulation-wide services workers forward to: DNS, topology,
/// configuration, and the process-wide tallies that per-worker counters
/// fold into at shutdown.
///
/// The manager never executes events and holds no lock while workers run;
/// its mutable state is either atomic or only touched at round boundaries
/// and shutdown.
#[derive(Debug)]
pub struct Manager {
    config: SimulationConfig,
    dns: Arc<Dns>,
    topology: Arc<Topology>,
    scheduler: Arc<Scheduler>,
    bootstrap_end_time: SimulationTime,
    /// Smallest path latency reported by any worker, in milliseconds.
    min_time_jump_ms: Mutex<Option<f64>>,
    plugin_errors: AtomicU64,
    alloc_counts: Mutex<Counter>,
    dealloc_counts: Mutex<Counter>,
    syscall_counts: Mutex<Counter>,
}

impl Manager {
    pub fn new(
        config: SimulationConfig,
        dns: Arc<Dns>,
        topology: Arc<Topology>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        let bootstrap_end_time = config.bootstrap_end_time();
        Self {
            config,
            dns,
            topology,
            scheduler,
            bootstrap_end_time,
            min_time_jump_ms: Mutex::new(None),
            plugin_errors: AtomicU64::new(0),
            alloc_counts: Mutex::new(Counter::new()),
            dealloc_counts: Mutex::new(Counter::new()),
            syscall_counts: Mutex::new(Counter::new()),
        }
    }

    // ─── Collaborator access ───

    pub fn dns(&self) -> &Arc<Dns> {
        &self.dns
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn scheduler_is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn bootstrap_end_time(&self) -> SimulationTime {
        self.bootstrap_end_time
    }

    // ─── Node lookups ───

    pub fn node_bandwidth_up(&self, node: HostId) -> Option<u64> {
        self.scheduler.get_host(node).map(|h| h.bandwidth_up_kibps())
    }

    pub fn node_bandwidth_down(&self, node: HostId) -> Option<u64> {
        self.scheduler
            .get_host(node)
            .map(|h| h.bandwidth_down_kibps())
    }

    /// One-way latency in milliseconds between two registered hosts.
    pub fn latency(&self, source: HostId, destination: HostId) -> Option<f64> {
        let src = self.address_of(source)?;
        let dst = self.address_of(destination)?;
        Some(self.topology.get_latency(&src, &dst))
    }

    fn address_of(&self, node: HostId) -> Option<Address> {
        let ip: Ipv4Addr = self.scheduler.get_host(node)?.ip();
        self.dns.resolve_ip(ip)
    }

    // ─── Round bookkeeping ───

    /// Fold a worker-observed path latency into the minimum time jump.
    ///
    /// The round loop uses this as a lower bound on how far simulated time
    /// may advance in one round without a host missing an inbound packet.
    pub fn update_min_time_jump(&self, path_latency_ms: f64) {
        let mut min = self.min_time_jump_ms.lock();
        match *min {
            Some(current) if current <= path_latency_ms => {}
            _ => {
                debug!(path_latency_ms, "minimum time jump updated");
                *min = Some(path_latency_ms);
            }
        }
    }

    /// The smallest path latency seen so far, defaulting to the topology's
    /// static minimum when no worker has reported one.
    pub fn min_time_jump_ms(&self) -> f64 {
        self.min_time_jump_ms
            .lock()
            .unwrap_or_else(|| self.topology.minimum_latency_ms())
    }

    pub fn increment_plugin_error(&self) {
        self.plugin_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn plugin_error_count(&self) -> u64 {
        self.plugin_errors.load(Ordering::Relaxed)
    }

    // ─── Counter aggregation ───

    pub fn add_alloc_object_counts(&self, counts: &Counter) {
        self.alloc_counts.lock().add_counter(counts);
    }

    pub fn add_dealloc_object_counts(&self, counts: &Counter) {
        self.dealloc_counts.lock().add_counter(counts);
    }

    pub fn add_syscall_counts(&self, counts: &Counter) {
        self.syscall_counts.lock().add_counter(counts);
    }

    /// Total allocation tallies: worker-submitted plus the process-wide
    /// fallback sink.
    pub fn object_alloc_counts(&self) -> Counter {
        let mut counts = self.alloc_counts.lock().clone();
        counts.add_counter(&counters::global_alloc_counts());
        counts
    }

    /// Total deallocation tallies, including the fallback sink.
    pub fn object_dealloc_counts(&self) -> Counter {
        let mut counts = self.dealloc_counts.lock().clone();
        counts.add_counter(&counters::global_dealloc_counts());
        counts
    }

    /// Total syscall tallies, including the fallback sink.
    pub fn syscall_counts(&self) -> Counter {
        let mut counts = self.syscall_counts.lock().clone();
        counts.add_counter(&counters::global_syscall_counts());
        counts
    }

    /// Log a warning for any object kind whose allocations and
    /// deallocations do not match. Called once at the end of a run.
    pub fn check_object_counts(&self) {
        let alloc = self.object_alloc_counts();
        let dealloc = self.object_dealloc_counts();
        for (name, allocated) in alloc.iter() {
            let deallocated = dealloc.get(name);
            if allocated != deallocated {
                tracing::warn!(
                    object = name,
                    allocated,
                    deallocated,
                    "object counts are unbalanced"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_host::Host;

    fn manager_with_hosts() -> Manager {
        let dns = Arc::new(Dns::new());
        let topology = Arc::new(Topology::new(20.0, 1.0));
        let scheduler = Arc::new(Scheduler::new());

        for (name, ip, up, down) in [
            ("a", Ipv4Addr::new(11, 0, 0, 1), 1000, 2000),
            ("b", Ipv4Addr::new(11, 0, 0, 2), 3000, 4000),
        ] {
            let addr = dns.register(name, ip).unwrap();
            scheduler.add_host(Arc::new(Host::new(addr.id(), name, ip, up, down, 1)));
        }

        Manager::new(SimulationConfig::default(), dns, topology, scheduler)
    }

    #[test]
    fn test_node_lookups() {
        let manager = manager_with_hosts();
        assert_eq!(manager.node_bandwidth_up(HostId(0)), Some(1000));
        assert_eq!(manager.node_bandwidth_down(HostId(1)), Some(4000));
        assert_eq!(manager.node_bandwidth_up(HostId(9)), None);
        assert_eq!(manager.latency(HostId(0), HostId(1)), Some(20.0));
        assert_eq!(manager.latency(HostId(0), HostId(9)), None);
    }

    #[test]
    fn test_min_time_jump_keeps_minimum() {
        let manager = manager_with_hosts();
        // Defaults to the topology's static minimum.
        assert_eq!(manager.min_time_jump_ms(), 20.0);

        manager.update_min_time_jump(8.0);
        manager.update_min_time_jump(12.0);
        assert_eq!(manager.min_time_jump_ms(), 8.0);
    }

    #[test]
    fn test_plugin_error_counter() {
        let manager = manager_with_hosts();
        assert_eq!(manager.plugin_error_count(), 0);
        manager.increment_plugin_error();
        manager.increment_plugin_error();
        assert_eq!(manager.plugin_error_count(), 2);
    }

    #[test]
    fn test_counter_aggregation_merges_workers() {
        let manager = manager_with_hosts();

        let mut from_worker0 = Counter::new();
        from_worker0.add_value("tcp-socket", 2);
        let mut from_worker1 = Counter::new();
        from_worker1.add_value("tcp-socket", 3);
        from_worker1.add_value("udp-socket", 1);

        manager.add_alloc_object_counts(&from_worker0);
        manager.add_alloc_object_counts(&from_worker1);

        let totals = manager.object_alloc_counts();
        assert_eq!(totals.get("tcp-socket"), 5);
        assert_eq!(totals.get("udp-socket"), 1);
    }

    #[test]
    fn test_scheduler_running_forwarding() {
        let manager = manager_with_hosts();
        assert!(!manager.scheduler_is_running());
        manager.scheduler().start();
        assert!(manager.scheduler_is_running());
    }
}
