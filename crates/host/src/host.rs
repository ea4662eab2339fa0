//! Host state and lifecycle.

use crate::Process;
use meshsim_routing::Router;
use meshsim_types::HostId;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Wall-clock accumulator for time spent executing a host's events.
///
/// Workers bracket host execution with continue/stop; the accumulated total
/// feeds per-host runtime reports at shutdown.
#[derive(Debug, Default)]
struct ExecutionTimer {
    started: Option<Instant>,
    total: Duration,
}

impl ExecutionTimer {
    fn resume(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.total += started.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.total + started.elapsed(),
            None => self.total,
        }
    }
}

/// A node in the simulated network.
///
/// Shared as `Arc<Host>` between the scheduler, topology bookkeeping, and
/// whichever worker is currently executing the host's events. The worker
/// pool guarantees a host's events never run on two workers at once, so the
/// interior locks only ever serialize against setup/teardown.
#[derive(Debug)]
pub struct Host {
    id: HostId,
    name: String,
    ip: Ipv4Addr,
    bandwidth_up_kibps: u64,
    bandwidth_down_kibps: u64,
    router: Arc<Router>,
    random: Mutex<ChaCha8Rng>,
    execution_timer: Mutex<ExecutionTimer>,
    processes: Mutex<Vec<Process>>,
    booted: AtomicBool,
    shut_down: AtomicBool,
}

impl Host {
    pub fn new(
        id: HostId,
        name: &str,
        ip: Ipv4Addr,
        bandwidth_up_kibps: u64,
        bandwidth_down_kibps: u64,
        seed: u64,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            ip,
            bandwidth_up_kibps,
            bandwidth_down_kibps,
            router: Arc::new(Router::new()),
            random: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            execution_timer: Mutex::new(ExecutionTimer::default()),
            processes: Mutex::new(Vec::new()),
            booted: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn bandwidth_up_kibps(&self) -> u64 {
        self.bandwidth_up_kibps
    }

    pub fn bandwidth_down_kibps(&self) -> u64 {
        self.bandwidth_down_kibps
    }

    // ─── Lifecycle ───

    /// Bring the host online: start every registered process.
    pub fn boot(&self) {
        assert!(
            !self.booted.swap(true, Ordering::Relaxed),
            "host {} booted twice",
            self.name
        );
        let processes = self.processes.lock();
        for process in processes.iter() {
            process.start();
        }
        debug!(host = %self.name, processes = processes.len(), "host booted");
    }

    /// Take the host offline. All applications must already be freed.
    pub fn shutdown(&self) {
        assert!(
            self.processes.lock().is_empty(),
            "host {} shut down with live applications",
            self.name
        );
        self.shut_down.store(true, Ordering::Relaxed);
        trace!(host = %self.name, "host shut down");
    }

    /// Stop and drop every application on this host.
    pub fn free_all_applications(&self) {
        let mut processes = self.processes.lock();
        for process in processes.iter() {
            process.stop();
        }
        let n = processes.len();
        processes.clear();
        debug!(host = %self.name, freed = n, "applications freed");
    }

    pub fn add_process(&self, process: Process) {
        self.processes.lock().push(process);
    }

    pub fn process_count(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Relaxed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Relaxed)
    }

    // ─── Execution timing ───

    pub fn continue_execution_timer(&self) {
        self.execution_timer.lock().resume();
    }

    pub fn stop_execution_timer(&self) {
        self.execution_timer.lock().stop();
    }

    pub fn execution_time_elapsed(&self) -> Duration {
        self.execution_timer.lock().elapsed()
    }

    // ─── Routing ───

    /// The router that traffic destined to `ip` on this host lands in.
    ///
    /// The host model has a single upstream interface, so every destination
    /// maps to the same router.
    pub fn upstream_router(&self, _ip: Ipv4Addr) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    // ─── Randomness ───

    /// Draw from the host's deterministic random stream.
    pub fn next_random_f64(&self) -> f64 {
        self.random.lock().gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(seed: u64) -> Host {
        Host::new(
            HostId(0),
            "relay1",
            Ipv4Addr::new(11, 0, 0, 1),
            1024,
            2048,
            seed,
        )
    }

    #[test]
    fn test_boot_starts_processes() {
        let h = host(1);
        h.add_process(Process::new("app1"));
        h.add_process(Process::new("app2"));
        assert!(!h.is_booted());

        h.boot();
        assert!(h.is_booted());
        assert_eq!(h.process_count(), 2);
    }

    #[test]
    #[should_panic(expected = "booted twice")]
    fn test_double_boot_panics() {
        let h = host(1);
        h.boot();
        h.boot();
    }

    #[test]
    fn test_shutdown_requires_freed_applications() {
        let h = host(1);
        h.add_process(Process::new("app"));
        h.boot();
        h.free_all_applications();
        assert_eq!(h.process_count(), 0);
        h.shutdown();
        assert!(h.is_shut_down());
    }

    #[test]
    #[should_panic(expected = "live applications")]
    fn test_shutdown_with_live_applications_panics() {
        let h = host(1);
        h.add_process(Process::new("app"));
        h.boot();
        h.shutdown();
    }

    #[test]
    fn test_random_stream_is_deterministic() {
        let a = host(42);
        let b = host(42);
        for _ in 0..16 {
            assert_eq!(a.next_random_f64(), b.next_random_f64());
        }
        let c = host(43);
        assert_ne!(a.next_random_f64(), c.next_random_f64());
    }

    #[test]
    fn test_execution_timer_accumulates() {
        let h = host(1);
        h.continue_execution_timer();
        std::thread::sleep(Duration::from_millis(5));
        h.stop_execution_timer();
        let elapsed = h.execution_time_elapsed();
        assert!(elapsed >= Duration::from_millis(5));

        // Stopped timer does not keep counting
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(h.execution_time_elapsed(), elapsed);
    }

    #[test]
    fn test_upstream_router_is_stable() {
        let h = host(1);
        let r1 = h.upstream_router(Ipv4Addr::new(11, 0, 0, 9));
        let r2 = h.upstream_router(Ipv4Addr::new(11, 0, 0, 10));
        assert!(Arc::ptr_eq(&r1, &r2));
    }
}
