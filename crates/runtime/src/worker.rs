//! Per-worker execution context and the APIs exposed to simulation code.

use crate::counters::{ActiveCountersGuard, WorkerCounters};
use crate::pool::PoolShared;
use crate::{Event, Manager, Scheduler, SimulationConfig, Task};
use meshsim_host::Host;
use meshsim_routing::{Address, Dns, Packet, PacketDeliveryStatus, Topology};
use meshsim_types::{EmulatedTime, HostId, SimulationTime};
use std::cell::{Cell, RefCell};
use std::mem;
use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, Level};

/// The per-thread worker context.
///
/// One `Worker` lives on each pool thread, created when the thread starts
/// and destroyed when it exits; the coordinator never touches it. Event
/// handlers and round tasks receive `&Worker` explicitly, which is also the
/// handle for everything simulation code may do mid-event: schedule tasks,
/// send packets, resolve addresses, read clocks and configuration, and
/// contribute to the next round's minimum-event-time reduction.
pub struct Worker {
    shared: Arc<PoolShared>,
    thread_id: usize,
    /// Simulated time of the event currently executing, INVALID between
    /// events.
    current_time: Cell<SimulationTime>,
    last_event_time: Cell<SimulationTime>,
    /// Upper exclusive bound for events executable this round.
    round_end_time: Cell<SimulationTime>,
    active_host: RefCell<Option<Arc<Host>>>,
    counters: Arc<WorkerCounters>,
    bootstrap_end_time: SimulationTime,
}

impl Worker {
    pub(crate) fn new(shared: Arc<PoolShared>, thread_id: usize) -> Self {
        let bootstrap_end_time = shared.manager.bootstrap_end_time();
        let object_counting = shared.manager.config().use_object_counters;
        Self {
            shared,
            thread_id,
            current_time: Cell::new(SimulationTime::INVALID),
            last_event_time: Cell::new(SimulationTime::ZERO),
            round_end_time: Cell::new(SimulationTime::ZERO),
            active_host: RefCell::new(None),
            counters: Arc::new(WorkerCounters::new(object_counting)),
            bootstrap_end_time,
        }
    }

    /// Make this worker's counters visible to the free-function counter
    /// entry points for the lifetime of the returned guard.
    pub(crate) fn install_thread_counters(&self) -> ActiveCountersGuard {
        ActiveCountersGuard::install(Arc::clone(&self.counters))
    }

    // ─── Clocks and identity ───

    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    pub fn current_time(&self) -> SimulationTime {
        self.current_time.get()
    }

    /// Set the simulated clock directly. Used by the boot path (hosts boot
    /// at time zero) and by tests; event execution manages the clock via
    /// [`run_event`](Self::run_event).
    pub fn set_current_time(&self, time: SimulationTime) {
        self.current_time.set(time);
    }

    pub fn last_event_time(&self) -> SimulationTime {
        self.last_event_time.get()
    }

    pub fn round_end_time(&self) -> SimulationTime {
        self.round_end_time.get()
    }

    /// Install the upper exclusive bound for events this round. Set by the
    /// round task before draining any host queue.
    pub fn set_round_end_time(&self, time: SimulationTime) {
        self.round_end_time.set(time);
    }

    /// The clock exposed to simulated applications: current simulated time
    /// shifted to place t=0 at January 1st, 2000. Only meaningful inside an
    /// event.
    pub fn emulated_time(&self) -> EmulatedTime {
        let now = self.current_time.get();
        assert!(now.is_valid(), "emulated_time read outside an event");
        EmulatedTime::from_simulation_time(now)
    }

    /// Whether the simulation is still in its bootstrap phase, during which
    /// reliability-based packet drops are suppressed.
    pub fn is_bootstrap_active(&self) -> bool {
        self.current_time.get() < self.bootstrap_end_time
    }

    pub fn active_host(&self) -> Option<Arc<Host>> {
        self.active_host.borrow().clone()
    }

    pub fn set_active_host(&self, host: Option<Arc<Host>>) {
        *self.active_host.borrow_mut() = host;
    }

    // ─── Event execution ───

    /// Execute one event: advance the clock to the event's time, run its
    /// task against the destination host, then return the clock to INVALID.
    pub fn run_event(&self, event: Event) {
        self.current_time.set(event.time());

        let host = self
            .shared
            .scheduler
            .get_host(event.destination())
            .unwrap_or_else(|| panic!("event destined to unknown {}", event.destination()));
        event.task().execute(self, &host);

        self.last_event_time.set(event.time());
        self.current_time.set(SimulationTime::INVALID);
    }

    /// Schedule `task` to run on `host` after `nano_delay` of simulated
    /// time. Returns false when the scheduler has stopped or rejects the
    /// event. Must be called from within an event (the clock must be
    /// valid), so the new event can never land before the current time.
    pub fn schedule_task(&self, task: Task, host: &Arc<Host>, nano_delay: SimulationTime) -> bool {
        if !self.shared.manager.scheduler_is_running() {
            return false;
        }

        let now = self.current_time.get();
        assert!(now.is_valid(), "schedule_task called outside an event");

        let event = Event::new(task, now + nano_delay, host.id(), host.id());
        self.shared.scheduler.push(event)
    }

    /// Send `packet` from `src_host` through the simulated network.
    ///
    /// The path's reliability decides whether the packet survives: during
    /// bootstrap, for zero-length control packets, and when the source
    /// host's random draw falls within the path reliability, a delivery
    /// event is scheduled on the destination host `ceil(latency_ms)` of
    /// simulated milliseconds from now. Otherwise the packet is stamped
    /// dropped and no event is scheduled.
    ///
    /// Panics if either endpoint has no registered address.
    pub fn send_packet(&self, src_host: &Arc<Host>, packet: &Arc<Packet>) {
        if !self.shared.manager.scheduler_is_running() {
            // The simulation is over, don't bother.
            return;
        }

        let src_ip = packet.source_ip();
        let dst_ip = packet.destination_ip();
        let src_address = self
            .resolve_ip_to_address(src_ip)
            .unwrap_or_else(|| panic!("unable to schedule packet: no address for {src_ip}"));
        let dst_address = self
            .resolve_ip_to_address(dst_ip)
            .unwrap_or_else(|| panic!("unable to schedule packet: no address for {dst_ip}"));

        let topology = self.topology();
        let reliability = topology.get_reliability(&src_address, &dst_address);
        let chance = src_host.next_random_f64();

        // Don't drop zero-length control packets, otherwise congestion
        // control has problems responding to packet loss.
        if self.is_bootstrap_active() || chance <= reliability || packet.is_control() {
            let latency_ms = topology.get_latency(&src_address, &dst_address);
            let delay = SimulationTime::from_latency_ms(latency_ms);
            let deliver_time = self.current_time.get() + delay;

            topology.increment_path_packet_counter(&src_address, &dst_address);

            let dst_host = self
                .shared
                .scheduler
                .get_host(dst_address.id())
                .unwrap_or_else(|| panic!("no host registered for {}", dst_address.id()));

            packet.add_delivery_status(PacketDeliveryStatus::INET_SENT);

            // The destination timeline gets its own copy; the delivery task
            // holds the only reference until it executes.
            let delivered = packet.copy_for_delivery();
            let deliver_task = Task::new("deliver-packet", move |_worker, host| {
                let router = host.upstream_router(delivered.destination_ip());
                router.enqueue(Arc::clone(&delivered));
            });

            let event = Event::new(deliver_task, deliver_time, src_host.id(), dst_host.id());
            self.shared.scheduler.push(event);
        } else {
            packet.add_delivery_status(PacketDeliveryStatus::INET_DROPPED);
        }
    }

    // ─── Host lifecycle ───

    /// Boot each host at simulated time zero, bracketing with the host's
    /// execution timer.
    pub fn boot_hosts(&self, hosts: &[Arc<Host>]) {
        for host in hosts {
            self.set_active_host(Some(Arc::clone(host)));
            self.current_time.set(SimulationTime::ZERO);
            host.continue_execution_timer();
            host.boot();
            host.stop_execution_timer();
            self.current_time.set(SimulationTime::INVALID);
            self.set_active_host(None);
        }
    }

    /// Shut down `hosts` and hand this worker's counters to the manager.
    ///
    /// Applications are freed on every host before any host shuts down, so
    /// cross-host references stay valid until nothing can touch them.
    pub fn finish(&self, hosts: &[Arc<Host>]) {
        if !hosts.is_empty() {
            info!(hosts = hosts.len(), "starting to shut down hosts");
            for host in hosts {
                self.set_active_host(Some(Arc::clone(host)));
                host.continue_execution_timer();
                host.free_all_applications();
                host.stop_execution_timer();
                self.set_active_host(None);
            }
            for host in hosts {
                self.set_active_host(Some(Arc::clone(host)));
                host.shutdown();
                self.set_active_host(None);
            }
            info!(hosts = hosts.len(), "hosts are shut down");
        }

        let manager = &self.shared.manager;
        if let Some(alloc) = &self.counters.alloc {
            manager.add_alloc_object_counts(&mem::take(&mut *alloc.lock()));
        }
        if let Some(dealloc) = &self.counters.dealloc {
            manager.add_dealloc_object_counts(&mem::take(&mut *dealloc.lock()));
        }
        manager.add_syscall_counts(&mem::take(&mut *self.counters.syscall.lock()));
    }

    // ─── Round reduction ───

    /// Contribute `time` to the next round's global-minimum reduction.
    ///
    /// Times inside the current round are ignored: those events execute
    /// this round and must not drag the next round's start backwards. The
    /// write is lock-free because at most one worker runs on a logical
    /// processor at a time, so this worker is the only writer of its LP's
    /// slot.
    pub fn set_min_event_time_next_round(&self, time: SimulationTime) {
        if time < self.round_end_time.get() {
            return;
        }

        let lp_index = self.lp_index();
        let slot = &self.shared.min_event_times[lp_index];
        if time.nanos() < slot.load(Ordering::Relaxed) {
            slot.store(time.nanos(), Ordering::Relaxed);
        }
    }

    fn lp_index(&self) -> usize {
        self.shared.worker_lp_idxs[self.thread_id].load(Ordering::Relaxed)
    }

    // ─── Forwarders ───

    pub fn manager(&self) -> &Arc<Manager> {
        &self.shared.manager
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.shared.scheduler
    }

    pub fn dns(&self) -> &Arc<Dns> {
        self.shared.manager.dns()
    }

    pub fn topology(&self) -> &Arc<Topology> {
        self.shared.manager.topology()
    }

    pub fn config(&self) -> &SimulationConfig {
        self.shared.manager.config()
    }

    pub fn resolve_ip_to_address(&self, ip: Ipv4Addr) -> Option<Address> {
        self.dns().resolve_ip(ip)
    }

    pub fn resolve_name_to_address(&self, name: &str) -> Option<Address> {
        self.dns().resolve_name(name)
    }

    /// The CPU this worker's logical processor is pinned to, if any.
    pub fn affinity(&self) -> Option<u32> {
        self.shared.lps.cpu_id(self.lp_index())
    }

    pub fn node_bandwidth_up(&self, node: HostId) -> Option<u64> {
        self.shared.manager.node_bandwidth_up(node)
    }

    pub fn node_bandwidth_down(&self, node: HostId) -> Option<u64> {
        self.shared.manager.node_bandwidth_down(node)
    }

    pub fn latency(
        &self,
        source: HostId,
        destination: HostId,
    ) -> Option<f64> {
        self.shared.manager.latency(source, destination)
    }

    pub fn update_min_time_jump(&self, path_latency_ms: f64) {
        self.shared.manager.update_min_time_jump(path_latency_ms);
    }

    pub fn increment_plugin_error(&self) {
        self.shared.manager.increment_plugin_error();
    }

    /// True when log records at `level` would be discarded by the installed
    /// subscriber, letting callers skip expensive formatting.
    pub fn is_filtered(&self, level: Level) -> bool {
        let enabled = if level == Level::ERROR {
            tracing::enabled!(Level::ERROR)
        } else if level == Level::WARN {
            tracing::enabled!(Level::WARN)
        } else if level == Level::INFO {
            tracing::enabled!(Level::INFO)
        } else if level == Level::DEBUG {
            tracing::enabled!(Level::DEBUG)
        } else {
            tracing::enabled!(Level::TRACE)
        };
        !enabled
    }
}
