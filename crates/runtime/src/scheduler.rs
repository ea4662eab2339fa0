//! The shared event queue.

use crate::Event;
use dashmap::DashMap;
use meshsim_host::Host;
use meshsim_types::{HostId, SimulationTime};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Orders events across hosts and hands them to whichever worker is
/// draining a host's queue.
///
/// One min-heap per host. Workers push into any host's queue (packet
/// deliveries cross hosts) but only the worker currently executing a host
/// pops from it, so the per-queue mutexes see almost no contention. The
/// `running` flag makes late scheduling attempts fail soft: pushes after
/// [`stop`](Self::stop) return false instead of queueing work that will
/// never run.
#[derive(Debug, Default)]
pub struct Scheduler {
    hosts: DashMap<HostId, Arc<Host>>,
    queues: DashMap<HostId, Mutex<BinaryHeap<Reverse<Event>>>>,
    running: AtomicBool,
    sequence: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host and allocate its event queue.
    pub fn add_host(&self, host: Arc<Host>) {
        self.queues.insert(host.id(), Mutex::new(BinaryHeap::new()));
        self.hosts.insert(host.id(), host);
    }

    pub fn get_host(&self, id: HostId) -> Option<Arc<Host>> {
        self.hosts.get(&id).map(|h| Arc::clone(&h))
    }

    /// All registered host ids, sorted for deterministic iteration.
    pub fn host_ids(&self) -> Vec<HostId> {
        let mut ids: Vec<HostId> = self.hosts.iter().map(|h| *h.key()).collect();
        ids.sort();
        ids
    }

    /// All registered hosts, sorted by id.
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.host_ids()
            .into_iter()
            .filter_map(|id| self.get_host(id))
            .collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Queue an event for its destination host.
    ///
    /// Returns false when the scheduler is stopped or the destination is
    /// unknown. The event's sequence number is assigned here, making push
    /// order the tie-break for same-time events.
    pub fn push(&self, mut event: Event) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(queue) = self.queues.get(&event.destination()) else {
            warn!(destination = %event.destination(), "dropping event for unknown host");
            return false;
        };
        event.set_sequence(self.sequence.fetch_add(1, Ordering::Relaxed));
        queue.lock().push(Reverse(event));
        true
    }

    /// Pop the earliest event for `host` if it lies strictly before
    /// `before`.
    pub fn pop_next_event_before(
        &self,
        host: HostId,
        before: SimulationTime,
    ) -> Option<Event> {
        let queue = self.queues.get(&host)?;
        let mut queue = queue.lock();
        let due = matches!(queue.peek(), Some(Reverse(event)) if event.time() < before);
        if due {
            queue.pop().map(|Reverse(event)| event)
        } else {
            None
        }
    }

    /// The earliest queued event time for `host`, or
    /// [`SimulationTime::MAX`] when its queue is empty.
    pub fn next_event_time_for_host(&self, host: HostId) -> SimulationTime {
        self.queues
            .get(&host)
            .and_then(|q| q.lock().peek().map(|Reverse(e)| e.time()))
            .unwrap_or(SimulationTime::MAX)
    }

    /// The earliest queued event time across all hosts, or
    /// [`SimulationTime::MAX`] when everything is drained.
    pub fn next_event_time(&self) -> SimulationTime {
        self.queues
            .iter()
            .filter_map(|q| q.lock().peek().map(|Reverse(e)| e.time()))
            .min()
            .unwrap_or(SimulationTime::MAX)
    }

    /// Total queued events across all hosts.
    pub fn pending_event_count(&self) -> usize {
        self.queues.iter().map(|q| q.lock().len()).sum()
    }
}
