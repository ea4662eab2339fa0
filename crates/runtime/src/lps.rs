//! Logical processors: the execution slots workers are scheduled onto.

use crate::affinity;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Accumulates the time an LP spends with no worker to run.
#[derive(Debug)]
struct IdleTimer {
    started: Option<Instant>,
    total: Duration,
}

impl IdleTimer {
    fn running() -> Self {
        Self {
            started: Some(Instant::now()),
            total: Duration::ZERO,
        }
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.total += started.elapsed();
        }
    }

    fn resume(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.total + started.elapsed(),
            None => self.total,
        }
    }
}

#[derive(Debug)]
struct LogicalProcessor {
    /// Workers ready to run on this LP.
    ready: Mutex<VecDeque<usize>>,
    /// Workers that finished the current task on this LP. Rotated into
    /// `ready` by [`LogicalProcessors::finish_task`] between rounds.
    done: Mutex<VecDeque<usize>>,
    /// CPU this LP pins its workers to; `None` when pinning is disabled.
    cpu_id: Option<u32>,
    idle: Mutex<IdleTimer>,
}

/// A fixed set of logical processors.
///
/// Each LP runs at most one worker at a time; that exclusivity is what lets
/// the pool keep per-LP reduction slots lock-free. The ready/done split
/// exists so that a running worker can queue itself as finished without
/// racing the coordinator's end-of-round rotation: workers only push to
/// `done`, and only the coordinator moves `done` back to `ready` (and only
/// while no worker runs).
#[derive(Debug)]
pub struct LogicalProcessors {
    lps: Vec<LogicalProcessor>,
}

impl LogicalProcessors {
    /// Allocate `n` LPs with empty queues, pinned to distinct CPUs when
    /// `pin_cpus` is set and the platform supports it.
    ///
    /// Idle timers start running: an LP is idle until its first dispatch.
    pub fn new(n: usize, pin_cpus: bool) -> Self {
        assert!(n >= 1, "need at least one logical processor");
        let lps = (0..n)
            .map(|i| LogicalProcessor {
                ready: Mutex::new(VecDeque::new()),
                done: Mutex::new(VecDeque::new()),
                cpu_id: affinity::cpu_for_logical_processor(i, pin_cpus),
                idle: Mutex::new(IdleTimer::running()),
            })
            .collect();
        Self { lps }
    }

    pub fn len(&self) -> usize {
        self.lps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lps.is_empty()
    }

    pub fn cpu_id(&self, lp_index: usize) -> Option<u32> {
        self.lps[lp_index].cpu_id
    }

    /// Append `worker` to LP `lp_index`'s ready queue.
    pub fn ready_push(&self, lp_index: usize, worker: usize) {
        self.lps[lp_index].ready.lock().push_back(worker);
    }

    /// Append `worker` to LP `lp_index`'s done queue.
    pub fn done_push(&self, lp_index: usize, worker: usize) {
        self.lps[lp_index].done.lock().push_back(worker);
    }

    /// Find a worker to run on LP `lp_index`.
    ///
    /// Prefers the head of the LP's own ready queue. When that is empty,
    /// steals the head of the first non-empty ready queue, scanning the
    /// other LPs round-robin starting at `lp_index + 1`. Returns `None`
    /// when every ready queue is empty.
    pub fn pop_worker_to_run_on(&self, lp_index: usize) -> Option<usize> {
        let n = self.lps.len();
        for offset in 0..n {
            let i = (lp_index + offset) % n;
            if let Some(worker) = self.lps[i].ready.lock().pop_front() {
                return Some(worker);
            }
        }
        None
    }

    /// Rotate every LP's done queue back into its ready queue.
    ///
    /// Called exclusively by the coordinator between rounds, while no
    /// worker is running.
    pub fn finish_task(&self) {
        for lp in &self.lps {
            let mut done = lp.done.lock();
            let mut ready = lp.ready.lock();
            ready.extend(done.drain(..));
        }
    }

    /// Mark LP `lp_index` busy: a worker is about to run on it.
    pub fn idle_timer_stop(&self, lp_index: usize) {
        self.lps[lp_index].idle.lock().stop();
    }

    /// Mark LP `lp_index` idle: it has no more workers to run this round.
    pub fn idle_timer_resume(&self, lp_index: usize) {
        self.lps[lp_index].idle.lock().resume();
    }

    /// Total time LP `lp_index` has spent idle.
    pub fn idle_elapsed(&self, lp_index: usize) -> Duration {
        self.lps[lp_index].idle.lock().elapsed()
    }

    /// Number of workers currently in LP `lp_index`'s ready queue.
    pub fn ready_len(&self, lp_index: usize) -> usize {
        self.lps[lp_index].ready.lock().len()
    }

    /// Number of workers currently in LP `lp_index`'s done queue.
    pub fn done_len(&self, lp_index: usize) -> usize {
        self.lps[lp_index].done.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_prefers_own_queue() {
        let lps = LogicalProcessors::new(2, false);
        lps.ready_push(0, 10);
        lps.ready_push(1, 20);

        assert_eq!(lps.pop_worker_to_run_on(0), Some(10));
        assert_eq!(lps.pop_worker_to_run_on(1), Some(20));
        assert_eq!(lps.pop_worker_to_run_on(0), None);
    }

    #[test]
    fn test_pop_steals_round_robin_from_next() {
        let lps = LogicalProcessors::new(3, false);
        lps.ready_push(2, 7);
        lps.ready_push(1, 5);

        // LP 0 is empty; the scan starts at LP 1.
        assert_eq!(lps.pop_worker_to_run_on(0), Some(5));
        assert_eq!(lps.pop_worker_to_run_on(0), Some(7));
        assert_eq!(lps.pop_worker_to_run_on(0), None);
    }

    #[test]
    fn test_pop_is_fifo_within_queue() {
        let lps = LogicalProcessors::new(1, false);
        lps.ready_push(0, 1);
        lps.ready_push(0, 2);
        lps.ready_push(0, 3);

        assert_eq!(lps.pop_worker_to_run_on(0), Some(1));
        assert_eq!(lps.pop_worker_to_run_on(0), Some(2));
        assert_eq!(lps.pop_worker_to_run_on(0), Some(3));
    }

    #[test]
    fn test_finish_task_rotates_done_to_ready() {
        let lps = LogicalProcessors::new(2, false);
        lps.ready_push(0, 1);
        lps.done_push(0, 2);
        lps.done_push(1, 3);

        lps.finish_task();

        assert_eq!(lps.done_len(0), 0);
        assert_eq!(lps.done_len(1), 0);
        // Done entries are appended after existing ready entries.
        assert_eq!(lps.pop_worker_to_run_on(0), Some(1));
        assert_eq!(lps.pop_worker_to_run_on(0), Some(2));
        assert_eq!(lps.pop_worker_to_run_on(1), Some(3));
    }

    #[test]
    fn test_idle_timer_brackets() {
        let lps = LogicalProcessors::new(1, false);
        // Idle from creation.
        std::thread::sleep(Duration::from_millis(2));
        lps.idle_timer_stop(0);
        let idle = lps.idle_elapsed(0);
        assert!(idle >= Duration::from_millis(2));

        // Busy time does not accumulate.
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(lps.idle_elapsed(0), idle);

        lps.idle_timer_resume(0);
        std::thread::sleep(Duration::from_millis(2));
        assert!(lps.idle_elapsed(0) > idle);
    }

    #[test]
    fn test_cpu_ids_assigned_when_pinning() {
        let lps = LogicalProcessors::new(2, true);
        assert_eq!(lps.cpu_id(0), Some(0));
        assert!(lps.cpu_id(1).is_some());

        let unpinned = LogicalProcessors::new(2, false);
        assert_eq!(unpinned.cpu_id(0), None);
    }

    #[test]
    #[should_panic(expected = "at least one logical processor")]
    fn test_zero_lps_rejected() {
        LogicalProcessors::new(0, false);
    }
}
