//! The worker pool: thread lifecycle, round dispatch, and reductions.

use crate::{affinity, CountDownLatch, LogicalProcessors, Manager, Scheduler, Semaphore, Worker};
use meshsim_types::SimulationTime;
use parking_lot::RwLock;
use std::io;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors from pool construction.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("workers must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("parallelism must be at least 1, got {0}")]
    InvalidParallelism(usize),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Sentinel for a worker not yet assigned to any logical processor.
const LP_UNASSIGNED: usize = usize::MAX;

/// The task dispatched to every worker for one round. `None` in the task
/// slot is the shutdown sentinel.
type RoundTaskFn = Arc<dyn Fn(&Worker) + Send + Sync>;

/// State shared between the coordinator and the worker threads.
///
/// Thread-safety notes, by field:
/// - `begin_sems` / `finish_latch`: the only signalling primitives; their
///   post/wait and decrement-to-zero edges carry all happens-before.
/// - `task`: written by the coordinator only while every worker is parked
///   between rounds; workers only read it.
/// - `worker_lp_idxs[w]`: written only between popping `w` from a ready
///   queue and posting `w`'s begin semaphore; the queue pop serializes
///   writers.
/// - `worker_native_tids[w]`: written once by worker `w` before its first
///   latch count-down, immutable after.
/// - `min_event_times[i]`: written only by the single worker running on LP
///   `i`; read and reset by the coordinator between rounds.
pub(crate) struct PoolShared {
    pub(crate) manager: Arc<Manager>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) n_workers: usize,
    pub(crate) begin_sems: Vec<Semaphore>,
    pub(crate) worker_lp_idxs: Vec<AtomicUsize>,
    pub(crate) worker_native_tids: Vec<AtomicI64>,
    pub(crate) finish_latch: CountDownLatch,
    pub(crate) task: RwLock<Option<RoundTaskFn>>,
    pub(crate) lps: LogicalProcessors,
    pub(crate) min_event_times: Vec<AtomicU64>,
}

impl PoolShared {
    /// Record `worker`'s new LP and repin its OS thread to the LP's CPU.
    fn set_logical_processor_idx(&self, worker: usize, lp_index: usize) {
        assert!(lp_index < self.lps.len());

        let old_index = self.worker_lp_idxs[worker].swap(lp_index, Ordering::Relaxed);
        let old_cpu = if old_index == LP_UNASSIGNED {
            None
        } else {
            self.lps.cpu_id(old_index)
        };
        let new_cpu = self.lps.cpu_id(lp_index);
        let tid = self.worker_native_tids[worker].load(Ordering::Relaxed);
        affinity::set_native_thread_affinity(tid, new_cpu, old_cpu);
    }

    /// Find and claim a worker to run the current or next task on
    /// `lp_index`. Prefers a worker that last ran there; otherwise migrates
    /// one from another LP, updating its affinity to match.
    fn next_worker_for_lp(&self, lp_index: usize) -> Option<usize> {
        let worker = self.lps.pop_worker_to_run_on(lp_index)?;
        self.set_logical_processor_idx(worker, lp_index);
        Some(worker)
    }
}

/// A fixed pool of worker threads executing one task per round.
///
/// Rounds are bracketed by [`start_task`](Self::start_task) /
/// [`await_task`](Self::await_task) on the coordinator thread. Exactly
/// `min(n_workers, n_lps)` workers start immediately on dispatch; the rest
/// are pulled in by finishing workers handing their LP to a successor.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    threads: Vec<JoinHandle<()>>,
    joined: bool,
}

impl WorkerPool {
    /// Spawn `n_workers` threads scheduled onto `min(n_parallel,
    /// n_workers)` logical processors.
    ///
    /// Blocks until every worker has registered its native thread id, then
    /// distributes workers round-robin over the LPs and applies initial
    /// affinity.
    pub fn new(
        manager: Arc<Manager>,
        scheduler: Arc<Scheduler>,
        n_workers: usize,
        n_parallel: usize,
    ) -> Result<Self, PoolError> {
        if n_workers == 0 {
            return Err(PoolError::InvalidWorkerCount(n_workers));
        }
        if n_parallel == 0 {
            return Err(PoolError::InvalidParallelism(n_parallel));
        }

        // Never makes sense to use more logical processors than workers.
        let n_lps = n_parallel.min(n_workers);
        let pin_cpus = manager.config().use_cpu_pinning;

        let shared = Arc::new(PoolShared {
            manager,
            scheduler,
            n_workers,
            begin_sems: (0..n_workers).map(|_| Semaphore::new(0)).collect(),
            worker_lp_idxs: (0..n_workers)
                .map(|_| AtomicUsize::new(LP_UNASSIGNED))
                .collect(),
            worker_native_tids: (0..n_workers)
                .map(|_| AtomicI64::new(affinity::UNKNOWN_TID))
                .collect(),
            finish_latch: CountDownLatch::new(n_workers),
            task: RwLock::new(None),
            lps: LogicalProcessors::new(n_lps, pin_cpus),
            min_event_times: (0..n_lps)
                .map(|_| AtomicU64::new(SimulationTime::MAX.nanos()))
                .collect(),
        });

        let mut threads = Vec::with_capacity(n_workers);
        for thread_id in 0..n_workers {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("worker-{thread_id}"))
                .spawn(move || worker_main(shared, thread_id))
                .map_err(PoolError::Spawn)?;
            threads.push(handle);
        }

        // Wait for all threads to record their native thread ids.
        shared.finish_latch.wait();
        shared.finish_latch.reset();

        for worker in 0..n_workers {
            let lp_index = worker % n_lps;
            shared.lps.ready_push(lp_index, worker);
            shared.set_logical_processor_idx(worker, lp_index);
        }

        debug!(n_workers, n_lps, pin_cpus, "worker pool started");
        Ok(Self {
            shared,
            threads,
            joined: false,
        })
    }

    pub fn n_workers(&self) -> usize {
        self.shared.n_workers
    }

    pub fn n_logical_processors(&self) -> usize {
        self.shared.lps.len()
    }

    /// Dispatch `task` to every worker for one round.
    ///
    /// Panics if a task is already in flight: rounds may not overlap.
    pub fn start_task(&self, task: impl Fn(&Worker) + Send + Sync + 'static) {
        self.dispatch(Some(Arc::new(task)));
    }

    /// Install `task` (or the `None` shutdown sentinel) and release one
    /// worker per logical processor. Remaining workers are pulled in by
    /// the handoff in the worker loop as LPs free up.
    fn dispatch(&self, task: Option<RoundTaskFn>) {
        {
            let mut slot = self.shared.task.write();
            assert!(slot.is_none(), "a task is already dispatched");
            *slot = task;
        }

        for lp_index in 0..self.shared.lps.len() {
            match self.shared.next_worker_for_lp(lp_index) {
                Some(worker) => {
                    self.shared.lps.idle_timer_stop(lp_index);
                    self.shared.begin_sems[worker].post();
                }
                // There's no more work to start.
                None => break,
            }
        }
    }

    /// Wait for every worker to finish the current round, then rotate the
    /// LP done queues back to ready and clear the task slot.
    pub fn await_task(&self) {
        self.shared.finish_latch.wait();
        self.shared.finish_latch.reset();

        *self.shared.task.write() = None;
        self.shared.lps.finish_task();
    }

    /// Scan the per-LP minimum event times contributed this round, reset
    /// each slot, and return the global minimum ([`SimulationTime::MAX`]
    /// when no contributions occurred).
    ///
    /// Called by the coordinator between rounds only, so a plain linear
    /// scan over O(n_lps) slots without locks.
    pub fn global_next_event_time(&self) -> SimulationTime {
        let mut min = SimulationTime::MAX;
        for slot in &self.shared.min_event_times {
            let contributed =
                SimulationTime::from_nanos(slot.swap(SimulationTime::MAX.nanos(), Ordering::Relaxed));
            min = min.min(contributed);
        }
        min
    }

    /// Shut down: release every worker with the shutdown sentinel, wait for
    /// them to observe it, and join the OS threads.
    pub fn join_all(&mut self) {
        assert!(!self.joined, "worker pool joined twice");

        // Signal threads to exit.
        self.dispatch(None);
        self.await_task();

        for lp_index in 0..self.shared.lps.len() {
            debug!(
                lp = lp_index,
                idle = ?self.shared.lps.idle_elapsed(lp_index),
                "logical processor idle time"
            );
        }

        for (thread_id, handle) in self.threads.drain(..).enumerate() {
            if handle.join().is_err() {
                panic!("worker thread {thread_id} panicked");
            }
        }
        self.joined = true;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.joined && !thread::panicking() {
            self.join_all();
        }
    }
}

/// Entry point for worker threads.
fn worker_main(shared: Arc<PoolShared>, thread_id: usize) {
    shared.worker_native_tids[thread_id].store(affinity::native_thread_id(), Ordering::Relaxed);

    let worker = Worker::new(Arc::clone(&shared), thread_id);
    let _counters_guard = worker.install_thread_counters();

    // Signal the coordinator that the native thread id is recorded.
    shared.finish_latch.count_down();

    loop {
        // Wait for work to do.
        shared.begin_sems[thread_id].wait();

        let task = shared.task.read().clone();
        if let Some(task) = &task {
            task(&worker);
        }

        let lp_index = shared.worker_lp_idxs[thread_id].load(Ordering::Relaxed);
        shared.lps.done_push(lp_index, thread_id);

        match shared.next_worker_for_lp(lp_index) {
            // Start running the next worker on this LP.
            Some(next) => shared.begin_sems[next].post(),
            // No more workers to run; the LP is now idle.
            None => shared.lps.idle_timer_resume(lp_index),
        }

        shared.finish_latch.count_down();

        if task.is_none() {
            break;
        }
    }
    trace!(worker = thread_id, "worker finished");
}
