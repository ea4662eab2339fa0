//! Object and syscall accounting.
//!
//! Workers tally object allocations/deallocations and syscalls into
//! per-worker [`Counter`]s that are handed to the manager at shutdown. The
//! entry points below are free functions so that instrumented code can call
//! them from anywhere: on a worker thread they hit the worker's own
//! counters (no contention), and anywhere else (process startup, teardown,
//! tests) they fall back to a process-wide sink that the manager folds
//! into its totals.
//!
//! Object counting is globally toggled once at startup via
//! [`set_object_counting`]; when disabled, per-worker object counters are
//! never created and increments are suppressed. Syscall accounting is
//! always on.

use meshsim_types::Counter;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// The per-worker counter set, shared between the worker's own context and
/// the thread-local slot the free functions read.
#[derive(Debug)]
pub(crate) struct WorkerCounters {
    /// `Some` iff object counting is enabled.
    pub(crate) alloc: Option<Mutex<Counter>>,
    /// `Some` iff object counting is enabled.
    pub(crate) dealloc: Option<Mutex<Counter>>,
    pub(crate) syscall: Mutex<Counter>,
}

impl WorkerCounters {
    pub(crate) fn new(object_counting: bool) -> Self {
        Self {
            alloc: object_counting.then(|| Mutex::new(Counter::new())),
            dealloc: object_counting.then(|| Mutex::new(Counter::new())),
            syscall: Mutex::new(Counter::new()),
        }
    }
}

thread_local! {
    /// The counters of the worker running on this thread, if any.
    static ACTIVE_COUNTERS: RefCell<Option<Arc<WorkerCounters>>> = const { RefCell::new(None) };
}

/// Clears the thread-local counter slot when a worker thread exits.
pub(crate) struct ActiveCountersGuard;

impl ActiveCountersGuard {
    pub(crate) fn install(counters: Arc<WorkerCounters>) -> Self {
        ACTIVE_COUNTERS.with(|slot| *slot.borrow_mut() = Some(counters));
        ActiveCountersGuard
    }
}

impl Drop for ActiveCountersGuard {
    fn drop(&mut self) {
        ACTIVE_COUNTERS.with(|slot| *slot.borrow_mut() = None);
    }
}

static OBJECT_COUNTING: AtomicBool = AtomicBool::new(true);

/// Enable or disable object allocation/deallocation counting.
///
/// Installed once from configuration before any pool is constructed;
/// defaults to enabled.
pub fn set_object_counting(enabled: bool) {
    OBJECT_COUNTING.store(enabled, Ordering::Relaxed);
}

pub fn object_counting_enabled() -> bool {
    OBJECT_COUNTING.load(Ordering::Relaxed)
}

/// Process-wide fallback sink for accounting calls made outside any worker
/// thread.
#[derive(Debug, Default)]
struct GlobalSink {
    alloc: Mutex<Counter>,
    dealloc: Mutex<Counter>,
    syscall: Mutex<Counter>,
}

fn global_sink() -> &'static GlobalSink {
    static GLOBAL: OnceLock<GlobalSink> = OnceLock::new();
    GLOBAL.get_or_init(GlobalSink::default)
}

/// Record one allocation of the named object kind.
pub fn increment_object_alloc_counter(object_name: &str) {
    if !object_counting_enabled() {
        return;
    }
    ACTIVE_COUNTERS.with(|slot| match slot.borrow().as_ref() {
        Some(counters) => {
            if let Some(alloc) = &counters.alloc {
                alloc.lock().add_value(object_name, 1);
            }
        }
        // No live worker; fall back to the shared sink.
        None => global_sink().alloc.lock().add_value(object_name, 1),
    });
}

/// Record one deallocation of the named object kind.
pub fn increment_object_dealloc_counter(object_name: &str) {
    if !object_counting_enabled() {
        return;
    }
    ACTIVE_COUNTERS.with(|slot| match slot.borrow().as_ref() {
        Some(counters) => {
            if let Some(dealloc) = &counters.dealloc {
                dealloc.lock().add_value(object_name, 1);
            }
        }
        None => global_sink().dealloc.lock().add_value(object_name, 1),
    });
}

/// Merge a batch of syscall tallies into the current worker's counter, or
/// into the shared sink when called outside a worker thread.
pub fn add_syscall_counts(counts: &Counter) {
    ACTIVE_COUNTERS.with(|slot| match slot.borrow().as_ref() {
        Some(counters) => counters.syscall.lock().add_counter(counts),
        None => global_sink().syscall.lock().add_counter(counts),
    });
}

/// Snapshot of the fallback allocation tallies.
pub fn global_alloc_counts() -> Counter {
    global_sink().alloc.lock().clone()
}

/// Snapshot of the fallback deallocation tallies.
pub fn global_dealloc_counts() -> Counter {
    global_sink().dealloc.lock().clone()
}

/// Snapshot of the fallback syscall tallies.
pub fn global_syscall_counts() -> Counter {
    global_sink().syscall.lock().clone()
}
