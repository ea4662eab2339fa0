//! Worker pool and per-worker runtime for meshsim.
//!
//! The simulator advances simulated time in synchronous rounds. Within a
//! round, a fixed set of worker threads drains events from the shared
//! [`Scheduler`] and executes them on behalf of simulated hosts. This crate
//! is that execution engine:
//!
//! - [`WorkerPool`]: owns the worker threads and drives round dispatch
//! - [`Worker`]: per-thread context handed to every task and event handler
//! - [`LogicalProcessors`]: the CPU-bound slots workers are scheduled onto
//! - [`CountDownLatch`] / [`Semaphore`]: the two signalling primitives the
//!   round barrier is built from
//! - [`Scheduler`], [`Manager`], [`SimulationConfig`]: the event queue and
//!   the aggregation/configuration layer the worker API forwards to
//!
//! # Execution model
//!
//! The coordinator thread installs a task and releases one worker per
//! logical processor through per-worker semaphores. A worker that finishes
//! the task launches its own successor on the same logical processor, so an
//! idle LP never waits on the coordinator for a handoff. When every worker
//! has counted down the finish latch, the round is over and the coordinator
//! may read the round reductions ([`WorkerPool::global_next_event_time`]).
//!
//! Because at most one worker runs on a logical processor at a time, the
//! per-LP state (ready/done queues, min-event-time slots) needs no
//! fine-grained locking; the latch and semaphores are the only
//! synchronization edges between rounds.

mod affinity;
mod config;
mod counters;
mod event;
mod latch;
mod lps;
mod manager;
mod pool;
mod scheduler;
mod semaphore;
mod task;
mod worker;

pub use affinity::{native_thread_id, NativeTid};
pub use config::{ConfigError, SimulationConfig};
pub use counters::{
    add_syscall_counts, global_alloc_counts, global_dealloc_counts, global_syscall_counts,
    increment_object_alloc_counter, increment_object_dealloc_counter, object_counting_enabled,
    set_object_counting,
};
pub use event::Event;
pub use latch::CountDownLatch;
pub use lps::LogicalProcessors;
pub use manager::Manager;
pub use pool::{PoolError, WorkerPool};
pub use scheduler::Scheduler;
pub use semaphore::Semaphore;
pub use task::Task;
pub use worker::Worker;
