//! Counting semaphore.

use parking_lot::{Condvar, Mutex};

/// A counting semaphore.
///
/// The pool keeps one per worker, initialized to zero, as the sole dispatch
/// primitive: a post releases exactly one round of work for exactly one
/// worker, and a worker between rounds is parked in [`wait`](Self::wait).
/// The post/wait pair is also the happens-before edge that publishes the
/// coordinator's (or the handing-off worker's) writes to the released
/// worker.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Add one permit, waking a waiter if any.
    pub fn post(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }

    /// Block until a permit is available, then consume it.
    pub fn wait(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }
}
