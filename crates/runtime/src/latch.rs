//! Reusable count-down latch.

use parking_lot::{Condvar, Mutex};

/// A reusable barrier: initialized to N, counted down by participants,
/// awaited by a coordinator, then reset for the next round.
///
/// The worker pool uses one latch per pool to detect round completion:
/// every worker counts down once per round, the coordinator waits for zero,
/// resets, and dispatches the next round. Reset is only legal after a wait
/// has observed zero; the decrement-to-zero edge is what publishes all of a
/// round's writes to the coordinator.
#[derive(Debug)]
pub struct CountDownLatch {
    initial: usize,
    remaining: Mutex<usize>,
    zeroed: Condvar,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            initial: count,
            remaining: Mutex::new(count),
            zeroed: Condvar::new(),
        }
    }

    /// Decrement the latch. The decrement that reaches zero wakes all
    /// waiters.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        assert!(*remaining > 0, "count_down below zero");
        *remaining -= 1;
        if *remaining == 0 {
            self.zeroed.notify_all();
        }
    }

    /// Block until the latch reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zeroed.wait(&mut remaining);
        }
    }

    /// Restore the initial count. Only legal once the latch has reached
    /// zero and every waiter has returned.
    pub fn reset(&self) {
        let mut remaining = self.remaining.lock();
        assert!(*remaining == 0, "reset of a latch that has not reached zero");
        *remaining = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_single_thread_round_trip() {
        let latch = CountDownLatch::new(2);
        latch.count_down();
        latch.count_down();
        latch.wait(); // already zero, returns immediately
        latch.reset();
        latch.count_down();
        latch.count_down();
        latch.wait();
    }

    #[test]
    fn test_wait_blocks_until_zero() {
        let latch = Arc::new(CountDownLatch::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let latch = Arc::clone(&latch);
            handles.push(thread::spawn(move || latch.count_down()));
        }
        latch.wait();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_reusable_across_rounds() {
        let latch = Arc::new(CountDownLatch::new(2));
        for _ in 0..10 {
            let a = Arc::clone(&latch);
            let b = Arc::clone(&latch);
            let ha = thread::spawn(move || a.count_down());
            let hb = thread::spawn(move || b.count_down());
            latch.wait();
            latch.reset();
            ha.join().unwrap();
            hb.join().unwrap();
        }
    }

    #[test]
    #[should_panic(expected = "reset of a latch")]
    fn test_reset_before_zero_panics() {
        let latch = CountDownLatch::new(2);
        latch.count_down();
        latch.reset();
    }

    #[test]
    #[should_panic(expected = "count_down below zero")]
    fn test_count_down_below_zero_panics() {
        let latch = CountDownLatch::new(1);
        latch.count_down();
        latch.count_down();
    }
}
