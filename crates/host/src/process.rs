//! Simulated application processes.

use std::sync::atomic::{AtomicBool, Ordering};

/// A simulated application running on a host.
///
/// The process model is deliberately thin: a name and a running flag. The
/// interesting lifecycle (when processes start relative to boot, and that
/// every process is stopped before its host shuts down) belongs to
/// [`Host`](crate::Host).
#[derive(Debug)]
pub struct Process {
    name: String,
    running: AtomicBool,
}

impl Process {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            running: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let p = Process::new("oniond");
        assert_eq!(p.name(), "oniond");
        assert!(!p.is_running());
        p.start();
        assert!(p.is_running());
        p.stop();
        assert!(!p.is_running());
    }
}
