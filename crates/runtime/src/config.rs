//! Simulation configuration.

use meshsim_types::SimulationTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("workers must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("parallelism must be at least 1, got {0}")]
    InvalidParallelism(usize),
}

/// Options recognized by the simulator runtime.
///
/// `parallelism` bounds the number of logical processors; the effective LP
/// count is `min(parallelism, workers)` since it never makes sense to use
/// more logical processors than workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of worker threads.
    pub workers: usize,

    /// Upper bound on the number of logical processors.
    pub parallelism: usize,

    /// Record per-worker object allocation/deallocation tallies.
    /// When false, the per-worker counters are never created and
    /// increments are suppressed.
    pub use_object_counters: bool,

    /// Pin worker threads to the CPUs backing their logical processors.
    /// Advisory: platforms without affinity support degrade to a no-op.
    pub use_cpu_pinning: bool,

    /// End of the bootstrap phase, in seconds of simulated time. While
    /// bootstrap is active, packet drops due to path reliability are
    /// suppressed.
    pub bootstrap_end_secs: u64,

    /// Simulated time at which the run stops, in seconds.
    pub stop_secs: u64,

    /// Seed for all deterministic random streams (host RNGs).
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            parallelism: 1,
            use_object_counters: true,
            use_cpu_pinning: true,
            bootstrap_end_secs: 0,
            stop_secs: 60,
            seed: 1,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.workers));
        }
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidParallelism(self.parallelism));
        }
        Ok(())
    }

    pub fn bootstrap_end_time(&self) -> SimulationTime {
        SimulationTime::from_secs(self.bootstrap_end_secs)
    }

    pub fn stop_time(&self) -> SimulationTime {
        SimulationTime::from_secs(self.stop_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.parallelism, 1);
        assert!(config.use_object_counters);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SimulationConfig {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidWorkerCount(0)));
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let config = SimulationConfig {
            parallelism: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidParallelism(0)));
    }

    #[test]
    fn test_time_conversions() {
        let config = SimulationConfig {
            bootstrap_end_secs: 30,
            stop_secs: 120,
            ..Default::default()
        };
        assert_eq!(config.bootstrap_end_time(), SimulationTime::from_secs(30));
        assert_eq!(config.stop_time(), SimulationTime::from_secs(120));
    }
}
