//! Simulation and emulated clocks.
//!
//! All simulator time is a count of nanoseconds since the simulation
//! started, carried in [`SimulationTime`]. Two sentinel values are reserved
//! at the top of the range: [`SimulationTime::MAX`] means "no event" (used
//! by the per-round minimum reductions) and [`SimulationTime::INVALID`]
//! means "not currently inside an event".
//!
//! [`EmulatedTime`] is the clock exposed to simulated applications: the same
//! nanosecond count shifted so that t=0 lands on January 1st, 2000. Code
//! that hands wall-clock time back to applications must use it, so that
//! software assuming a reasonably recent date keeps working.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Offset added to [`SimulationTime`] to produce [`EmulatedTime`]:
/// 2000-01-01T00:00:00Z expressed in nanoseconds since the Unix epoch.
pub const EMULATED_TIME_OFFSET: u64 = 946_684_800 * SimulationTime::SECOND;

/// Monotonic simulation clock, in nanoseconds since simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimulationTime(pub u64);

impl SimulationTime {
    /// One nanosecond, the base unit.
    pub const NANOSECOND: u64 = 1;
    /// One microsecond in nanoseconds.
    pub const MICROSECOND: u64 = 1_000;
    /// One millisecond in nanoseconds.
    pub const MILLISECOND: u64 = 1_000_000;
    /// One second in nanoseconds.
    pub const SECOND: u64 = 1_000_000_000;

    /// Sentinel meaning "no event". Larger than any schedulable time.
    pub const MAX: SimulationTime = SimulationTime(u64::MAX - 1);
    /// Sentinel meaning "outside an event". Never a schedulable time.
    pub const INVALID: SimulationTime = SimulationTime(u64::MAX);

    /// Simulation start.
    pub const ZERO: SimulationTime = SimulationTime(0);

    pub const fn from_nanos(ns: u64) -> Self {
        SimulationTime(ns)
    }

    pub const fn from_millis(ms: u64) -> Self {
        SimulationTime(ms * Self::MILLISECOND)
    }

    pub const fn from_secs(s: u64) -> Self {
        SimulationTime(s * Self::SECOND)
    }

    /// Convert a floating-point latency in milliseconds to a simulation
    /// delay, rounding up so sub-nanosecond latencies still advance time.
    pub fn from_latency_ms(latency_ms: f64) -> Self {
        SimulationTime((latency_ms * Self::MILLISECOND as f64).ceil() as u64)
    }

    /// True for any value other than the [`INVALID`](Self::INVALID) sentinel.
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    pub const fn nanos(self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, rhs: SimulationTime) -> Self {
        SimulationTime(self.0.saturating_add(rhs.0))
    }

    pub fn checked_add(self, rhs: SimulationTime) -> Option<Self> {
        self.0.checked_add(rhs.0).map(SimulationTime)
    }
}

impl Add for SimulationTime {
    type Output = SimulationTime;

    fn add(self, rhs: SimulationTime) -> SimulationTime {
        SimulationTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimulationTime {
    fn add_assign(&mut self, rhs: SimulationTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimulationTime {
    type Output = SimulationTime;

    fn sub(self, rhs: SimulationTime) -> SimulationTime {
        SimulationTime(self.0 - rhs.0)
    }
}

impl fmt::Display for SimulationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "<invalid>")
        } else if *self == Self::MAX {
            write!(f, "<none>")
        } else {
            write!(f, "{}.{:09}s", self.0 / Self::SECOND, self.0 % Self::SECOND)
        }
    }
}

/// Clock exposed to simulated applications: [`SimulationTime`] shifted so
/// that simulation start corresponds to January 1st, 2000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmulatedTime(pub u64);

impl EmulatedTime {
    pub fn from_simulation_time(time: SimulationTime) -> Self {
        EmulatedTime(time.0 + EMULATED_TIME_OFFSET)
    }

    pub const fn nanos(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EmulatedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:09}s",
            self.0 / SimulationTime::SECOND,
            self.0 % SimulationTime::SECOND
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_constants() {
        assert_eq!(SimulationTime::MICROSECOND, 1_000);
        assert_eq!(SimulationTime::MILLISECOND, 1_000_000);
        assert_eq!(SimulationTime::SECOND, 1_000_000_000);
        assert_eq!(SimulationTime::from_secs(2).nanos(), 2_000_000_000);
        assert_eq!(SimulationTime::from_millis(5).nanos(), 5_000_000);
    }

    #[test]
    fn test_sentinels_are_distinct_and_ordered() {
        assert!(SimulationTime::MAX < SimulationTime::INVALID);
        assert!(SimulationTime::from_secs(1_000_000) < SimulationTime::MAX);
        assert!(!SimulationTime::INVALID.is_valid());
        assert!(SimulationTime::MAX.is_valid());
        assert!(SimulationTime::ZERO.is_valid());
    }

    #[test]
    fn test_latency_ms_conversion_rounds_up() {
        // 5ms => exactly 5,000,000 ns
        assert_eq!(
            SimulationTime::from_latency_ms(5.0),
            SimulationTime::from_nanos(5_000_000)
        );
        // Fractional nanoseconds round up
        assert_eq!(
            SimulationTime::from_latency_ms(0.0000015),
            SimulationTime::from_nanos(2)
        );
        assert_eq!(SimulationTime::from_latency_ms(0.0), SimulationTime::ZERO);
    }

    #[test]
    fn test_emulated_time_offset() {
        let t = SimulationTime::from_secs(10);
        let e = EmulatedTime::from_simulation_time(t);
        assert_eq!(e.nanos(), 946_684_810 * SimulationTime::SECOND);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SimulationTime::from_nanos(1_500_000_000).to_string(),
            "1.500000000s"
        );
        assert_eq!(SimulationTime::INVALID.to_string(), "<invalid>");
        assert_eq!(SimulationTime::MAX.to_string(), "<none>");
    }
}
