//! Scheduled events.

use crate::Task;
use meshsim_types::{HostId, SimulationTime};
use std::cmp::Ordering;

/// A task bound to a simulated time and a destination host.
///
/// Events are ordered by `(time, sequence)`. The sequence number is
/// assigned by the scheduler at push, so events pushed at the same
/// simulated time execute in push order, the deterministic FIFO tie-break
/// the rest of the event queue machinery relies on.
#[derive(Debug, Clone)]
pub struct Event {
    time: SimulationTime,
    sequence: u64,
    source: HostId,
    destination: HostId,
    task: Task,
}

impl Event {
    pub fn new(task: Task, time: SimulationTime, source: HostId, destination: HostId) -> Self {
        assert!(time.is_valid(), "event scheduled at invalid time");
        Self {
            time,
            sequence: 0,
            source,
            destination,
            task,
        }
    }

    pub fn time(&self) -> SimulationTime {
        self.time
    }

    pub fn source(&self) -> HostId {
        self.source
    }

    pub fn destination(&self) -> HostId {
        self.destination
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.sequence.cmp(&other.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time_ns: u64, sequence: u64) -> Event {
        let mut e = Event::new(
            Task::new("noop", |_, _| {}),
            SimulationTime::from_nanos(time_ns),
            HostId(0),
            HostId(1),
        );
        e.set_sequence(sequence);
        e
    }

    #[test]
    fn test_ordered_by_time_first() {
        assert!(event(100, 5) < event(200, 1));
    }

    #[test]
    fn test_sequence_breaks_time_ties() {
        assert!(event(100, 1) < event(100, 2));
    }

    #[test]
    #[should_panic(expected = "invalid time")]
    fn test_invalid_time_rejected() {
        Event::new(
            Task::new("noop", |_, _| {}),
            SimulationTime::INVALID,
            HostId(0),
            HostId(0),
        );
    }
}
