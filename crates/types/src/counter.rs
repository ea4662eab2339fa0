//! Named tally counters.
//!
//! Workers keep one [`Counter`] per accounting domain (object allocations,
//! object deallocations, syscalls) and hand them to the manager at shutdown,
//! which merges them into process-wide totals.

use std::collections::BTreeMap;
use std::fmt;

/// An ordered map of `name → count`.
///
/// Backed by a `BTreeMap` so iteration and [`Display`](fmt::Display) output
/// are deterministic, which keeps end-of-run reports diffable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counter {
    values: BTreeMap<String, u64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` to the tally for `name`, creating it at zero if absent.
    pub fn add_value(&mut self, name: &str, n: u64) {
        *self.values.entry(name.to_owned()).or_insert(0) += n;
    }

    /// Merge every tally from `other` into this counter.
    pub fn add_counter(&mut self, other: &Counter) {
        for (name, n) in &other.values {
            *self.values.entry(name.clone()).or_insert(0) += n;
        }
    }

    /// The tally for `name`, zero if never recorded.
    pub fn get(&self, name: &str) -> u64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    /// Sum over all tallies.
    pub fn total(&self) -> u64 {
        self.values.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, n)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {n}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_value_accumulates() {
        let mut c = Counter::new();
        c.add_value("packet", 1);
        c.add_value("packet", 2);
        c.add_value("event", 1);
        assert_eq!(c.get("packet"), 3);
        assert_eq!(c.get("event"), 1);
        assert_eq!(c.get("never"), 0);
        assert_eq!(c.total(), 4);
    }

    #[test]
    fn test_add_counter_merges() {
        let mut a = Counter::new();
        a.add_value("x", 1);
        a.add_value("y", 2);

        let mut b = Counter::new();
        b.add_value("y", 3);
        b.add_value("z", 4);

        a.add_counter(&b);
        assert_eq!(a.get("x"), 1);
        assert_eq!(a.get("y"), 5);
        assert_eq!(a.get("z"), 4);
        // b is unchanged
        assert_eq!(b.get("y"), 3);
    }

    #[test]
    fn test_display_is_sorted() {
        let mut c = Counter::new();
        c.add_value("zebra", 1);
        c.add_value("alpha", 2);
        assert_eq!(c.to_string(), "{alpha: 2, zebra: 1}");
    }
}
