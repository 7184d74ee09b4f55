//! Vector clocks for causality tracking across devices (spec §4.7).
//!
//! Grounded on the `VectorClock` in the caddy pack's
//! `enterprise/realtime/crdt.rs`, generalized from the two boolean
//! predicates (`happens_before`/`is_concurrent`) to the four-way
//! [`Ordering`] the spec calls for.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::DeviceId;

/// Result of comparing two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ordering {
    Before,
    After,
    Equal,
    Concurrent,
}

/// A map device-id -> non-negative logical counter (spec §3 Vector Clock).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    components: BTreeMap<DeviceId, u64>,
}

impl VectorClock {
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
        }
    }

    pub fn get(&self, device_id: &str) -> u64 {
        self.components.get(device_id).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, device_id: &str) {
        *self.components.entry(device_id.to_string()).or_insert(0) += 1;
    }

    /// Component-wise max. Merge is commutative, associative, and idempotent
    /// (spec §8 round-trip properties).
    pub fn merge(&mut self, other: &VectorClock) {
        for (device, &value) in &other.components {
            let entry = self.components.entry(device.clone()).or_insert(0);
            *entry = (*entry).max(value);
        }
    }

    pub fn merged(mut self, other: &VectorClock) -> Self {
        self.merge(other);
        self
    }

    /// `a <= b` iff every component of `a` is `<=` the same component of
    /// `b`.
    fn le(&self, other: &VectorClock) -> bool {
        let mut devices: Vec<&String> = self.components.keys().collect();
        devices.extend(other.components.keys());
        devices.sort();
        devices.dedup();
        devices
            .into_iter()
            .all(|device| self.get(device) <= other.get(device))
    }

    /// Compare two clocks for causal ordering (spec §3/§4.7).
    pub fn compare(&self, other: &VectorClock) -> Ordering {
        let le = self.le(other);
        let ge = other.le(self);
        match (le, ge) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Before,
            (false, true) => Ordering::After,
            (false, false) => Ordering::Concurrent,
        }
    }

    pub fn is_concurrent_with(&self, other: &VectorClock) -> bool {
        matches!(self.compare(other), Ordering::Concurrent)
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

impl FromIterator<(DeviceId, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (DeviceId, u64)>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

/// Used internally by `compare` only for documentation of intent; kept so the
/// public API reads in terms of `std::cmp` vocabulary where it's a drop-in
/// (total order is NOT guaranteed, callers must still handle `Concurrent`).
impl VectorClock {
    pub fn partial_cmp_causal(&self, other: &VectorClock) -> Option<CmpOrdering> {
        match self.compare(other) {
            Ordering::Before => Some(CmpOrdering::Less),
            Ordering::After => Some(CmpOrdering::Greater),
            Ordering::Equal => Some(CmpOrdering::Equal),
            Ordering::Concurrent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_clocks_are_equal() {
        assert_eq!(VectorClock::new().compare(&VectorClock::new()), Ordering::Equal);
    }

    #[test]
    fn increment_establishes_before_after() {
        let mut a = VectorClock::new();
        a.increment("d1");
        let b = VectorClock::new();
        assert_eq!(a.compare(&b), Ordering::After);
        assert_eq!(b.compare(&a), Ordering::Before);
    }

    #[test]
    fn independent_increments_are_concurrent() {
        let mut a = VectorClock::new();
        a.increment("d1");
        let mut b = VectorClock::new();
        b.increment("d2");
        assert_eq!(a.compare(&b), Ordering::Concurrent);
        assert!(a.is_concurrent_with(&b));
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let mut a = VectorClock::new();
        a.increment("d1");
        a.increment("d1");
        let mut b = VectorClock::new();
        b.increment("d2");

        let ab = a.clone().merged(&b);
        let ba = b.clone().merged(&a);
        assert_eq!(ab, ba);

        let ab_again = ab.clone().merged(&b);
        assert_eq!(ab, ab_again, "merge must be idempotent");

        let mut c = VectorClock::new();
        c.increment("d3");
        let ab_c = ab.clone().merged(&c);
        let a_bc = a.clone().merged(&b.clone().merged(&c));
        assert_eq!(ab_c, a_bc, "merge must be associative");
    }

    #[test]
    fn scenario_clean_pull_from_spec() {
        // D1 at {D1:5, D2:0}, D2 at {D1:0, D2:3}; after pulling D2's events,
        // D1's clock becomes {D1:5, D2:3} (spec §8 scenario 5).
        let mut d1 = VectorClock::new();
        for _ in 0..5 {
            d1.increment("D1");
        }
        let mut d2 = VectorClock::new();
        for _ in 0..3 {
            d2.increment("D2");
        }
        d1.merge(&d2);
        assert_eq!(d1.get("D1"), 5);
        assert_eq!(d1.get("D2"), 3);
    }
}
