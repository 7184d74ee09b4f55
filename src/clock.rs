//! Monotonic wall-clock port.
//!
//! Events carry both `occurred_at` (caller-observed time) and `stored_at`
//! (assigned at append). Both come from a `Clock` so tests can substitute a
//! deterministic implementation instead of `Utc::now`.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
