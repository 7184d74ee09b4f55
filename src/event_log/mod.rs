//! The Event Log: an append-only, persisted sequence of domain events with
//! sequence numbers, aggregate versioning, and type-stable identifiers
//! (spec §4.1).

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EventId, ScopeId};
use crate::error::ScopesResult;
use crate::vector_clock::VectorClock;

pub use memory::InMemoryEventStore;

/// A domain event as it exists once committed to the log (spec §3 Event,
/// §6 persisted form).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub aggregate_id: ScopeId,
    pub aggregate_version: u64,
    pub event_type_id: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
    pub sequence_number: u64,
    pub origin_device_id: String,
    pub vector_clock: VectorClock,
}

/// What the caller supplies to append one event; the log fills in
/// `sequence_number` and validates `stored_at` is not earlier than
/// `occurred_at`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_id: EventId,
    pub aggregate_id: ScopeId,
    pub event_type_id: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    /// Supplied by the caller's injected [`Clock`](crate::clock::Clock), not
    /// computed inside the store — lets tests substitute a deterministic
    /// clock to exercise ordering violations.
    pub stored_at: DateTime<Utc>,
    pub origin_device_id: String,
    /// The origin device's vector clock *after* incrementing its own
    /// component for this event (spec §4.1 algorithm).
    pub vector_clock: VectorClock,
}

/// Counts of records skipped on read paths due to integrity failures —
/// surfaced instead of silently masking data loss (spec §7 propagation
/// policy, §4.1 failure semantics).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HealthSignal {
    pub skipped_corrupted_payloads: u64,
    pub skipped_unknown_event_types: u64,
}

impl HealthSignal {
    pub fn total_skipped(&self) -> u64 {
        self.skipped_corrupted_payloads + self.skipped_unknown_event_types
    }
}

/// The event store port (spec §4.1 operations, §6 "Persisted state layout").
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `event` if `expected_aggregate_version` matches the current
    /// state of the aggregate (1 for a brand-new aggregate, otherwise
    /// current max version + 1). Assigns a fresh, globally monotonic
    /// sequence number inside the same logical transaction.
    async fn append(
        &self,
        event: NewEvent,
        expected_aggregate_version: u64,
    ) -> ScopesResult<StoredEvent>;

    async fn events_by_aggregate(
        &self,
        aggregate_id: ScopeId,
        since_version: Option<u64>,
        limit: Option<usize>,
    ) -> ScopesResult<Vec<StoredEvent>>;

    async fn events_since(
        &self,
        global_cursor: u64,
        limit: Option<usize>,
    ) -> ScopesResult<Vec<StoredEvent>>;

    async fn events_by_type(
        &self,
        type_id: &str,
        since: Option<u64>,
        limit: Option<usize>,
    ) -> ScopesResult<Vec<StoredEvent>>;

    async fn events_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ScopesResult<Vec<StoredEvent>>;

    async fn latest_version(&self, aggregate_id: ScopeId) -> ScopesResult<u64>;

    async fn event_count(&self, aggregate_id: ScopeId) -> ScopesResult<u64>;

    /// Current health signal accumulated by read-path skips.
    async fn health(&self) -> HealthSignal;

    /// Subscribe to events as they are appended — the "lazy sequence" of
    /// spec §4.1's `stream()`, used by the projection and sync subscribers.
    /// The returned receiver is finite only when the store (and thus the
    /// sending half) is dropped at shutdown.
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StoredEvent>;
}
