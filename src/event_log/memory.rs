//! In-memory reference `EventStore`, used by the crate's own tests and by
//! any host that doesn't need durability (spec §9 Design Notes:
//! "Tests substitute an in-memory event log").

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::domain::{EventId, ScopeId};
use crate::error::{ScopesError, ScopesResult};

use super::{EventStore, HealthSignal, NewEvent, StoredEvent};

const BROADCAST_CAPACITY: usize = 4096;

struct Inner {
    events: Vec<StoredEvent>,
    aggregate_versions: HashMap<ScopeId, u64>,
    known_event_ids: HashSet<EventId>,
    next_sequence: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            aggregate_versions: HashMap::new(),
            known_event_ids: HashSet::new(),
            next_sequence: 1,
        }
    }
}

pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
    sender: broadcast::Sender<StoredEvent>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Mutex::new(Inner::new()),
            sender,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        event: NewEvent,
        expected_aggregate_version: u64,
    ) -> ScopesResult<StoredEvent> {
        // The whole check-and-insert runs under one lock, matching the
        // spec's "single serializable transaction" guarantee for append.
        let mut inner = self.inner.lock();

        if inner.known_event_ids.contains(&event.event_id) {
            return Err(ScopesError::DuplicateEvent {
                event_id: event.event_id.to_string(),
            });
        }

        let current_version = inner
            .aggregate_versions
            .get(&event.aggregate_id)
            .copied()
            .unwrap_or(0);
        let expected_next = current_version + 1;
        if expected_aggregate_version != expected_next {
            return Err(ScopesError::VersionConflict {
                aggregate_id: event.aggregate_id,
                expected: expected_next,
                actual: expected_aggregate_version,
            });
        }

        if event.stored_at < event.occurred_at {
            return Err(ScopesError::OrderingViolation {
                message: "stored_at must not precede occurred_at".to_string(),
            });
        }

        let sequence_number = inner.next_sequence;
        inner.next_sequence += 1;

        let stored = StoredEvent {
            event_id: event.event_id,
            aggregate_id: event.aggregate_id,
            aggregate_version: expected_next,
            event_type_id: event.event_type_id,
            payload: event.payload,
            occurred_at: event.occurred_at,
            stored_at: event.stored_at,
            sequence_number,
            origin_device_id: event.origin_device_id,
            vector_clock: event.vector_clock,
        };

        inner.known_event_ids.insert(stored.event_id);
        inner
            .aggregate_versions
            .insert(stored.aggregate_id, expected_next);
        inner.events.push(stored.clone());

        // Broadcast after releasing nothing extra — subscribers only ever
        // see events that are already durably appended.
        let _ = self.sender.send(stored.clone());

        Ok(stored)
    }

    async fn events_by_aggregate(
        &self,
        aggregate_id: ScopeId,
        since_version: Option<u64>,
        limit: Option<usize>,
    ) -> ScopesResult<Vec<StoredEvent>> {
        let inner = self.inner.lock();
        let since = since_version.unwrap_or(0);
        let mut result: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.aggregate_version > since)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.aggregate_version);
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn events_since(
        &self,
        global_cursor: u64,
        limit: Option<usize>,
    ) -> ScopesResult<Vec<StoredEvent>> {
        let inner = self.inner.lock();
        let mut result: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.sequence_number > global_cursor)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.sequence_number);
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn events_by_type(
        &self,
        type_id: &str,
        since: Option<u64>,
        limit: Option<usize>,
    ) -> ScopesResult<Vec<StoredEvent>> {
        let inner = self.inner.lock();
        let since = since.unwrap_or(0);
        let mut result: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.event_type_id == type_id && e.sequence_number > since)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.sequence_number);
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn events_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ScopesResult<Vec<StoredEvent>> {
        let inner = self.inner.lock();
        let mut result: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.occurred_at >= from && e.occurred_at <= to)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.sequence_number);
        Ok(result)
    }

    async fn latest_version(&self, aggregate_id: ScopeId) -> ScopesResult<u64> {
        let inner = self.inner.lock();
        Ok(inner
            .aggregate_versions
            .get(&aggregate_id)
            .copied()
            .unwrap_or(0))
    }

    async fn event_count(&self, aggregate_id: ScopeId) -> ScopesResult<u64> {
        let inner = self.inner.lock();
        Ok(inner
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .count() as u64)
    }

    async fn health(&self) -> HealthSignal {
        // The in-memory store never deserializes bytes, so it can never
        // encounter a corrupted payload or an unknown event type on read;
        // both only arise in a durable backend. Always healthy by
        // construction.
        HealthSignal::default()
    }

    fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{IdGenerator, UlidGenerator};
    use crate::vector_clock::VectorClock;

    fn sample_event(aggregate_id: ScopeId, occurred_at: DateTime<Utc>) -> NewEvent {
        NewEvent {
            event_id: UlidGenerator.generate(),
            aggregate_id,
            event_type_id: "scope.created.v1".to_string(),
            payload: serde_json::json!({ "title": "Tasks" }),
            occurred_at,
            stored_at: occurred_at,
            origin_device_id: "device-a".to_string(),
            vector_clock: VectorClock::new(),
        }
    }

    #[tokio::test]
    async fn append_requires_version_one_for_new_aggregate() {
        let store = InMemoryEventStore::new();
        let aggregate_id = UlidGenerator.generate();
        let now = Utc::now();

        let err = store
            .append(sample_event(aggregate_id, now), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ScopesError::VersionConflict { expected: 1, .. }));

        let stored = store.append(sample_event(aggregate_id, now), 1).await.unwrap();
        assert_eq!(stored.aggregate_version, 1);
    }

    #[tokio::test]
    async fn versions_are_dense_and_sequence_numbers_increase() {
        let store = InMemoryEventStore::new();
        let aggregate_id = UlidGenerator.generate();
        let now = Utc::now();

        for expected in 1..=5u64 {
            let stored = store
                .append(sample_event(aggregate_id, now), expected)
                .await
                .unwrap();
            assert_eq!(stored.aggregate_version, expected);
        }

        let events = store
            .events_by_aggregate(aggregate_id, None, None)
            .await
            .unwrap();
        let versions: Vec<u64> = events.iter().map(|e| e.aggregate_version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);

        let seqs: Vec<u64> = events.iter().map(|e| e.sequence_number).collect();
        let mut sorted = seqs.clone();
        sorted.sort();
        assert_eq!(seqs, sorted);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn duplicate_event_id_is_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = UlidGenerator.generate();
        let now = Utc::now();
        let event = sample_event(aggregate_id, now);
        let duplicate = NewEvent {
            event_id: event.event_id,
            ..sample_event(aggregate_id, now)
        };

        store.append(event, 1).await.unwrap();
        let err = store.append(duplicate, 2).await.unwrap_err();
        assert!(matches!(err, ScopesError::DuplicateEvent { .. }));
    }

    #[tokio::test]
    async fn concurrent_appends_to_same_aggregate_only_one_commits() {
        let store = std::sync::Arc::new(InMemoryEventStore::new());
        let aggregate_id = UlidGenerator.generate();
        let now = Utc::now();
        store
            .append(sample_event(aggregate_id, now), 1)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(sample_event(aggregate_id, now), 2).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1, "exactly one concurrent append at the same expected version should commit");
    }

    #[tokio::test]
    async fn events_since_orders_by_sequence_number() {
        let store = InMemoryEventStore::new();
        let a = UlidGenerator.generate();
        let b = UlidGenerator.generate();
        let now = Utc::now();
        store.append(sample_event(a, now), 1).await.unwrap();
        store.append(sample_event(b, now), 1).await.unwrap();
        store.append(sample_event(a, now), 2).await.unwrap();

        let events = store.events_since(0, None).await.unwrap();
        assert_eq!(events.len(), 3);
        let seqs: Vec<u64> = events.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn subscribers_observe_appended_events() {
        let store = InMemoryEventStore::new();
        let mut receiver = store.subscribe();
        let aggregate_id = UlidGenerator.generate();
        store
            .append(sample_event(aggregate_id, Utc::now()), 1)
            .await
            .unwrap();

        let observed = receiver.recv().await.unwrap();
        assert_eq!(observed.aggregate_id, aggregate_id);
    }

    #[tokio::test]
    async fn stored_at_preceding_occurred_at_is_an_ordering_violation() {
        let store = InMemoryEventStore::new();
        let aggregate_id = UlidGenerator.generate();
        let occurred_at = Utc::now();
        let mut event = sample_event(aggregate_id, occurred_at);
        event.stored_at = occurred_at - chrono::Duration::seconds(5);

        let err = store.append(event, 1).await.unwrap_err();
        assert!(matches!(err, ScopesError::OrderingViolation { .. }));
    }
}
