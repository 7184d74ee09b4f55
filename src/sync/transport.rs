//! The peer transport port. A host supplies a real implementation (HTTP,
//! QUIC, whatever moves bytes between devices); this crate only defines the
//! shape and an in-memory double for its own tests, mirroring how the
//! teacher's event store port stays storage-agnostic.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ScopesError, ScopesResult};
use crate::event_log::{EventStore, NewEvent, StoredEvent};
use crate::vector_clock::VectorClock;

#[derive(Debug, Clone)]
pub struct PushAck {
    pub acked_count: usize,
    pub remote_vector_clock: VectorClock,
}

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Hand `batch` to the peer identified by `peer_device_id`.
    async fn push(&self, peer_device_id: &str, batch: Vec<StoredEvent>) -> ScopesResult<PushAck>;

    /// Fetch events the peer has stored since `since_sequence` (the peer's
    /// own global sequence numbering, opaque to the caller beyond ordering).
    async fn pull(&self, peer_device_id: &str, since_sequence: u64) -> ScopesResult<Vec<StoredEvent>>;
}

/// Test double standing in for a remote peer: an `EventStore` the test owns
/// directly, so assertions can inspect what the "other side" received.
pub struct InMemoryPeerTransport {
    remote_log: Arc<dyn EventStore>,
}

impl InMemoryPeerTransport {
    pub fn new(remote_log: Arc<dyn EventStore>) -> Self {
        Self { remote_log }
    }
}

#[async_trait]
impl PeerTransport for InMemoryPeerTransport {
    async fn push(&self, _peer_device_id: &str, batch: Vec<StoredEvent>) -> ScopesResult<PushAck> {
        let mut remote_vector_clock = VectorClock::new();
        for event in &batch {
            let expected = self.remote_log.latest_version(event.aggregate_id).await? + 1;
            let new_event = NewEvent {
                event_id: event.event_id,
                aggregate_id: event.aggregate_id,
                event_type_id: event.event_type_id.clone(),
                payload: event.payload.clone(),
                occurred_at: event.occurred_at,
                stored_at: event.stored_at,
                origin_device_id: event.origin_device_id.clone(),
                vector_clock: event.vector_clock.clone(),
            };
            match self.remote_log.append(new_event, expected).await {
                Ok(_) | Err(ScopesError::DuplicateEvent { .. }) => {}
                Err(other) => return Err(other),
            }
            remote_vector_clock.merge(&event.vector_clock);
        }
        Ok(PushAck {
            acked_count: batch.len(),
            remote_vector_clock,
        })
    }

    async fn pull(&self, _peer_device_id: &str, since_sequence: u64) -> ScopesResult<Vec<StoredEvent>> {
        self.remote_log.events_since(since_sequence, None).await
    }
}
