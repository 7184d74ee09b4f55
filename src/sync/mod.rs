//! Sync Engine: per-peer push/pull with vector-clock conflict detection and
//! pluggable resolution strategies (spec §4.8). Grounded on the state
//! machine, pending-batch handling, and notification channel in
//! `harborgrid-justin-caddy`'s `enterprise/collaboration/sync_engine.rs`,
//! generalized from CRDT document operations to event batches. The device
//! registry and `register-document`/`unregister-document` shape (spec §6
//! `register-device`/`unregister`) are grounded on the same file's
//! `SyncEngine::register_document`/`unregister_document`.

pub mod conflict;
pub mod device;
pub mod transport;

pub use conflict::{Conflict, ConflictKind, ConflictStrategy};
pub use device::{DeviceSyncState, SyncState};
pub use transport::{InMemoryPeerTransport, PeerTransport, PushAck};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::clock::Clock;
use crate::config::Config;
use crate::domain::{validate_device_id, DeviceId, EventId};
use crate::error::{ScopesError, ScopesResult};
use crate::event_log::{EventStore, NewEvent, StoredEvent};
use crate::id::IdGenerator;
use crate::projection::ProjectionStore;
use crate::vector_clock::VectorClock;

/// Notifications a host can drive a UI or a log line from, without polling
/// (ambient addition over the distilled spec, in the teacher's
/// `SyncEvent`-channel idiom).
#[derive(Debug, Clone)]
pub enum SyncEvent {
    StateChanged { device_id: DeviceId, state: SyncState },
    BatchPushed { device_id: DeviceId, count: usize },
    BatchPulled { device_id: DeviceId, applied: usize },
    ConflictDetected(Conflict),
    Failed { device_id: DeviceId, error: String },
}

/// A conflict that could not be resolved on detection (`MissingDependency`,
/// or `Manual` awaiting a caller decision), kept alongside the remote event
/// it was raised against so a later `resolve_conflict` call has everything
/// it needs to retry resolution.
struct PendingConflict {
    conflict: Conflict,
    remote: StoredEvent,
}

pub struct SyncEngine {
    local_device_id: DeviceId,
    config: Config,
    id_gen: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    event_log: Arc<dyn EventStore>,
    projections: Arc<ProjectionStore>,
    transport: Arc<dyn PeerTransport>,
    devices: Mutex<HashMap<DeviceId, DeviceSyncState>>,
    conflicts: Mutex<HashMap<EventId, PendingConflict>>,
    local_vector_clock: Mutex<VectorClock>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        local_device_id: DeviceId,
        config: Config,
        id_gen: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        event_log: Arc<dyn EventStore>,
        projections: Arc<ProjectionStore>,
        transport: Arc<dyn PeerTransport>,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let engine = Self {
            local_device_id,
            config,
            id_gen,
            clock,
            event_log,
            projections,
            transport,
            devices: Mutex::new(HashMap::new()),
            conflicts: Mutex::new(HashMap::new()),
            local_vector_clock: Mutex::new(VectorClock::new()),
            event_tx,
        };
        (engine, event_rx)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }

    fn set_state(&self, peer_device_id: &str, state: SyncState) {
        let mut devices = self.devices.lock();
        let entry = devices
            .entry(peer_device_id.to_string())
            .or_insert_with(|| DeviceSyncState::new(peer_device_id.to_string()));
        entry.sync_status = state;
        drop(devices);
        self.emit(SyncEvent::StateChanged {
            device_id: peer_device_id.to_string(),
            state,
        });
    }

    fn require_registered(&self, peer_device_id: &str) -> ScopesResult<()> {
        if self.devices.lock().contains_key(peer_device_id) {
            Ok(())
        } else {
            Err(ScopesError::DeviceNotRegistered {
                device_id: peer_device_id.to_string(),
            })
        }
    }

    /// Register a peer device so `push`/`pull`/`sync` will operate against
    /// it (spec §6 `register-device(id)`). Idempotent — registering an
    /// already-known device is a no-op, not an error.
    pub fn register_device(&self, peer_device_id: &str) -> ScopesResult<()> {
        validate_device_id(peer_device_id).map_err(|reason| ScopesError::InvalidDeviceId {
            device_id: peer_device_id.to_string(),
            reason,
        })?;
        self.devices
            .lock()
            .entry(peer_device_id.to_string())
            .or_insert_with(|| DeviceSyncState::new(peer_device_id.to_string()));
        Ok(())
    }

    /// Drop a peer device's sync state and any conflicts still pending
    /// against it (spec §6 `unregister`).
    pub fn unregister_device(&self, peer_device_id: &str) -> ScopesResult<()> {
        if self.devices.lock().remove(peer_device_id).is_none() {
            return Err(ScopesError::DeviceNotRegistered {
                device_id: peer_device_id.to_string(),
            });
        }
        self.conflicts
            .lock()
            .retain(|_, pending| pending.conflict.device_id != peer_device_id);
        Ok(())
    }

    pub fn device_state(&self, peer_device_id: &str) -> Option<DeviceSyncState> {
        self.devices.lock().get(peer_device_id).cloned()
    }

    /// Conflicts still awaiting resolution for `peer_device_id` (spec §6
    /// `list-conflicts(device)`).
    pub fn list_conflicts(&self, peer_device_id: &str) -> Vec<Conflict> {
        self.conflicts
            .lock()
            .values()
            .filter(|pending| pending.conflict.device_id == peer_device_id)
            .map(|pending| pending.conflict.clone())
            .collect()
    }

    /// Re-attempt resolution of a previously detected, unresolved conflict
    /// under caller-supplied `action` (spec §6 `resolve-conflict(id,
    /// action)`) — the escalation path for a `Manual`-strategy conflict, and
    /// a retry path for one that was buffered as a missing dependency whose
    /// ancestors have since arrived.
    pub async fn resolve_conflict(
        &self,
        conflict_id: EventId,
        action: ConflictStrategy,
    ) -> ScopesResult<Conflict> {
        let pending = self
            .conflicts
            .lock()
            .remove(&conflict_id)
            .ok_or_else(|| ScopesError::ConflictNotFound {
                conflict_id: conflict_id.to_string(),
            })?;

        let device_id = pending.conflict.device_id.clone();
        let remote = pending.remote;
        let resolved = self.apply_resolution(pending.conflict, &remote, action).await?;
        self.emit(SyncEvent::ConflictDetected(resolved.clone()));

        if resolved.resolved {
            self.advance_cursor_past(&device_id, remote.sequence_number);
        } else {
            self.conflicts.lock().insert(
                resolved.id,
                PendingConflict {
                    conflict: resolved.clone(),
                    remote,
                },
            );
        }
        Ok(resolved)
    }

    /// Advance `device_id`'s pull cursor past `sequence_number` now that the
    /// conflict blocking it has resolved, unless an earlier conflict for the
    /// same device is still pending — the cursor may never pass the
    /// earliest unresolved event (fixes silent skip of buffered conflicts).
    fn advance_cursor_past(&self, device_id: &str, sequence_number: u64) {
        let earliest_remaining = self
            .conflicts
            .lock()
            .values()
            .filter(|pending| pending.conflict.device_id == device_id)
            .map(|pending| pending.remote.sequence_number)
            .min();
        let candidate = match earliest_remaining {
            Some(blocked_at) => sequence_number.min(blocked_at.saturating_sub(1)),
            None => sequence_number,
        };
        let mut devices = self.devices.lock();
        if let Some(state) = devices.get_mut(device_id) {
            state.pull_cursor = state.pull_cursor.max(candidate);
        }
    }

    /// Push every local event (origin = this device) not yet pushed to
    /// `peer_device_id`. Returns the number of events sent.
    pub async fn push(&self, peer_device_id: &str) -> ScopesResult<usize> {
        self.require_registered(peer_device_id)?;
        self.set_state(peer_device_id, SyncState::Pushing);

        let cursor = self
            .devices
            .lock()
            .get(peer_device_id)
            .map(|s| s.push_cursor)
            .unwrap_or(0);

        let candidates = self.event_log.events_since(cursor, None).await?;
        let batch: Vec<StoredEvent> = candidates
            .into_iter()
            .filter(|event| event.origin_device_id == self.local_device_id)
            .collect();

        if batch.is_empty() {
            self.set_state(peer_device_id, SyncState::Idle);
            return Ok(0);
        }

        let ack = match self.transport.push(peer_device_id, batch.clone()).await {
            Ok(ack) => ack,
            Err(err) => {
                self.set_state(peer_device_id, SyncState::Failed);
                self.emit(SyncEvent::Failed {
                    device_id: peer_device_id.to_string(),
                    error: err.to_string(),
                });
                return Err(err);
            }
        };

        let max_sequence = batch
            .iter()
            .map(|event| event.sequence_number)
            .max()
            .unwrap_or(cursor);
        {
            let mut devices = self.devices.lock();
            let state = devices
                .entry(peer_device_id.to_string())
                .or_insert_with(|| DeviceSyncState::new(peer_device_id.to_string()));
            state.push_cursor = max_sequence;
            state.last_push_at = Some(self.clock.now());
            state.remote_vector_clock.merge(&ack.remote_vector_clock);
        }

        self.emit(SyncEvent::BatchPushed {
            device_id: peer_device_id.to_string(),
            count: batch.len(),
        });
        self.set_state(peer_device_id, SyncState::Idle);
        Ok(batch.len())
    }

    /// Pull events from `peer_device_id` and apply everything that doesn't
    /// conflict; conflicts are detected, resolved per `strategy` where
    /// possible, and returned for the caller to inspect (manual-strategy and
    /// missing-dependency conflicts are returned unresolved and persisted so
    /// `resolve_conflict` can retry them later). The pull cursor only
    /// advances past events that were actually applied or resolved — an
    /// unresolved conflict is re-fetched on the next pull instead of being
    /// silently skipped.
    pub async fn pull(
        &self,
        peer_device_id: &str,
        strategy: ConflictStrategy,
    ) -> ScopesResult<Vec<Conflict>> {
        self.require_registered(peer_device_id)?;
        self.set_state(peer_device_id, SyncState::Pulling);

        let cursor = self
            .devices
            .lock()
            .get(peer_device_id)
            .map(|s| s.pull_cursor)
            .unwrap_or(0);

        let remote_events = match self.transport.pull(peer_device_id, cursor).await {
            Ok(events) => events,
            Err(err) => {
                self.set_state(peer_device_id, SyncState::Failed);
                self.emit(SyncEvent::Failed {
                    device_id: peer_device_id.to_string(),
                    error: err.to_string(),
                });
                return Err(err);
            }
        };

        let mut conflicts = Vec::new();
        let mut applied = 0usize;
        let mut highest_applied_sequence = cursor;
        let mut first_unresolved_sequence: Option<u64> = None;

        for remote in remote_events {
            let local_version = self.event_log.latest_version(remote.aggregate_id).await?;

            if remote.aggregate_version == local_version + 1 {
                let new_event = NewEvent {
                    event_id: remote.event_id,
                    aggregate_id: remote.aggregate_id,
                    event_type_id: remote.event_type_id.clone(),
                    payload: remote.payload.clone(),
                    occurred_at: remote.occurred_at,
                    stored_at: self.clock.now(),
                    origin_device_id: remote.origin_device_id.clone(),
                    vector_clock: remote.vector_clock.clone(),
                };
                match self
                    .event_log
                    .append(new_event, remote.aggregate_version)
                    .await
                {
                    Ok(stored) => {
                        self.projections.apply_event(&stored)?;
                        self.local_vector_clock.lock().merge(&stored.vector_clock);
                        applied += 1;
                        highest_applied_sequence =
                            highest_applied_sequence.max(remote.sequence_number);
                    }
                    // Already present locally — idempotent pull, spec §4.8 (a).
                    Err(ScopesError::DuplicateEvent { .. }) => {
                        highest_applied_sequence =
                            highest_applied_sequence.max(remote.sequence_number);
                    }
                    Err(other) => {
                        self.set_state(peer_device_id, SyncState::Failed);
                        return Err(other);
                    }
                }
                continue;
            }

            self.set_state(peer_device_id, SyncState::Resolving);
            let mut conflict = self.detect_conflict(&remote, local_version).await?;
            conflict.id = self.id_gen.generate();
            conflict.device_id = peer_device_id.to_string();
            #[cfg(feature = "monitoring")]
            crate::metrics::record_sync_conflict(conflict.kind.as_str());
            let resolved = self.apply_resolution(conflict, &remote, strategy).await?;
            self.emit(SyncEvent::ConflictDetected(resolved.clone()));

            if resolved.resolved {
                highest_applied_sequence = highest_applied_sequence.max(remote.sequence_number);
            } else {
                first_unresolved_sequence.get_or_insert(remote.sequence_number);
                self.conflicts.lock().insert(
                    resolved.id,
                    PendingConflict {
                        conflict: resolved.clone(),
                        remote: remote.clone(),
                    },
                );
            }
            conflicts.push(resolved);
        }

        let new_cursor = match first_unresolved_sequence {
            Some(blocked_at) => highest_applied_sequence.min(blocked_at.saturating_sub(1)),
            None => highest_applied_sequence,
        };

        {
            let mut devices = self.devices.lock();
            let state = devices
                .entry(peer_device_id.to_string())
                .or_insert_with(|| DeviceSyncState::new(peer_device_id.to_string()));
            state.pull_cursor = new_cursor;
            state.last_pull_at = Some(self.clock.now());
            state.last_sync_at = Some(self.clock.now());
        }

        self.emit(SyncEvent::BatchPulled {
            device_id: peer_device_id.to_string(),
            applied,
        });
        self.set_state(peer_device_id, SyncState::Idle);
        Ok(conflicts)
    }

    /// Push then pull against `peer_device_id`, the whole round trip bounded
    /// by `timeout` (or `Config::sync_timeout` when not given) — spec §5
    /// "every sync operation carries a timeout", §6 `sync(remote-device-id,
    /// strategy, timeout)`.
    pub async fn sync(
        &self,
        peer_device_id: &str,
        strategy: ConflictStrategy,
        timeout: Option<Duration>,
    ) -> ScopesResult<Vec<Conflict>> {
        let timeout = timeout.unwrap_or(self.config.sync_timeout);
        tokio::time::timeout(timeout, async {
            self.push(peer_device_id).await?;
            self.pull(peer_device_id, strategy).await
        })
        .await
        .unwrap_or(Err(ScopesError::Timeout { elapsed: timeout }))
    }

    /// Classify a remote event that didn't land on the expected next version
    /// (spec §4.8 conflict-detection rules).
    async fn detect_conflict(
        &self,
        remote: &StoredEvent,
        local_version: u64,
    ) -> ScopesResult<Conflict> {
        if remote.aggregate_version > local_version + 1 {
            return Ok(Conflict {
                id: EventId::nil(),
                device_id: String::new(),
                aggregate_id: remote.aggregate_id,
                local_event_id: None,
                remote_event_id: remote.event_id,
                kind: ConflictKind::MissingDependency,
                detected_at: self.clock.now(),
                resolution_action: None,
                resolved: false,
            });
        }

        let colliding = self
            .event_log
            .events_by_aggregate(
                remote.aggregate_id,
                Some(remote.aggregate_version.saturating_sub(1)),
                Some(1),
            )
            .await?;
        let local_event = colliding.first();
        let concurrent = local_event
            .map(|local| local.vector_clock.is_concurrent_with(&remote.vector_clock))
            .unwrap_or(false);
        let kind = if concurrent {
            ConflictKind::ConcurrentModification
        } else {
            ConflictKind::VersionMismatch
        };

        Ok(Conflict {
            id: EventId::nil(),
            device_id: String::new(),
            aggregate_id: remote.aggregate_id,
            local_event_id: local_event.map(|e| e.event_id),
            remote_event_id: remote.event_id,
            kind,
            detected_at: self.clock.now(),
            resolution_action: None,
            resolved: false,
        })
    }

    /// Try to resolve one already-classified conflict under `strategy`.
    /// `MissingDependency` is never resolved here regardless of strategy —
    /// it can only clear once the missing ancestor versions arrive and the
    /// direct-apply branch in `pull` handles them, or via a later
    /// `resolve_conflict` retry.
    async fn apply_resolution(
        &self,
        mut conflict: Conflict,
        remote: &StoredEvent,
        strategy: ConflictStrategy,
    ) -> ScopesResult<Conflict> {
        if conflict.kind == ConflictKind::MissingDependency {
            conflict.resolution_action =
                Some("buffered pending missing ancestor versions".to_string());
            return Ok(conflict);
        }

        match strategy {
            ConflictStrategy::Manual => {
                conflict.resolution_action = Some("awaiting manual resolution".to_string());
            }
            ConflictStrategy::LocalWins => {
                conflict.resolution_action =
                    Some("remote event shadowed, local retained".to_string());
                conflict.resolved = true;
            }
            ConflictStrategy::RemoteWins => {
                self.apply_compensating_event(remote).await?;
                conflict.resolution_action =
                    Some("remote event appended as a compensating event".to_string());
                conflict.resolved = true;
            }
            ConflictStrategy::LastWriteWins => {
                let local_tip = self
                    .event_log
                    .events_by_aggregate(remote.aggregate_id, None, None)
                    .await?
                    .into_iter()
                    .last();
                let remote_wins = match &local_tip {
                    None => true,
                    Some(local) => {
                        (remote.occurred_at, remote.origin_device_id.as_str())
                            > (local.occurred_at, local.origin_device_id.as_str())
                    }
                };
                if remote_wins {
                    self.apply_compensating_event(remote).await?;
                    conflict.resolution_action = Some(
                        "remote wins by last-write-wins, appended as a compensating event"
                            .to_string(),
                    );
                } else {
                    conflict.resolution_action =
                        Some("local wins by last-write-wins, remote shadowed".to_string());
                }
                conflict.resolved = true;
            }
        }
        Ok(conflict)
    }

    /// Append the remote event onto the local aggregate's current tip.
    /// History is never rewritten — supersession is always a new event
    /// (spec §9 Design Notes: Open Question resolved in favor of
    /// compensating events).
    async fn apply_compensating_event(&self, remote: &StoredEvent) -> ScopesResult<()> {
        let local_version = self.event_log.latest_version(remote.aggregate_id).await?;
        let new_event = NewEvent {
            event_id: remote.event_id,
            aggregate_id: remote.aggregate_id,
            event_type_id: remote.event_type_id.clone(),
            payload: remote.payload.clone(),
            occurred_at: remote.occurred_at,
            stored_at: self.clock.now(),
            origin_device_id: remote.origin_device_id.clone(),
            vector_clock: remote.vector_clock.clone(),
        };
        let stored = self
            .event_log
            .append(new_event, local_version + 1)
            .await?;
        self.projections.apply_event(&stored)?;
        self.local_vector_clock.lock().merge(&stored.vector_clock);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::ScopeEvent;
    use crate::event_log::InMemoryEventStore;
    use crate::id::{IdGenerator, UlidGenerator};

    fn make_engine(
        local_device_id: &str,
        event_log: Arc<InMemoryEventStore>,
        transport: Arc<dyn PeerTransport>,
    ) -> (SyncEngine, mpsc::UnboundedReceiver<SyncEvent>) {
        SyncEngine::new(
            local_device_id.to_string(),
            Config::default(),
            Arc::new(UlidGenerator),
            Arc::new(SystemClock),
            event_log,
            Arc::new(ProjectionStore::new()),
            transport,
        )
    }

    async fn append_created(log: &InMemoryEventStore, origin: &str) -> crate::domain::ScopeId {
        let id = UlidGenerator.generate();
        let event = ScopeEvent::Created {
            title: "Tasks".to_string(),
            parent_id: None,
            canonical_alias: "tasks".to_string(),
            description: None,
        };
        let mut clock = VectorClock::new();
        clock.increment(origin);
        let now = chrono::Utc::now();
        log.append(
            NewEvent {
                event_id: UlidGenerator.generate(),
                aggregate_id: id,
                event_type_id: event.event_type_id().to_string(),
                payload: serde_json::to_value(&event).unwrap(),
                occurred_at: now,
                stored_at: now,
                origin_device_id: origin.to_string(),
                vector_clock: clock,
            },
            1,
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn clean_pull_applies_all_remote_events_without_conflict() {
        let remote_log = Arc::new(InMemoryEventStore::new());
        append_created(&remote_log, "D2").await;
        append_created(&remote_log, "D2").await;
        append_created(&remote_log, "D2").await;

        let local_log = Arc::new(InMemoryEventStore::new());
        let transport = Arc::new(InMemoryPeerTransport::new(remote_log));
        let (engine, _rx) = make_engine("D1", local_log.clone(), transport);
        engine.register_device("D2").unwrap();

        let conflicts = engine.pull("D2", ConflictStrategy::LastWriteWins).await.unwrap();
        assert!(conflicts.is_empty());

        let state = engine.device_state("D2").unwrap();
        assert_eq!(state.pull_cursor, 3);
        assert_eq!(state.sync_status, SyncState::Idle);
    }

    #[tokio::test]
    async fn pulling_twice_is_idempotent() {
        let remote_log = Arc::new(InMemoryEventStore::new());
        append_created(&remote_log, "D2").await;

        let local_log = Arc::new(InMemoryEventStore::new());
        let transport = Arc::new(InMemoryPeerTransport::new(remote_log));
        let (engine, _rx) = make_engine("D1", local_log.clone(), transport);
        engine.register_device("D2").unwrap();

        engine.pull("D2", ConflictStrategy::LastWriteWins).await.unwrap();
        let events_after_first = local_log.events_since(0, None).await.unwrap().len();

        engine.pull("D2", ConflictStrategy::LastWriteWins).await.unwrap();
        let events_after_second = local_log.events_since(0, None).await.unwrap().len();

        assert_eq!(events_after_first, events_after_second);
    }

    #[tokio::test]
    async fn pull_without_registering_device_is_rejected() {
        let remote_log = Arc::new(InMemoryEventStore::new());
        let local_log = Arc::new(InMemoryEventStore::new());
        let transport = Arc::new(InMemoryPeerTransport::new(remote_log));
        let (engine, _rx) = make_engine("D1", local_log, transport);

        let err = engine
            .pull("D2", ConflictStrategy::LastWriteWins)
            .await
            .unwrap_err();
        assert!(matches!(err, ScopesError::DeviceNotRegistered { .. }));
    }

    #[tokio::test]
    async fn unregistering_a_device_drops_its_pending_conflicts() {
        let remote_log = Arc::new(InMemoryEventStore::new());
        let local_log = Arc::new(InMemoryEventStore::new());
        let transport = Arc::new(InMemoryPeerTransport::new(remote_log));
        let (engine, _rx) = make_engine("D1", local_log, transport);
        engine.register_device("D2").unwrap();

        engine.unregister_device("D2").unwrap();
        assert!(engine.device_state("D2").is_none());
        assert!(engine.list_conflicts("D2").is_empty());

        let err = engine.unregister_device("D2").unwrap_err();
        assert!(matches!(err, ScopesError::DeviceNotRegistered { .. }));
    }

    #[tokio::test]
    async fn concurrent_modification_is_detected_and_resolved_by_last_write_wins() {
        crate::init_test_tracing();
        let local_log = Arc::new(InMemoryEventStore::new());
        let local_id = append_created(&local_log, "D1").await;

        let remote_log = Arc::new(InMemoryEventStore::new());
        let event = ScopeEvent::TitleChanged {
            title: "Remote Title".to_string(),
        };
        let mut remote_clock = VectorClock::new();
        remote_clock.increment("D2");
        remote_log
            .append(
                NewEvent {
                    event_id: UlidGenerator.generate(),
                    aggregate_id: local_id,
                    event_type_id: event.event_type_id().to_string(),
                    payload: serde_json::to_value(&event).unwrap(),
                    occurred_at: chrono::Utc::now() + chrono::Duration::seconds(10),
                    stored_at: chrono::Utc::now() + chrono::Duration::seconds(10),
                    origin_device_id: "D2".to_string(),
                    vector_clock: remote_clock,
                },
                2,
            )
            .await
            .unwrap();

        let local_event = ScopeEvent::TitleChanged {
            title: "Local Title".to_string(),
        };
        local_log
            .append(
                NewEvent {
                    event_id: UlidGenerator.generate(),
                    aggregate_id: local_id,
                    event_type_id: local_event.event_type_id().to_string(),
                    payload: serde_json::to_value(&local_event).unwrap(),
                    occurred_at: chrono::Utc::now(),
                    stored_at: chrono::Utc::now(),
                    origin_device_id: "D1".to_string(),
                    vector_clock: VectorClock::new(),
                },
                2,
            )
            .await
            .unwrap();

        let transport = Arc::new(InMemoryPeerTransport::new(remote_log));
        let (engine, _rx) = make_engine("D1", local_log.clone(), transport);
        engine.register_device("D2").unwrap();

        let conflicts = engine.pull("D2", ConflictStrategy::LastWriteWins).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ConcurrentModification);
        assert!(conflicts[0].resolved);

        let final_version = local_log.latest_version(local_id).await.unwrap();
        assert_eq!(final_version, 3, "compensating event appended past both tips");
    }

    #[tokio::test]
    async fn manual_conflict_is_buffered_and_later_resolved_via_resolve_conflict() {
        crate::init_test_tracing();
        let local_log = Arc::new(InMemoryEventStore::new());
        let local_id = append_created(&local_log, "D1").await;

        let remote_log = Arc::new(InMemoryEventStore::new());
        let event = ScopeEvent::TitleChanged {
            title: "Remote Title".to_string(),
        };
        let mut remote_clock = VectorClock::new();
        remote_clock.increment("D2");
        remote_log
            .append(
                NewEvent {
                    event_id: UlidGenerator.generate(),
                    aggregate_id: local_id,
                    event_type_id: event.event_type_id().to_string(),
                    payload: serde_json::to_value(&event).unwrap(),
                    occurred_at: chrono::Utc::now(),
                    stored_at: chrono::Utc::now(),
                    origin_device_id: "D2".to_string(),
                    vector_clock: remote_clock,
                },
                2,
            )
            .await
            .unwrap();

        let local_event = ScopeEvent::TitleChanged {
            title: "Local Title".to_string(),
        };
        local_log
            .append(
                NewEvent {
                    event_id: UlidGenerator.generate(),
                    aggregate_id: local_id,
                    event_type_id: local_event.event_type_id().to_string(),
                    payload: serde_json::to_value(&local_event).unwrap(),
                    occurred_at: chrono::Utc::now(),
                    stored_at: chrono::Utc::now(),
                    origin_device_id: "D1".to_string(),
                    vector_clock: VectorClock::new(),
                },
                2,
            )
            .await
            .unwrap();

        let transport = Arc::new(InMemoryPeerTransport::new(remote_log));
        let (engine, _rx) = make_engine("D1", local_log.clone(), transport);
        engine.register_device("D2").unwrap();

        let conflicts = engine.pull("D2", ConflictStrategy::Manual).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert!(!conflicts[0].resolved);

        // Left at the version before the manual conflict, not past it.
        let state = engine.device_state("D2").unwrap();
        assert_eq!(state.pull_cursor, 1);

        let pending = engine.list_conflicts("D2");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, conflicts[0].id);

        let resolved = engine
            .resolve_conflict(conflicts[0].id, ConflictStrategy::RemoteWins)
            .await
            .unwrap();
        assert!(resolved.resolved);
        assert!(engine.list_conflicts("D2").is_empty());

        let state = engine.device_state("D2").unwrap();
        assert_eq!(state.pull_cursor, 2);
    }

    #[tokio::test]
    async fn sync_times_out_when_push_or_pull_does_not_finish_in_time() {
        struct NeverRespondingTransport;

        #[async_trait::async_trait]
        impl PeerTransport for NeverRespondingTransport {
            async fn push(
                &self,
                _peer_device_id: &str,
                _batch: Vec<StoredEvent>,
            ) -> ScopesResult<PushAck> {
                std::future::pending().await
            }

            async fn pull(
                &self,
                _peer_device_id: &str,
                _since_sequence: u64,
            ) -> ScopesResult<Vec<StoredEvent>> {
                std::future::pending().await
            }
        }

        let local_log = Arc::new(InMemoryEventStore::new());
        append_created(&local_log, "D1").await;
        let transport = Arc::new(NeverRespondingTransport);
        let (engine, _rx) = make_engine("D1", local_log, transport);
        engine.register_device("D2").unwrap();

        let err = engine
            .sync(
                "D2",
                ConflictStrategy::LastWriteWins,
                Some(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScopesError::Timeout { .. }));
    }
}
