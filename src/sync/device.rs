//! Per-peer sync bookkeeping (spec §3 Device Sync State).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DeviceId;
use crate::vector_clock::VectorClock;

/// State machine per remote peer (spec §4.8): `Idle -> Pushing -> Pulling ->
/// Resolving -> Idle`, with `Failed` reentered from any state on
/// transport/validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Idle,
    Pushing,
    Pulling,
    Resolving,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSyncState {
    pub device_id: DeviceId,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_push_at: Option<DateTime<Utc>>,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub remote_vector_clock: VectorClock,
    pub sync_status: SyncState,
    pub pending_event_count: u64,
    /// Local `sequence_number` cursor this device has pushed up to.
    pub push_cursor: u64,
    /// Remote `sequence_number` cursor this device has pulled up to.
    pub pull_cursor: u64,
}

impl DeviceSyncState {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            last_sync_at: None,
            last_push_at: None,
            last_pull_at: None,
            remote_vector_clock: VectorClock::new(),
            sync_status: SyncState::Idle,
            pending_event_count: 0,
            push_cursor: 0,
            pull_cursor: 0,
        }
    }
}
