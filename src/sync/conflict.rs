//! Conflict taxonomy and resolution strategies (spec §4.8, §3 Conflict).
//! Grounded on the conflict-kind/resolution-strategy shape in
//! `harborgrid-justin-rusty-db`'s `advanced_replication/conflicts.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DeviceId, EventId, ScopeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    ConcurrentModification,
    VersionMismatch,
    MissingDependency,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::ConcurrentModification => "concurrent-modification",
            ConflictKind::VersionMismatch => "version-mismatch",
            ConflictKind::MissingDependency => "missing-dependency",
        }
    }
}

/// Selectable per sync session (spec §4.8); `Config::conflict_strategy_default`
/// supplies the default a session doesn't override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictStrategy {
    LocalWins,
    RemoteWins,
    LastWriteWins,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Identifies this conflict record itself — distinct from the event ids
    /// it references — so a host can later call `resolve-conflict(id, ..)`
    /// (spec §6) without re-deriving which record it meant.
    pub id: EventId,
    pub device_id: DeviceId,
    pub aggregate_id: ScopeId,
    pub local_event_id: Option<EventId>,
    pub remote_event_id: EventId,
    pub kind: ConflictKind,
    pub detected_at: DateTime<Utc>,
    pub resolution_action: Option<String>,
    pub resolved: bool,
}
