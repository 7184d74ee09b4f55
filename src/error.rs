//! Error taxonomy for the Scopes engine.
//!
//! All fallible operations in this crate return [`ScopesError`]. Variants are
//! grouped by the kinds in spec §7 (input, domain rule, concurrency,
//! integrity, sync, storage, timeout/cancellation) rather than by which
//! module raised them, so a caller can make one retry/report decision per
//! kind instead of matching every variant.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ScopeId;

pub type ScopesResult<T> = Result<T, ScopesError>;

/// Closed-set classification used for retry and reporting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Input,
    DomainRule,
    Concurrency,
    Integrity,
    Sync,
    Storage,
    Timeout,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ScopesError {
    // --- Input ---
    #[error("title must not be blank")]
    BlankTitle,

    #[error("title exceeds maximum length of {max} characters (got {actual})")]
    TitleTooLong { max: usize, actual: usize },

    #[error("alias '{alias}' is not a valid alias: {reason}")]
    InvalidAlias { alias: String, reason: String },

    #[error("'{reference}' is not a valid scope reference (expected a ULID or alias)")]
    MalformedReference { reference: String },

    #[error("'{device_id}' is not a valid device id: {reason}")]
    InvalidDeviceId { device_id: String, reason: String },

    // --- Domain rule ---
    #[error("a sibling scope under parent {parent} already has the title '{title}'")]
    DuplicateSiblingTitle { parent: ScopeId, title: String },

    #[error("making {candidate_child} a descendant of {parent} would create a cycle")]
    Cycle {
        parent: ScopeId,
        candidate_child: ScopeId,
    },

    #[error("depth {attempted_depth} exceeds the configured maximum of {max_depth}")]
    DepthExceeded {
        attempted_depth: u32,
        max_depth: u32,
    },

    #[error("parent {parent} already has {current} children, the configured maximum is {max}")]
    ChildrenExceeded {
        parent: ScopeId,
        current: u32,
        max: u32,
    },

    #[error("alias '{alias}' is already in use")]
    AliasTaken { alias: String },

    #[error("aspect '{key}' is still referenced by {live_scope_count} live scope(s)")]
    AspectInUse { key: String, live_scope_count: u64 },

    #[error("scope {id} not found")]
    ScopeNotFound { id: ScopeId },

    #[error("scope {id} is archived and cannot accept new commands")]
    ScopeArchived { id: ScopeId },

    // --- Concurrency ---
    #[error(
        "version conflict on aggregate {aggregate_id}: expected {expected}, found {actual}"
    )]
    VersionConflict {
        aggregate_id: ScopeId,
        expected: u64,
        actual: u64,
    },

    #[error("event {event_id} has already been stored")]
    DuplicateEvent { event_id: String },

    #[error("append would violate ordering: {message}")]
    OrderingViolation { message: String },

    // --- Integrity ---
    #[error("event stream for {aggregate_id} has a gap: expected version {expected}, found {found}")]
    StreamGap {
        aggregate_id: ScopeId,
        expected: u64,
        found: u64,
    },

    #[error("event payload for {event_id} is corrupted: {message}")]
    CorruptedPayload { event_id: String, message: String },

    #[error("unknown event type id '{type_id}'")]
    UnknownEventType { type_id: String },

    #[error("aggregate stream for {aggregate_id} is corrupted and cannot be replayed")]
    CorruptedStream { aggregate_id: ScopeId },

    // --- Sync ---
    #[error("peer {device_id} is unreachable")]
    PeerUnreachable { device_id: String },

    #[error("peer {device_id} failed authentication")]
    PeerAuthFailed { device_id: String },

    #[error("protocol mismatch with peer {device_id}: {message}")]
    ProtocolMismatch { device_id: String, message: String },

    #[error("conflict resolution strategy {strategy} cannot resolve a {conflict_kind:?} conflict")]
    ResolutionStrategyInapplicable {
        strategy: String,
        conflict_kind: String,
    },

    #[error("conflict {conflict_id} requires manual resolution")]
    ManualResolutionRequired { conflict_id: String },

    #[error("device {device_id} is not registered")]
    DeviceNotRegistered { device_id: String },

    #[error("conflict {conflict_id} not found")]
    ConflictNotFound { conflict_id: String },

    // --- Storage ---
    #[error("transient storage error: {message}")]
    StorageTransient { message: String },

    #[error("storage quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },

    // --- Timeout / cancellation ---
    #[error("operation timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("operation was cancelled")]
    Cancelled,
}

impl ScopesError {
    /// Stable classification, used by callers (and the Command Pipeline's
    /// bounded retry) to decide how to react without matching every variant.
    pub fn kind(&self) -> ErrorKind {
        use ScopesError::*;
        match self {
            BlankTitle
            | TitleTooLong { .. }
            | InvalidAlias { .. }
            | MalformedReference { .. }
            | InvalidDeviceId { .. } => ErrorKind::Input,
            DuplicateSiblingTitle { .. }
            | Cycle { .. }
            | DepthExceeded { .. }
            | ChildrenExceeded { .. }
            | AliasTaken { .. }
            | AspectInUse { .. }
            | ScopeNotFound { .. }
            | ScopeArchived { .. } => ErrorKind::DomainRule,
            VersionConflict { .. } | DuplicateEvent { .. } | OrderingViolation { .. } => {
                ErrorKind::Concurrency
            }
            StreamGap { .. }
            | CorruptedPayload { .. }
            | UnknownEventType { .. }
            | CorruptedStream { .. } => ErrorKind::Integrity,
            PeerUnreachable { .. }
            | PeerAuthFailed { .. }
            | ProtocolMismatch { .. }
            | ResolutionStrategyInapplicable { .. }
            | ManualResolutionRequired { .. }
            | DeviceNotRegistered { .. }
            | ConflictNotFound { .. } => ErrorKind::Sync,
            StorageTransient { .. } | QuotaExceeded { .. } | SerializationError { .. } => {
                ErrorKind::Storage
            }
            Timeout { .. } | Cancelled => ErrorKind::Timeout,
        }
    }

    /// Whether the Command Pipeline may retry the operation that produced
    /// this error without caller involvement. Version conflicts are handled
    /// by the bounded reload-and-retry loop; transient storage errors are
    /// retried with backoff; everything else surfaces to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Concurrency | ErrorKind::Storage
        ) && !matches!(self, ScopesError::QuotaExceeded { .. })
    }
}
