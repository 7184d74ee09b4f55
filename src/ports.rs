//! Ports consumed by the core (spec §6): traits a host can substitute
//! without touching the rest of the crate. `EventStore` (event_log),
//! `PeerTransport` (sync::transport), `Clock` (clock), and `IdGenerator`
//! (id) are the other ports; this module holds the event serializer —
//! the one wire-format concern every aggregate/projection/replay path
//! shares.

use crate::domain::ScopeEvent;
use crate::error::{ScopesError, ScopesResult};

/// Converts a [`ScopeEvent`] to and from the `serde_json::Value` wire form
/// [`StoredEvent::payload`](crate::event_log::StoredEvent::payload) holds.
/// `JsonEventSerializer` is the default every constructor in this crate uses
/// unless a host supplies its own via a `with_serializer` constructor —
/// e.g. to validate against a schema registry or swap in a non-JSON codec
/// upstream of the `Value` boundary.
pub trait EventSerializer: Send + Sync {
    fn serialize(&self, event: &ScopeEvent) -> ScopesResult<serde_json::Value>;
    fn deserialize(&self, type_id: &str, payload: &serde_json::Value) -> ScopesResult<ScopeEvent>;
}

/// The default serializer: `serde_json::to_value`/`from_value`, relying on
/// `ScopeEvent`'s internally-tagged `event_type_id` for the registry (no
/// separate lookup table — `serde` is the registry, spec §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventSerializer;

impl EventSerializer for JsonEventSerializer {
    fn serialize(&self, event: &ScopeEvent) -> ScopesResult<serde_json::Value> {
        serde_json::to_value(event).map_err(|err| ScopesError::SerializationError {
            message: err.to_string(),
        })
    }

    fn deserialize(&self, type_id: &str, payload: &serde_json::Value) -> ScopesResult<ScopeEvent> {
        serde_json::from_value(payload.clone()).map_err(|_| ScopesError::UnknownEventType {
            type_id: type_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_serializer_round_trips_a_created_event() {
        let serializer = JsonEventSerializer;
        let event = ScopeEvent::Created {
            title: "Tasks".to_string(),
            parent_id: None,
            canonical_alias: "tasks".to_string(),
            description: None,
        };
        let value = serializer.serialize(&event).unwrap();
        let back = serializer.deserialize("scope.created.v1", &value).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn deserializing_an_unknown_type_id_is_an_error() {
        let serializer = JsonEventSerializer;
        let value = serde_json::json!({ "event_type_id": "scope.nonexistent.v1" });
        let err = serializer.deserialize("scope.nonexistent.v1", &value).unwrap_err();
        assert!(matches!(err, ScopesError::UnknownEventType { .. }));
    }
}
