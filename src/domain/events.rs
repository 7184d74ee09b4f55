use serde::{Deserialize, Serialize};

use super::aspect::AspectValue;
use super::ScopeId;

/// Domain events for the Scope aggregate. The wire representation is
/// internally tagged on `event_type_id` (spec §6: a stable string such as
/// `scope.created.v1`), so the event log's payload column is just this
/// enum's `serde_json::Value` form and no separate registry table is needed
/// to round-trip it — `serde` is the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type_id")]
pub enum ScopeEvent {
    #[serde(rename = "scope.created.v1")]
    Created {
        title: String,
        parent_id: Option<ScopeId>,
        canonical_alias: String,
        description: Option<String>,
    },
    #[serde(rename = "scope.title_changed.v1")]
    TitleChanged { title: String },
    #[serde(rename = "scope.description_changed.v1")]
    DescriptionChanged { description: Option<String> },
    #[serde(rename = "scope.reparented.v1")]
    Reparented { new_parent_id: Option<ScopeId> },
    #[serde(rename = "scope.aspect_set.v1")]
    AspectSet {
        key: String,
        values: Vec<AspectValue>,
    },
    #[serde(rename = "scope.aspect_removed.v1")]
    AspectRemoved { key: String },
    #[serde(rename = "scope.alias_added.v1")]
    AliasAdded { name: String },
    #[serde(rename = "scope.alias_removed.v1")]
    AliasRemoved { name: String },
    #[serde(rename = "scope.canonical_alias_changed.v1")]
    CanonicalAliasChanged { name: String },
    #[serde(rename = "scope.archived.v1")]
    Archived,
    #[serde(rename = "scope.unarchived.v1")]
    Unarchived,
}

impl ScopeEvent {
    /// The stable `event-type-id` string (spec §6), independent of
    /// serialization — used for the `events-by-type` query surface and for
    /// logging without round-tripping through JSON.
    pub fn event_type_id(&self) -> &'static str {
        match self {
            ScopeEvent::Created { .. } => "scope.created.v1",
            ScopeEvent::TitleChanged { .. } => "scope.title_changed.v1",
            ScopeEvent::DescriptionChanged { .. } => "scope.description_changed.v1",
            ScopeEvent::Reparented { .. } => "scope.reparented.v1",
            ScopeEvent::AspectSet { .. } => "scope.aspect_set.v1",
            ScopeEvent::AspectRemoved { .. } => "scope.aspect_removed.v1",
            ScopeEvent::AliasAdded { .. } => "scope.alias_added.v1",
            ScopeEvent::AliasRemoved { .. } => "scope.alias_removed.v1",
            ScopeEvent::CanonicalAliasChanged { .. } => "scope.canonical_alias_changed.v1",
            ScopeEvent::Archived => "scope.archived.v1",
            ScopeEvent::Unarchived => "scope.unarchived.v1",
        }
    }

    /// Whether this event marks the scope as a tombstone for the purposes of
    /// uniqueness/usage checks (spec §3 Aggregate lifecycle: "soft-deleted by
    /// an Archived/Deleted event").
    pub fn is_archival(&self) -> bool {
        matches!(self, ScopeEvent::Archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_round_trips_through_json() {
        let event = ScopeEvent::Created {
            title: "Tasks".to_string(),
            parent_id: None,
            canonical_alias: "tasks".to_string(),
            description: Some("where work lives".to_string()),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type_id"], "scope.created.v1");
        let back: ScopeEvent = serde_json::from_value(value).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn unknown_event_type_id_fails_to_deserialize() {
        let value = serde_json::json!({ "event_type_id": "scope.nonexistent.v1" });
        let result: Result<ScopeEvent, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }
}
