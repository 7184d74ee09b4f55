//! The Scope domain model: entity/value types and pure state-transition
//! functions (spec §3, §4.2, §9 "Sum types vs inheritance").

pub mod alias;
pub mod aspect;
pub mod commands;
pub mod context_view;
pub mod events;
pub mod scope;

pub use alias::{Alias, AliasKind};
pub use aspect::{AspectConstraint, AspectDefinition, AspectType, AspectValue};
pub use commands::ScopeCommand;
pub use context_view::ContextView;
pub use events::ScopeEvent;
pub use scope::{Scope, Title};

use crate::id::Id;

/// Aggregate id for a Scope. Also the type used for event ids and device-
/// scoped identifiers that are ULIDs.
pub type ScopeId = Id;
pub type EventId = Id;

/// Device ids are short ASCII tokens (§6: `1..64 chars [A-Za-z0-9_-]`), not
/// ULIDs, so devices can carry human-assigned names.
pub type DeviceId = String;

pub fn validate_device_id(candidate: &str) -> Result<(), String> {
    if candidate.is_empty() || candidate.chars().count() > 64 {
        return Err(format!(
            "device id must be 1..64 characters, got {}",
            candidate.chars().count()
        ));
    }
    if !candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("device id must match [A-Za-z0-9_-]".to_string());
    }
    Ok(())
}
