use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScopeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AliasKind {
    Canonical,
    Custom,
}

/// A human-friendly name resolving to a scope id. Unique on `name` across all
/// live scopes (spec §3 Alias, invariant (f)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub scope_id: ScopeId,
    pub name: String,
    pub kind: AliasKind,
    pub created_at: DateTime<Utc>,
}

/// Maximum alias length; kept well under the ULID length so `Id::looks_like_ulid`
/// can never misclassify a legitimate alias as an id reference.
pub const MAX_ALIAS_LENGTH: usize = 64;

/// Deterministically derive a canonical alias candidate from a title seed,
/// e.g. "My Tasks" -> "my-tasks". Collisions are resolved by the caller
/// appending a numeric suffix and re-checking uniqueness against the Alias
/// Index (the validator, not this function, owns uniqueness).
pub fn slugify(seed: &str) -> String {
    let mut slug = String::with_capacity(seed.len());
    let mut last_was_dash = true; // suppress a leading dash
    for c in seed.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("scope");
    }
    slug.truncate(MAX_ALIAS_LENGTH);
    slug
}

pub fn validate_alias_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("alias must not be blank".to_string());
    }
    if name.chars().count() > MAX_ALIAS_LENGTH {
        return Err(format!(
            "alias exceeds maximum length of {} characters",
            MAX_ALIAS_LENGTH
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("alias must contain only letters, digits, '-' or '_'".to_string());
    }
    Ok(())
}
