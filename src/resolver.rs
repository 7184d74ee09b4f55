//! Resolves a user-facing reference — a 26-char ULID or an alias name — to
//! an aggregate id (spec §4.6). Pure lookup; ULID detection is by
//! character-set and length, never a parse-and-catch.

use crate::domain::ScopeId;
use crate::error::{ScopesError, ScopesResult};
use crate::id::Id;
use crate::projection::ProjectionStore;

/// Resolve `reference` against `projections`. A string that looks like a
/// ULID is parsed directly without touching the alias index; anything else
/// is looked up by name. A malformed-looking ULID (wrong length or
/// non-alphanumeric) is still tried as an alias — only a true 26-character
/// token that *fails* to parse is rejected outright, since at that length an
/// alias collision is not realistically intended by a caller.
pub fn resolve(projections: &ProjectionStore, reference: &str) -> ScopesResult<ScopeId> {
    if Id::looks_like_ulid(reference) {
        return reference
            .parse()
            .map_err(|_| ScopesError::MalformedReference {
                reference: reference.to_string(),
            });
    }
    if reference.len() == crate::id::ULID_LENGTH
        && reference.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ScopesError::MalformedReference {
            reference: reference.to_string(),
        });
    }
    projections
        .resolve_alias(reference)
        .ok_or_else(|| ScopesError::ScopeNotFound {
            id: ScopeId::nil(),
        })
}
