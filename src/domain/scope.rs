use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MAX_TITLE_LENGTH;
use crate::error::ScopesError;

use super::alias::Alias;
use super::context_view::AspectMap;
use super::ScopeId;

/// A validated, non-blank, length-bounded scope title. Blank/oversized
/// titles are rejected at parsing (spec §4.4 tie-break note), not by the
/// Cross-Aggregate Validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Title(String);

impl Title {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ScopesError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScopesError::BlankTitle);
        }
        let len = trimmed.chars().count();
        if len > MAX_TITLE_LENGTH {
            return Err(ScopesError::TitleTooLong {
                max: MAX_TITLE_LENGTH,
                actual: len,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The Scope aggregate: a recursive parent/child entity with aliases,
/// aspects, and a soft-delete lifecycle (spec §3 Aggregate (Scope)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub id: ScopeId,
    pub title: Title,
    pub description: Option<String>,
    pub parent_id: Option<ScopeId>,
    pub aspects: AspectMap,
    pub canonical_alias: String,
    pub additional_aliases: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived: bool,
    pub version: u64,
}

impl Scope {
    pub fn all_aliases(&self) -> Vec<&str> {
        std::iter::once(self.canonical_alias.as_str())
            .chain(self.additional_aliases.iter().map(String::as_str))
            .collect()
    }

    pub fn to_alias_records(&self) -> Vec<Alias> {
        use super::alias::AliasKind;
        let mut records = vec![Alias {
            scope_id: self.id,
            name: self.canonical_alias.clone(),
            kind: AliasKind::Canonical,
            created_at: self.created_at,
        }];
        for extra in &self.additional_aliases {
            records.push(Alias {
                scope_id: self.id,
                name: extra.clone(),
                kind: AliasKind::Custom,
                created_at: self.created_at,
            });
        }
        records
    }
}
