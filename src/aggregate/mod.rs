//! The Aggregate Replayer and the Scope aggregate's pure state-transition
//! and decision functions (spec §4.2, §4.3, §9 "Sum types vs inheritance").

pub mod replayer;

pub use replayer::{AggregateReplayer, LoadedAggregate};

use crate::domain::alias::{slugify, validate_alias_name};
use crate::domain::{Scope, ScopeCommand, ScopeEvent, ScopeId, Title};
use crate::error::{ScopesError, ScopesResult};
use crate::event_log::StoredEvent;

/// Fold one event into aggregate state. Unknown event types for a known
/// aggregate type are errors, never silently ignored — forward-compatibility
/// is an explicit registration (`ScopeEvent`'s closed variant set), not a
/// best-effort skip.
pub fn apply(scope: Option<Scope>, event: &ScopeEvent, stored: &StoredEvent) -> ScopesResult<Scope> {
    match (scope, event) {
        (
            None,
            ScopeEvent::Created {
                title,
                parent_id,
                canonical_alias,
                description,
            },
        ) => Ok(Scope {
            id: stored.aggregate_id,
            title: Title::parse(title.clone())?,
            description: description.clone(),
            parent_id: *parent_id,
            aspects: Default::default(),
            canonical_alias: canonical_alias.clone(),
            additional_aliases: Vec::new(),
            created_at: stored.occurred_at,
            updated_at: stored.occurred_at,
            archived: false,
            version: stored.aggregate_version,
        }),
        (None, _) => Err(ScopesError::CorruptedStream {
            aggregate_id: stored.aggregate_id,
        }),
        (Some(_), ScopeEvent::Created { .. }) => Err(ScopesError::OrderingViolation {
            message: format!(
                "aggregate {} received a second Created event",
                stored.aggregate_id
            ),
        }),
        (Some(mut scope), event) => {
            match event {
                ScopeEvent::Created { .. } => unreachable!("handled above"),
                ScopeEvent::TitleChanged { title } => {
                    scope.title = Title::parse(title.clone())?;
                }
                ScopeEvent::DescriptionChanged { description } => {
                    scope.description = description.clone();
                }
                ScopeEvent::Reparented { new_parent_id } => {
                    scope.parent_id = *new_parent_id;
                }
                ScopeEvent::AspectSet { key, values } => {
                    scope.aspects.insert(key.clone(), values.clone());
                }
                ScopeEvent::AspectRemoved { key } => {
                    scope.aspects.remove(key);
                }
                ScopeEvent::AliasAdded { name } => {
                    scope.additional_aliases.push(name.clone());
                }
                ScopeEvent::AliasRemoved { name } => {
                    scope.additional_aliases.retain(|existing| existing != name);
                }
                ScopeEvent::CanonicalAliasChanged { name } => {
                    let previous = std::mem::replace(&mut scope.canonical_alias, name.clone());
                    scope.additional_aliases.push(previous);
                }
                ScopeEvent::Archived => scope.archived = true,
                ScopeEvent::Unarchived => scope.archived = false,
            }
            scope.updated_at = stored.occurred_at;
            scope.version = stored.aggregate_version;
            Ok(scope)
        }
    }
}

/// The pure decision function `decide(state, command) -> events | DomainError`
/// (spec §4.3 step 2). Per-aggregate invariants only — cross-aggregate checks
/// (sibling uniqueness, depth/fan-out, alias global uniqueness, cycles
/// against the whole forest) are the Cross-Aggregate Validator's job and run
/// before this is called.
pub fn decide(scope: Option<&Scope>, command: &ScopeCommand) -> ScopesResult<Vec<ScopeEvent>> {
    if let ScopeCommand::CreateScope {
        title,
        parent_id,
        canonical_alias,
        description,
    } = command
    {
        if scope.is_some() {
            return Err(ScopesError::OrderingViolation {
                message: "scope already exists".to_string(),
            });
        }
        let title = Title::parse(title.clone())?;
        let alias = canonical_alias
            .clone()
            .unwrap_or_else(|| slugify(title.as_str()));
        validate_alias_name(&alias).map_err(|reason| ScopesError::InvalidAlias {
            alias: alias.clone(),
            reason,
        })?;
        return Ok(vec![ScopeEvent::Created {
            title: title.as_str().to_string(),
            parent_id: *parent_id,
            canonical_alias: alias,
            description: description.clone(),
        }]);
    }

    let scope = scope.ok_or(ScopesError::ScopeNotFound {
        id: command.target().unwrap_or_else(ScopeId::nil),
    })?;

    if scope.archived && !matches!(command, ScopeCommand::UnarchiveScope { .. }) {
        return Err(ScopesError::ScopeArchived { id: scope.id });
    }

    match command {
        ScopeCommand::CreateScope { .. } => unreachable!("handled above"),
        ScopeCommand::RenameScope { title, .. } => {
            let title = Title::parse(title.clone())?;
            Ok(vec![ScopeEvent::TitleChanged {
                title: title.as_str().to_string(),
            }])
        }
        ScopeCommand::SetDescription { description, .. } => Ok(vec![ScopeEvent::DescriptionChanged {
            description: description.clone(),
        }]),
        ScopeCommand::ReparentScope { new_parent_id, .. } => {
            if *new_parent_id == Some(scope.id) {
                return Err(ScopesError::Cycle {
                    parent: scope.id,
                    candidate_child: scope.id,
                });
            }
            Ok(vec![ScopeEvent::Reparented {
                new_parent_id: *new_parent_id,
            }])
        }
        ScopeCommand::SetAspect { key, values, .. } => Ok(vec![ScopeEvent::AspectSet {
            key: key.clone(),
            values: values.clone(),
        }]),
        ScopeCommand::RemoveAspect { key, .. } => Ok(vec![ScopeEvent::AspectRemoved { key: key.clone() }]),
        ScopeCommand::AddAlias { name, .. } => {
            validate_alias_name(name).map_err(|reason| ScopesError::InvalidAlias {
                alias: name.clone(),
                reason,
            })?;
            Ok(vec![ScopeEvent::AliasAdded { name: name.clone() }])
        }
        ScopeCommand::RemoveAlias { name, .. } => {
            if name == &scope.canonical_alias {
                return Err(ScopesError::InvalidAlias {
                    alias: name.clone(),
                    reason: "cannot remove the canonical alias".to_string(),
                });
            }
            Ok(vec![ScopeEvent::AliasRemoved { name: name.clone() }])
        }
        ScopeCommand::SetCanonicalAlias { name, .. } => {
            validate_alias_name(name).map_err(|reason| ScopesError::InvalidAlias {
                alias: name.clone(),
                reason,
            })?;
            Ok(vec![ScopeEvent::CanonicalAliasChanged { name: name.clone() }])
        }
        ScopeCommand::ArchiveScope { .. } => {
            if scope.archived {
                Ok(vec![])
            } else {
                Ok(vec![ScopeEvent::Archived])
            }
        }
        ScopeCommand::UnarchiveScope { .. } => {
            if scope.archived {
                Ok(vec![ScopeEvent::Unarchived])
            } else {
                Ok(vec![])
            }
        }
    }
}
