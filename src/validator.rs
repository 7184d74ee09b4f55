//! Cross-Aggregate Validator: pure functions over a [`ProjectionSnapshot`]
//! (spec §4.4). None of these touch the Event Log or an aggregate directly —
//! they only ever see the read models, so they're trivial to unit test
//! without any storage fixture.

use crate::domain::ScopeId;
use crate::error::{ScopesError, ScopesResult};
use crate::projection::ProjectionSnapshot;

/// No sibling under `parent` (other than `excluding`) may already have
/// `title`.
pub fn unique_sibling_title(
    snapshot: &ProjectionSnapshot,
    parent: Option<ScopeId>,
    title: &str,
    excluding: Option<ScopeId>,
) -> ScopesResult<()> {
    let clash = snapshot.children_of(parent).iter().any(|&child_id| {
        Some(child_id) != excluding
            && snapshot
                .scopes
                .get(&child_id)
                .is_some_and(|child| !child.archived && child.title.as_str() == title)
    });
    if clash {
        return Err(ScopesError::DuplicateSiblingTitle {
            parent: parent.unwrap_or_else(ScopeId::nil),
            title: title.to_string(),
        });
    }
    Ok(())
}

/// Depth check is on the *attempted* depth: `parent_depth + 1`, not the
/// scope's current depth (spec §4.4 tie-break).
pub fn depth_within_limit(
    snapshot: &ProjectionSnapshot,
    parent: Option<ScopeId>,
    max_depth: Option<u32>,
) -> ScopesResult<()> {
    let Some(max_depth) = max_depth else {
        return Ok(());
    };
    let attempted_depth = match parent {
        None => 0,
        Some(parent_id) => snapshot.depth_of(parent_id) + 1,
    };
    if attempted_depth > max_depth {
        return Err(ScopesError::DepthExceeded {
            attempted_depth,
            max_depth,
        });
    }
    Ok(())
}

pub fn children_within_limit(
    snapshot: &ProjectionSnapshot,
    parent: Option<ScopeId>,
    max_children: Option<u32>,
) -> ScopesResult<()> {
    let Some(max_children) = max_children else {
        return Ok(());
    };
    let current = snapshot
        .children_of(parent)
        .iter()
        .filter(|&&id| snapshot.scopes.get(&id).is_some_and(|s| !s.archived))
        .count() as u32;
    if current >= max_children {
        return Err(ScopesError::ChildrenExceeded {
            parent: parent.unwrap_or_else(ScopeId::nil),
            current,
            max: max_children,
        });
    }
    Ok(())
}

/// Uniqueness checks exclude the scope being updated (spec §4.4 tie-break) —
/// renaming a scope's own canonical alias to itself must not fail.
pub fn alias_globally_unique(
    snapshot: &ProjectionSnapshot,
    name: &str,
    excluding: Option<ScopeId>,
) -> ScopesResult<()> {
    match snapshot.alias_index.get(name) {
        Some(&owner) if Some(owner) != excluding => Err(ScopesError::AliasTaken {
            alias: name.to_string(),
        }),
        _ => Ok(()),
    }
}

/// `candidate_child` must not already be an ancestor of `parent` (which
/// would make `parent` a descendant of `candidate_child` once reparented,
/// closing a cycle), and a scope may never become its own parent.
pub fn no_cycle(
    snapshot: &ProjectionSnapshot,
    parent: Option<ScopeId>,
    candidate_child: ScopeId,
) -> ScopesResult<()> {
    let Some(parent) = parent else {
        return Ok(());
    };
    if parent == candidate_child {
        return Err(ScopesError::Cycle {
            parent,
            candidate_child,
        });
    }
    let mut ancestors = snapshot.ancestors_of(parent);
    ancestors.push(parent);
    if ancestors.contains(&candidate_child) {
        return Err(ScopesError::Cycle {
            parent,
            candidate_child,
        });
    }
    Ok(())
}

/// Safe to delete an aspect definition only when no live scope references
/// it. Archived scopes do not block deletion (Open Question resolved in
/// DESIGN.md: live-only, not archived-inclusive).
pub fn aspect_not_in_use(snapshot: &ProjectionSnapshot, key: &str) -> ScopesResult<()> {
    let live_scope_count = snapshot.aspect_usage.get(key).copied().unwrap_or(0);
    if live_scope_count > 0 {
        return Err(ScopesError::AspectInUse {
            key: key.to_string(),
            live_scope_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Scope, Title};
    use crate::id::{IdGenerator, UlidGenerator};
    use chrono::Utc;

    fn scope_with(id: ScopeId, parent_id: Option<ScopeId>, title: &str, archived: bool) -> Scope {
        Scope {
            id,
            title: Title::parse(title).unwrap(),
            description: None,
            parent_id,
            aspects: Default::default(),
            canonical_alias: title.to_lowercase(),
            additional_aliases: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            archived,
            version: 1,
        }
    }

    fn snapshot_with(scopes: Vec<Scope>) -> ProjectionSnapshot {
        let mut snapshot = ProjectionSnapshot::default();
        for scope in scopes {
            snapshot
                .parent_index
                .entry(scope.parent_id)
                .or_default()
                .push(scope.id);
            snapshot.alias_index.insert(scope.canonical_alias.clone(), scope.id);
            snapshot.scopes.insert(scope.id, scope);
        }
        snapshot
    }

    #[test]
    fn rejects_duplicate_sibling_title() {
        let parent = UlidGenerator.generate();
        let existing = UlidGenerator.generate();
        let snapshot = snapshot_with(vec![scope_with(existing, Some(parent), "Tasks", false)]);
        assert!(unique_sibling_title(&snapshot, Some(parent), "Tasks", None).is_err());
        assert!(unique_sibling_title(&snapshot, Some(parent), "Tasks", Some(existing)).is_ok());
        assert!(unique_sibling_title(&snapshot, Some(parent), "Other", None).is_ok());
    }

    #[test]
    fn depth_is_checked_against_attempted_not_current_depth() {
        let root = UlidGenerator.generate();
        let snapshot = snapshot_with(vec![scope_with(root, None, "Root", false)]);
        assert!(depth_within_limit(&snapshot, Some(root), Some(1)).is_ok());
        assert!(depth_within_limit(&snapshot, Some(root), Some(0)).is_err());
        assert!(depth_within_limit(&snapshot, None, None).is_ok());
    }

    #[test]
    fn children_limit_counts_only_live_siblings() {
        let parent = UlidGenerator.generate();
        let archived_child = UlidGenerator.generate();
        let snapshot = snapshot_with(vec![scope_with(archived_child, Some(parent), "Gone", true)]);
        assert!(children_within_limit(&snapshot, Some(parent), Some(1)).is_ok());
    }

    #[test]
    fn no_cycle_detects_ancestor_as_proposed_child() {
        let root = UlidGenerator.generate();
        let child = UlidGenerator.generate();
        let mut snapshot = snapshot_with(vec![
            scope_with(root, None, "Root", false),
            scope_with(child, Some(root), "Child", false),
        ]);
        snapshot.parent_index.entry(None).or_default();
        assert!(no_cycle(&snapshot, Some(child), root).is_err());
        assert!(no_cycle(&snapshot, Some(root), child).is_ok());
    }

    #[test]
    fn aspect_in_use_blocks_deletion() {
        let mut snapshot = ProjectionSnapshot::default();
        snapshot.aspect_usage.insert("priority".to_string(), 2);
        assert!(aspect_not_in_use(&snapshot, "priority").is_err());
        assert!(aspect_not_in_use(&snapshot, "unused").is_ok());
    }
}
