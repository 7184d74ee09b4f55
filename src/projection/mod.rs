//! Read-optimized views updated transactionally from the Event Log (spec
//! §4.5). Five indices: scope projection, alias index, parent index, aspect
//! usage counts, and a lazily computed tree-depth cache.

pub mod rebuild;

pub use rebuild::{RebuildStats, rebuild_from_log};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{AspectMap, Scope, ScopeEvent, ScopeId};
use crate::error::ScopesResult;
use crate::event_log::StoredEvent;
use crate::ports::{EventSerializer, JsonEventSerializer};

/// A consistent point-in-time read of the indices the Cross-Aggregate
/// Validator needs for one validation pass. Cloned out from under the store's
/// lock so the validator's pure functions never hold it (spec §4.4: acquired
/// under the same serializing lock the Command Pipeline uses, not the
/// projection store's own lock).
#[derive(Debug, Clone, Default)]
pub struct ProjectionSnapshot {
    pub scopes: HashMap<ScopeId, Scope>,
    pub alias_index: HashMap<String, ScopeId>,
    pub parent_index: HashMap<Option<ScopeId>, Vec<ScopeId>>,
    pub aspect_usage: HashMap<String, u64>,
}

impl ProjectionSnapshot {
    pub fn depth_of(&self, id: ScopeId) -> u32 {
        let mut depth = 0;
        let mut current = self.scopes.get(&id).and_then(|s| s.parent_id);
        while let Some(parent_id) = current {
            depth += 1;
            current = self.scopes.get(&parent_id).and_then(|s| s.parent_id);
        }
        depth
    }

    pub fn children_of(&self, parent: Option<ScopeId>) -> &[ScopeId] {
        self.parent_index
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ancestors_of(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut ancestors = Vec::new();
        let mut current = self.scopes.get(&id).and_then(|s| s.parent_id);
        while let Some(parent_id) = current {
            ancestors.push(parent_id);
            current = self.scopes.get(&parent_id).and_then(|s| s.parent_id);
        }
        ancestors
    }
}

#[derive(Default)]
struct Inner {
    scopes: HashMap<ScopeId, Scope>,
    alias_index: HashMap<String, ScopeId>,
    parent_index: HashMap<Option<ScopeId>, Vec<ScopeId>>,
    aspect_usage: HashMap<String, u64>,
}

impl Inner {
    fn insert_child_sorted(&mut self, parent: Option<ScopeId>, child: ScopeId) {
        let scopes = &self.scopes;
        let siblings = self.parent_index.entry(parent).or_default();
        if siblings.contains(&child) {
            return;
        }
        let position = siblings
            .iter()
            .position(|existing| {
                created_at_of(scopes, *existing) > created_at_of(scopes, child)
            })
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
    }

    fn remove_child(&mut self, parent: Option<ScopeId>, child: ScopeId) {
        if let Some(siblings) = self.parent_index.get_mut(&parent) {
            siblings.retain(|existing| *existing != child);
        }
    }

    fn adjust_aspect_usage(&mut self, key: &str, delta: i64) {
        let count = self.aspect_usage.entry(key.to_string()).or_insert(0);
        if delta >= 0 {
            *count += delta as u64;
        } else {
            *count = count.saturating_sub((-delta) as u64);
        }
    }

    /// Recompute alias/parent/aspect indices for one aggregate's transition
    /// from `previous` to `updated`. Both are whole-scope snapshots, so the
    /// diff is a plain set comparison rather than an event-specific branch —
    /// this keeps the projection logic independent of which event caused it.
    fn reindex(&mut self, previous: Option<&Scope>, updated: &Scope) {
        let previous_aliases: Vec<String> = match previous {
            Some(s) if !s.archived => s.all_aliases().into_iter().map(str::to_string).collect(),
            _ => Vec::new(),
        };
        let updated_aliases: Vec<String> = if updated.archived {
            Vec::new()
        } else {
            updated.all_aliases().into_iter().map(str::to_string).collect()
        };
        for alias in &previous_aliases {
            if !updated_aliases.contains(alias) {
                self.alias_index.remove(alias);
            }
        }
        for alias in &updated_aliases {
            self.alias_index.insert(alias.clone(), updated.id);
        }

        let previous_parent = previous.map(|s| s.parent_id);
        if previous_parent != Some(updated.parent_id) {
            if let Some(old_parent) = previous_parent {
                self.remove_child(old_parent, updated.id);
            }
        }
        self.scopes.insert(updated.id, updated.clone());
        self.insert_child_sorted(updated.parent_id, updated.id);

        let previous_live_keys: Vec<String> = match previous {
            Some(s) if !s.archived => s.aspects.keys().cloned().collect(),
            _ => Vec::new(),
        };
        let updated_live_keys: Vec<String> = if updated.archived {
            Vec::new()
        } else {
            updated.aspects.keys().cloned().collect()
        };
        for key in &previous_live_keys {
            if !updated_live_keys.contains(key) {
                self.adjust_aspect_usage(key, -1);
            }
        }
        for key in &updated_live_keys {
            if !previous_live_keys.contains(key) {
                self.adjust_aspect_usage(key, 1);
            }
        }
    }
}

fn created_at_of(scopes: &HashMap<ScopeId, Scope>, id: ScopeId) -> chrono::DateTime<chrono::Utc> {
    scopes
        .get(&id)
        .map(|s| s.created_at)
        .unwrap_or_else(chrono::Utc::now)
}

/// The Projection Store: five read models kept in lockstep with the Event
/// Log via [`apply_event`](Self::apply_event), consulted by the Cross-
/// Aggregate Validator through [`snapshot`](Self::snapshot) and by read APIs
/// directly.
pub struct ProjectionStore {
    inner: Mutex<Inner>,
    serializer: Arc<dyn EventSerializer>,
}

impl Default for ProjectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionStore {
    pub fn new() -> Self {
        Self::with_serializer(Arc::new(JsonEventSerializer))
    }

    pub fn with_serializer(serializer: Arc<dyn EventSerializer>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            serializer,
        }
    }

    /// Fold one stored event into the projections. Unknown event types are a
    /// hard error, matching the Replayer's policy — a projection must never
    /// silently drift from the log it claims to mirror.
    pub fn apply_event(&self, stored: &StoredEvent) -> ScopesResult<()> {
        let event = self
            .serializer
            .deserialize(&stored.event_type_id, &stored.payload)?;

        let mut inner = self.inner.lock();
        let previous = inner.scopes.get(&stored.aggregate_id).cloned();
        let updated = crate::aggregate::apply(previous.clone(), &event, stored)?;
        inner.reindex(previous.as_ref(), &updated);
        Ok(())
    }

    pub fn scope(&self, id: ScopeId) -> Option<Scope> {
        self.inner.lock().scopes.get(&id).cloned()
    }

    pub fn resolve_alias(&self, name: &str) -> Option<ScopeId> {
        self.inner.lock().alias_index.get(name).copied()
    }

    pub fn aspects_of(&self, id: ScopeId) -> Option<AspectMap> {
        self.inner.lock().scopes.get(&id).map(|s| s.aspects.clone())
    }

    pub fn aspect_usage_count(&self, key: &str) -> u64 {
        self.inner
            .lock()
            .aspect_usage
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Paginated, creation-ordered children of `parent` (or of the forest
    /// roots when `parent` is `None`).
    pub fn children(&self, parent: Option<ScopeId>, offset: usize, limit: usize) -> Vec<ScopeId> {
        let inner = self.inner.lock();
        inner
            .parent_index
            .get(&parent)
            .map(|ids| ids.iter().skip(offset).take(limit).copied().collect())
            .unwrap_or_default()
    }

    pub fn depth_of(&self, id: ScopeId) -> u32 {
        self.snapshot().depth_of(id)
    }

    /// Take a consistent clone of all four indices for the validator.
    pub fn snapshot(&self) -> ProjectionSnapshot {
        let inner = self.inner.lock();
        ProjectionSnapshot {
            scopes: inner.scopes.clone(),
            alias_index: inner.alias_index.clone(),
            parent_index: inner.parent_index.clone(),
            aspect_usage: inner.aspect_usage.clone(),
        }
    }

    /// Drop all projected state. Used before a full rebuild-from-log.
    pub fn clear(&self) {
        *self.inner.lock() = Inner::default();
    }
}
