//! Command Pipeline: the three-phase transaction every mutation goes through
//! (spec §4.3) — preflight/resolve, validate-and-decide, commit. Bounded
//! retry on version conflict reloads and re-decides rather than surfacing
//! a transient race to the caller.

pub mod lock;

pub use lock::{AggregateLockGuard, LockTable};

use std::sync::Arc;

use tracing::warn;

use crate::aggregate::{self, AggregateReplayer};
use crate::clock::Clock;
use crate::config::Config;
use crate::domain::alias::slugify;
use crate::domain::{DeviceId, ScopeCommand, ScopeId, Title};
use crate::error::{ScopesError, ScopesResult};
use crate::event_log::{EventStore, NewEvent, StoredEvent};
use crate::id::IdGenerator;
use crate::ports::{EventSerializer, JsonEventSerializer};
use crate::projection::{ProjectionSnapshot, ProjectionStore};
use crate::validator;
use crate::vector_clock::VectorClock;

pub struct CommandPipeline {
    local_device_id: DeviceId,
    config: Config,
    id_gen: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    event_log: Arc<dyn EventStore>,
    projections: Arc<ProjectionStore>,
    serializer: Arc<dyn EventSerializer>,
    locks: LockTable,
    local_vector_clock: parking_lot::Mutex<VectorClock>,
}

impl CommandPipeline {
    pub fn new(
        local_device_id: DeviceId,
        config: Config,
        id_gen: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        event_log: Arc<dyn EventStore>,
        projections: Arc<ProjectionStore>,
    ) -> Self {
        Self::with_serializer(
            local_device_id,
            config,
            id_gen,
            clock,
            event_log,
            projections,
            Arc::new(JsonEventSerializer),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_serializer(
        local_device_id: DeviceId,
        config: Config,
        id_gen: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        event_log: Arc<dyn EventStore>,
        projections: Arc<ProjectionStore>,
        serializer: Arc<dyn EventSerializer>,
    ) -> Self {
        Self {
            local_device_id,
            config,
            id_gen,
            clock,
            event_log,
            projections,
            serializer,
            locks: LockTable::new(),
            local_vector_clock: parking_lot::Mutex::new(VectorClock::new()),
        }
    }

    /// Run one command through validate-decide-commit, retrying on version
    /// conflict up to `Config::append_retries` times. Returns the id of the
    /// aggregate the command targeted (or the newly minted id for
    /// `CreateScope`).
    pub async fn execute(&self, command: ScopeCommand) -> ScopesResult<ScopeId> {
        let aggregate_id = command.target().unwrap_or_else(|| self.id_gen.generate());
        let _guard: AggregateLockGuard = self.locks.acquire(aggregate_id).await;

        let replayer =
            AggregateReplayer::with_serializer(self.event_log.as_ref(), self.serializer.clone());
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let snapshot = self.projections.snapshot();
            self.validate(&snapshot, &command, aggregate_id)?;

            let loaded = replayer.try_load(aggregate_id).await?;
            let current_version = loaded.as_ref().map(|l| l.version).unwrap_or(0);
            let state = loaded.as_ref().map(|l| &l.scope);

            let events = aggregate::decide(state, &command)?;
            if events.is_empty() {
                return Ok(aggregate_id);
            }

            match self
                .commit(aggregate_id, events, current_version + 1)
                .await
            {
                Ok(_) => {
                    #[cfg(feature = "monitoring")]
                    crate::metrics::record_command_outcome("success");
                    return Ok(aggregate_id);
                }
                Err(ScopesError::VersionConflict { .. }) if attempt < self.config.append_retries => {
                    #[cfg(feature = "monitoring")]
                    crate::metrics::record_version_conflict();
                    warn!(
                        aggregate_id = %aggregate_id,
                        attempt,
                        "version conflict, reloading and retrying"
                    );
                    continue;
                }
                Err(other) => {
                    #[cfg(feature = "monitoring")]
                    crate::metrics::record_command_outcome("failure");
                    return Err(other);
                }
            }
        }
    }

    /// Pure cross-aggregate checks before the aggregate is even loaded —
    /// keeps an obviously-invalid command from paying for a replay.
    fn validate(
        &self,
        snapshot: &ProjectionSnapshot,
        command: &ScopeCommand,
        aggregate_id: ScopeId,
    ) -> ScopesResult<()> {
        match command {
            ScopeCommand::CreateScope {
                title,
                parent_id,
                canonical_alias,
                ..
            } => {
                let title = Title::parse(title.clone())?;
                validator::unique_sibling_title(snapshot, *parent_id, title.as_str(), None)?;
                validator::depth_within_limit(snapshot, *parent_id, self.config.max_depth)?;
                validator::children_within_limit(snapshot, *parent_id, self.config.max_children)?;
                let alias = canonical_alias
                    .clone()
                    .unwrap_or_else(|| slugify(title.as_str()));
                validator::alias_globally_unique(snapshot, &alias, None)?;
                Ok(())
            }
            ScopeCommand::RenameScope { title, .. } => {
                let parent = snapshot.scopes.get(&aggregate_id).and_then(|s| s.parent_id);
                validator::unique_sibling_title(snapshot, parent, title, Some(aggregate_id))
            }
            ScopeCommand::ReparentScope { new_parent_id, .. } => {
                validator::no_cycle(snapshot, *new_parent_id, aggregate_id)?;
                validator::depth_within_limit(snapshot, *new_parent_id, self.config.max_depth)?;
                validator::children_within_limit(snapshot, *new_parent_id, self.config.max_children)
            }
            ScopeCommand::AddAlias { name, .. } | ScopeCommand::SetCanonicalAlias { name, .. } => {
                validator::alias_globally_unique(snapshot, name, Some(aggregate_id))
            }
            ScopeCommand::SetDescription { .. }
            | ScopeCommand::SetAspect { .. }
            | ScopeCommand::RemoveAspect { .. }
            | ScopeCommand::RemoveAlias { .. }
            | ScopeCommand::ArchiveScope { .. }
            | ScopeCommand::UnarchiveScope { .. } => Ok(()),
        }
    }

    /// Whether an aspect-definition key is safe to delete: no live scope may
    /// reference it (spec §4.4 `aspect-not-in-use`). Aspect definitions are
    /// a host-managed registry, not an event-sourced aggregate, so this is a
    /// direct snapshot read rather than a full command transaction.
    pub fn can_delete_aspect_definition(&self, key: &str) -> ScopesResult<()> {
        validator::aspect_not_in_use(&self.projections.snapshot(), key)
    }

    async fn commit(
        &self,
        aggregate_id: ScopeId,
        events: Vec<crate::domain::ScopeEvent>,
        mut expected_version: u64,
    ) -> ScopesResult<Vec<StoredEvent>> {
        let mut stored_events = Vec::with_capacity(events.len());
        for event in events {
            let vector_clock = {
                let mut clock = self.local_vector_clock.lock();
                clock.increment(&self.local_device_id);
                clock.clone()
            };
            let new_event = NewEvent {
                event_id: self.id_gen.generate(),
                aggregate_id,
                event_type_id: event.event_type_id().to_string(),
                payload: self.serializer.serialize(&event)?,
                occurred_at: self.clock.now(),
                stored_at: self.clock.now(),
                origin_device_id: self.local_device_id.clone(),
                vector_clock,
            };
            let stored = self.event_log.append(new_event, expected_version).await?;
            self.projections.apply_event(&stored)?;
            #[cfg(feature = "monitoring")]
            crate::metrics::record_event_appended();
            stored_events.push(stored);
            expected_version += 1;
        }
        Ok(stored_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::AspectValue;
    use crate::event_log::InMemoryEventStore;
    use crate::id::UlidGenerator;

    fn pipeline() -> CommandPipeline {
        CommandPipeline::new(
            "device-a".to_string(),
            Config::default(),
            Arc::new(UlidGenerator),
            Arc::new(SystemClock),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(ProjectionStore::new()),
        )
    }

    #[tokio::test]
    async fn create_scope_succeeds_and_is_queryable_via_projection() {
        let pipeline = pipeline();
        let id = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "Tasks".to_string(),
                parent_id: None,
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap();
        assert_eq!(pipeline.projections.resolve_alias("tasks"), Some(id));
    }

    #[tokio::test]
    async fn duplicate_sibling_title_is_rejected() {
        let pipeline = pipeline();
        pipeline
            .execute(ScopeCommand::CreateScope {
                title: "Tasks".to_string(),
                parent_id: None,
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap();

        let err = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "Tasks".to_string(),
                parent_id: None,
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ScopesError::DuplicateSiblingTitle { .. }));
    }

    #[tokio::test]
    async fn depth_limit_is_enforced_on_attempted_depth() {
        let mut config = Config::default();
        config.max_depth = Some(1);
        let pipeline = CommandPipeline::new(
            "device-a".to_string(),
            config,
            Arc::new(UlidGenerator),
            Arc::new(SystemClock),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(ProjectionStore::new()),
        );

        let root = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "Root".to_string(),
                parent_id: None,
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap();
        let child = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "Child".to_string(),
                parent_id: Some(root),
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap();

        let err = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "Grandchild".to_string(),
                parent_id: Some(child),
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ScopesError::DepthExceeded { .. }));
    }

    #[tokio::test]
    async fn reparent_that_would_cycle_is_rejected() {
        let pipeline = pipeline();
        let a = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "A".to_string(),
                parent_id: None,
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap();
        let b = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "B".to_string(),
                parent_id: Some(a),
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap();

        let err = pipeline
            .execute(ScopeCommand::ReparentScope {
                id: a,
                new_parent_id: Some(b),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ScopesError::Cycle { .. }));
    }

    #[tokio::test]
    async fn set_and_remove_aspect_round_trip() {
        let pipeline = pipeline();
        let id = pipeline
            .execute(ScopeCommand::CreateScope {
                title: "Tasks".to_string(),
                parent_id: None,
                description: None,
                canonical_alias: None,
            })
            .await
            .unwrap();
        pipeline
            .execute(ScopeCommand::SetAspect {
                id,
                key: "priority".to_string(),
                values: vec![AspectValue::Ordinal("high".to_string())],
            })
            .await
            .unwrap();
        assert_eq!(pipeline.projections.aspect_usage_count("priority"), 1);
        assert!(pipeline.can_delete_aspect_definition("priority").is_err());

        pipeline
            .execute(ScopeCommand::RemoveAspect {
                id,
                key: "priority".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(pipeline.projections.aspect_usage_count("priority"), 0);
        assert!(pipeline.can_delete_aspect_definition("priority").is_ok());
    }
}
