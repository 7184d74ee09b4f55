//! Disaster-recovery rebuild of the Projection Store from the Event Log
//! (spec §4.5: "must be idempotent and deterministic"). Trimmed from the
//! teacher's `ProjectionRebuildManager`/`RebuildStatistics`
//! (`db/events/projection_rebuild.rs`) down to what a single-process rebuild
//! needs — no distributed checkpointing.

use tracing::{info, warn};

use crate::error::ScopesResult;
use crate::event_log::EventStore;

use super::ProjectionStore;

/// Telemetry for one rebuild pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildStats {
    pub events_processed: u64,
    pub last_sequence: u64,
    pub skipped_unknown_event_types: u64,
}

const REBUILD_BATCH_SIZE: usize = 500;

/// Clears the store and replays the whole log from the beginning. Calling
/// this twice in a row on an unchanged log produces identical projections —
/// the store holds no state that isn't a pure function of the events it has
/// seen.
pub async fn rebuild_from_log(
    store: &ProjectionStore,
    event_store: &dyn EventStore,
) -> ScopesResult<RebuildStats> {
    store.clear();
    let mut stats = RebuildStats::default();
    let mut cursor = 0u64;

    loop {
        let batch = event_store
            .events_since(cursor, Some(REBUILD_BATCH_SIZE))
            .await?;
        if batch.is_empty() {
            break;
        }

        for event in &batch {
            match store.apply_event(event) {
                Ok(()) => {}
                Err(err) => {
                    warn!(
                        aggregate_id = %event.aggregate_id,
                        event_type_id = %event.event_type_id,
                        error = %err,
                        "skipping event during projection rebuild"
                    );
                    stats.skipped_unknown_event_types += 1;
                }
            }
            stats.events_processed += 1;
            cursor = event.sequence_number;
        }

        if batch.len() < REBUILD_BATCH_SIZE {
            break;
        }
    }

    stats.last_sequence = cursor;
    info!(
        events_processed = stats.events_processed,
        last_sequence = stats.last_sequence,
        skipped = stats.skipped_unknown_event_types,
        "projection rebuild complete"
    );
    Ok(stats)
}
