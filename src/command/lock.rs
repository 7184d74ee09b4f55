//! Sharded per-aggregate lock table (spec §5: "sharded map of mutexes keyed
//! on aggregate-id"). Simplified from the hierarchical lock modes in
//! `harborgrid-justin-rusty-db/src/enterprise_optimization/lock_manager_sharded.rs`
//! to the single exclusive mode this spec needs — `DashMap` already shards
//! internally, so no separate shard-index bookkeeping is required here.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ScopeId;

#[derive(Default)]
pub struct LockTable {
    locks: DashMap<ScopeId, Arc<Mutex<()>>>,
}

/// Held for the lifetime of one command's validate-decide-commit transaction.
/// Released on drop — including on early return or panic — never by a
/// manual unlock call.
pub struct AggregateLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, aggregate_id: ScopeId) -> AggregateLockGuard {
        let mutex = self
            .locks
            .entry(aggregate_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        AggregateLockGuard { _guard: guard }
    }
}
