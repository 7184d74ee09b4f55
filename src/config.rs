//! Explicit configuration passed through construction.
//!
//! Per the Design Notes, this crate has no singletons and no global mutable
//! state: every tunable (hierarchy limits, retry bounds, timeouts, default
//! conflict strategy) is a field on [`Config`], constructed once by the host
//! and threaded through the pipeline, projection store, and sync engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::ConflictStrategy;

/// Maximum title length accepted by the domain model's parser.
pub const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum parent-chain depth a scope may be created/moved to.
    /// `None` means unlimited.
    pub max_depth: Option<u32>,
    /// Maximum number of direct children a scope may have.
    /// `None` means unlimited.
    pub max_children: Option<u32>,
    /// Bounded retries for version-conflict reload-and-retry in the Command
    /// Pipeline.
    pub append_retries: u32,
    /// Per-sync-session timeout applied to push and pull.
    pub sync_timeout: Duration,
    /// Strategy used when a sync session doesn't pin one explicitly.
    pub conflict_strategy_default: ConflictStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_children: None,
            append_retries: 3,
            sync_timeout: Duration::from_secs(30),
            conflict_strategy_default: ConflictStrategy::LastWriteWins,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.append_retries == 0 {
            return Err("append_retries must be at least 1".to_string());
        }
        if self.sync_timeout.is_zero() {
            return Err("sync_timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
