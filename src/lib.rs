/*!
# Scopes

A local-first, event-sourced engine for organizing work and knowledge into a
tree of named scopes, designed to stay correct while the same data is edited
offline on more than one device at once.

## Overview

- [`domain`]: the Scope entity, its commands and events, and the small value
  types (titles, aliases, aspects) that constrain them.
- [`event_log`]: the append-only, versioned event store every aggregate is
  rebuilt from.
- [`aggregate`]: the pure `apply`/`decide` functions and the replayer that
  folds a stream of stored events into current state.
- [`projection`]: read-optimized views (alias index, parent index, aspect
  usage counts, depth cache) kept transactionally in step with the log.
- [`validator`]: cross-aggregate invariants no single aggregate can check on
  its own (sibling uniqueness, depth and fan-out limits, cycles).
- [`resolver`]: turns a user-supplied reference — id or alias — into a
  concrete scope id.
- [`command`]: the transactional pipeline (lock, validate, decide, commit,
  retry) every mutation goes through.
- [`sync`]: multi-device synchronization — push/pull, vector-clock conflict
  detection, and pluggable resolution strategies.
- [`vector_clock`]: the causality tracking structure sync conflict detection
  is built on.
- [`config`], [`clock`], [`id`], [`error`]: the ambient configuration, time,
  identifier generation, and error-taxonomy layers the rest of the crate is
  built against.
- [`ports`]: the injectable event-serializer port (peer transport and the
  event store's own port trait live in [`sync::transport`] and [`event_log`]
  respectively).

## Example

```rust
use scopes::{CommandPipeline, Config};
use scopes::clock::SystemClock;
use scopes::event_log::InMemoryEventStore;
use scopes::id::UlidGenerator;
use scopes::projection::ProjectionStore;
use scopes::domain::ScopeCommand;
use std::sync::Arc;

# async fn run() -> scopes::error::ScopesResult<()> {
let pipeline = CommandPipeline::new(
    "device-a".to_string(),
    Config::default(),
    Arc::new(UlidGenerator),
    Arc::new(SystemClock),
    Arc::new(InMemoryEventStore::new()),
    Arc::new(ProjectionStore::new()),
);

pipeline
    .execute(ScopeCommand::CreateScope {
        title: "Tasks".to_string(),
        parent_id: None,
        description: None,
        canonical_alias: None,
    })
    .await?;
# Ok(())
# }
```
*/

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod event_log;
pub mod id;
#[cfg(feature = "monitoring")]
pub mod metrics;
pub mod ports;
pub mod projection;
pub mod resolver;
pub mod sync;
pub mod validator;
pub mod vector_clock;

pub use command::CommandPipeline;
pub use config::Config;
pub use domain::{Scope, ScopeCommand, ScopeEvent};
pub use error::{ScopesError, ScopesResult};
pub use projection::ProjectionStore;
pub use sync::SyncEngine;
pub use vector_clock::VectorClock;

/// Routes `tracing` output (warn!/info! from the command pipeline and sync
/// engine) to the test harness's own capture instead of stdout, so `cargo
/// test -- --nocapture` shows retry/conflict logs inline with the failing
/// test. Safe to call from multiple tests — `try_init` ignores the "already
/// set" error from a prior call in the same process.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .try_init();
}
