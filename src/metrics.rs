//! Prometheus metrics, gated behind the `monitoring` feature (ambient stack
//! carried even though the distilled spec's Non-goals exclude a metrics
//! surface — only the feature's *scope*, not the engineering practice,
//! is out). Trimmed down from the teacher's `core::error::metrics`
//! (`ErrorMetrics`, a `lazy_static` global registered against a
//! `prometheus::Registry`) to the counters this engine actually emits.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Opts, Registry};

lazy_static! {
    static ref METRICS: EngineMetrics = EngineMetrics::new();
}

pub struct EngineMetrics {
    pub commands_total: CounterVec,
    pub version_conflicts_total: Counter,
    pub sync_conflicts_total: CounterVec,
    pub events_appended_total: Counter,
}

impl EngineMetrics {
    fn new() -> Self {
        let commands_total = CounterVec::new(
            Opts::new("scopes_commands_total", "Commands executed by outcome"),
            &["outcome"],
        )
        .expect("failed to create commands_total metric");

        let version_conflicts_total = Counter::new(
            "scopes_version_conflicts_total",
            "Version conflicts encountered during command commit",
        )
        .expect("failed to create version_conflicts_total metric");

        let sync_conflicts_total = CounterVec::new(
            Opts::new("scopes_sync_conflicts_total", "Sync conflicts by kind"),
            &["kind"],
        )
        .expect("failed to create sync_conflicts_total metric");

        let events_appended_total = Counter::new(
            "scopes_events_appended_total",
            "Events appended to the event log",
        )
        .expect("failed to create events_appended_total metric");

        Self {
            commands_total,
            version_conflicts_total,
            sync_conflicts_total,
            events_appended_total,
        }
    }

    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.commands_total.clone()))?;
        registry.register(Box::new(self.version_conflicts_total.clone()))?;
        registry.register(Box::new(self.sync_conflicts_total.clone()))?;
        registry.register(Box::new(self.events_appended_total.clone()))?;
        Ok(())
    }
}

pub fn metrics() -> &'static EngineMetrics {
    &METRICS
}

pub fn record_command_outcome(outcome: &str) {
    metrics().commands_total.with_label_values(&[outcome]).inc();
}

pub fn record_version_conflict() {
    metrics().version_conflicts_total.inc();
}

pub fn record_sync_conflict(kind: &str) {
    metrics().sync_conflicts_total.with_label_values(&[kind]).inc();
}

pub fn record_event_appended() {
    metrics().events_appended_total.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_can_be_created_and_incremented_without_panicking() {
        record_command_outcome("success");
        record_version_conflict();
        record_sync_conflict("concurrent-modification");
        record_event_appended();
        assert!(metrics().commands_total.with_label_values(&["success"]).get() >= 1.0);
    }
}
