//! Sync metrics.
//!
//! Counters and histograms for refresh passes. These complement the
//! structured logs emitted by the engine.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Refresh Metrics
// ============================================================================

/// Cube sync attempts, labelled by registry and outcome (`ok` / `error`).
pub const CUBES_SYNCED: &str = "strata_cubes_synced_total";

/// Cubes deleted because the remote no longer exposes them.
pub const CUBES_PRUNED: &str = "strata_cubes_pruned_total";

/// Duration of a full registry refresh pass.
pub const REGISTRY_REFRESH_DURATION: &str = "strata_registry_refresh_seconds";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all sync metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(CUBES_SYNCED, "Total cube sync attempts by outcome");
    describe_counter!(CUBES_PRUNED, "Total cubes pruned during refresh");
    describe_histogram!(
        REGISTRY_REFRESH_DURATION,
        "Duration of registry refresh passes in seconds"
    );
}

// ============================================================================
// Recording
// ============================================================================

/// Records the outcome of one cube sync.
pub fn record_cube_synced(registry: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        CUBES_SYNCED,
        "registry" => registry.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Records cubes pruned by a refresh pass.
pub fn record_cubes_pruned(registry: &str, count: usize) {
    counter!(CUBES_PRUNED, "registry" => registry.to_string())
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Records the duration of a completed refresh pass.
pub fn record_refresh_duration(registry: &str, duration_secs: f64) {
    histogram!(REGISTRY_REFRESH_DURATION, "registry" => registry.to_string())
        .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        register_metrics();
        record_cube_synced("prod", true);
        record_cube_synced("prod", false);
        record_cubes_pruned("prod", 3);
        record_refresh_duration("prod", 0.25);
    }
}
