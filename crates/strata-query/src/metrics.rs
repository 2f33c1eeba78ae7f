//! Query metrics.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Query Metrics
// ============================================================================

/// Queries rejected before reaching the remote, labelled by reason.
pub const QUERY_REJECTIONS: &str = "strata_query_rejections_total";

/// Queries that succeeded with zero rows.
pub const QUERY_NO_DATA: &str = "strata_query_no_data_total";

/// Remote execution time of a query.
pub const QUERY_DURATION: &str = "strata_query_duration_seconds";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all query metric descriptions.
pub fn register_metrics() {
    describe_counter!(QUERY_REJECTIONS, "Total queries rejected by reason");
    describe_counter!(QUERY_NO_DATA, "Total queries returning no rows");
    describe_histogram!(QUERY_DURATION, "Query execution time in seconds");
}

// ============================================================================
// Recording
// ============================================================================

/// Records a rejected query (`range` or `invalid_input`).
pub fn record_rejection(reason: &'static str) {
    counter!(QUERY_REJECTIONS, "reason" => reason).increment(1);
}

/// Records an empty result.
pub fn record_no_data(cube: &str) {
    counter!(QUERY_NO_DATA, "cube" => cube.to_string()).increment(1);
}

/// Records how long the remote took to answer.
pub fn record_query_duration(cube: &str, duration_secs: f64) {
    histogram!(QUERY_DURATION, "cube" => cube.to_string()).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        register_metrics();
        record_rejection("range");
        record_no_data("keyword_stats");
        record_query_duration("keyword_stats", 0.25);
    }
}
