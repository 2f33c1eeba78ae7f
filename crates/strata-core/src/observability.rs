//! Logging initialization and span helpers.
//!
//! Sync passes and query executions each get a span carrying the registry,
//! cube and request id so log lines from concurrent work can be told apart.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// Logs are written to stderr. `RUST_LOG` controls levels (e.g. `info`,
/// `strata_sync=debug`).
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                    .try_init();
            }
        }
    });
}

/// Creates a span for metadata sync operations.
#[must_use]
pub fn sync_span(operation: &str, registry: &str) -> Span {
    tracing::info_span!("sync", op = operation, registry = registry)
}

/// Creates a span for query compilation and execution.
#[must_use]
pub fn query_span(operation: &str, cube: &str, request_id: &str) -> Span {
    tracing::info_span!(
        "query",
        op = operation,
        cube = cube,
        request_id = request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn span_helpers_create_spans() {
        let span = sync_span("refresh_registry", "prod");
        let _guard = span.enter();
        tracing::info!("inside sync span");

        let span = query_span("compile", "keyword_stats", "rid-1");
        let _guard = span.enter();
        tracing::info!("inside query span");
    }
}
