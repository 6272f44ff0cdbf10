//! Structured logging configuration.
//!
//! Installs a tracing subscriber; `log` records from the library are bridged
//! into it, so library and daemon lines share one format and filter.

use open_bracket::tournament::PassReport;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Slow-pass threshold for [`log_performance`]
const SLOW_OPERATION_MS: u64 = 1000;

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info,sqlx=warn`.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log the outcome of one status recompute pass
pub fn log_scheduler_pass(report: PassReport) {
    let duration_ms = report.elapsed.as_millis() as u64;
    let changed = report.changed;
    if report.failed {
        tracing::error!(duration_ms = duration_ms, "Status recompute pass failed");
    } else if changed > 0 {
        tracing::info!(
            changed = changed,
            duration_ms = duration_ms,
            "Status recompute pass updated tournaments"
        );
    } else {
        tracing::debug!(duration_ms = duration_ms, "Status recompute pass, no changes");
    }
    log_performance("status_recompute", duration_ms, None);
}

/// Log performance metric, at warn level past one second
pub fn log_performance(operation: &str, duration_ms: u64, metadata: Option<&str>) {
    if duration_ms > SLOW_OPERATION_MS {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "PERFORMANCE: Slow operation"
        );
    } else {
        tracing::debug!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "Performance metric"
        );
    }
}
