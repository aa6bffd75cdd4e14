// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Bootstrap outcome and duration
//! - Save/Delete outcomes
//! - Follower poll ticks and reload diffs
//! - Published snapshot size and generation
//! - Store retries
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `rewriter_registry_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! # Usage
//!
//! ```rust,no_run
//! use rewriter_registry::metrics;
//! use std::time::Duration;
//!
//! metrics::record_poll_tick("products", "unchanged");
//! metrics::record_reload("products", 1, 0, 2, 10, Duration::from_millis(40));
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Record a bootstrap attempt.
pub fn record_bootstrap(tenant: &str, success: bool, rewriters: usize, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "rewriter_registry_bootstraps_total",
        "tenant" => tenant.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("rewriter_registry_bootstrap_duration_seconds", "tenant" => tenant.to_string())
        .record(duration.as_secs_f64());
    if success {
        histogram!("rewriter_registry_bootstrap_rewriters", "tenant" => tenant.to_string())
            .record(rewriters as f64);
    }
}

/// Gauge for registry state.
pub fn set_registry_state(tenant: &str, state: &str) {
    let value = match state {
        "Created" => 0.0,
        "Bootstrapping" => 1.0,
        "Running" => 2.0,
        "ShuttingDown" => 3.0,
        "Stopped" => 4.0,
        "Failed" => 5.0,
        _ => -1.0,
    };
    gauge!("rewriter_registry_state", "tenant" => tenant.to_string()).set(value);
}

// =============================================================================
// Mutation Metrics
// =============================================================================

/// Record a Save/Delete outcome.
///
/// Outcomes: `ok`, `rejected_role`, `invalid`, `not_found`, `store_error`.
pub fn record_mutation(tenant: &str, operation: &'static str, outcome: &'static str) {
    counter!(
        "rewriter_registry_mutations_total",
        "tenant" => tenant.to_string(),
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a failed validation and how many reasons it produced.
pub fn record_validation_failure(tenant: &str, reasons: usize) {
    counter!("rewriter_registry_validation_failures_total", "tenant" => tenant.to_string())
        .increment(1);
    histogram!("rewriter_registry_validation_reasons", "tenant" => tenant.to_string())
        .record(reasons as f64);
}

/// Record a change listener notification.
pub fn record_listener_notified(tenant: &str) {
    counter!("rewriter_registry_listener_notifications_total", "tenant" => tenant.to_string())
        .increment(1);
}

// =============================================================================
// Follower Polling Metrics
// =============================================================================

/// Record a poll tick outcome.
///
/// Outcomes: `unchanged`, `reloaded`, `regressed`, `store_error`, `compile_drift`.
pub fn record_poll_tick(tenant: &str, outcome: &str) {
    counter!(
        "rewriter_registry_poll_ticks_total",
        "tenant" => tenant.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a completed reload with its diff against the previous snapshot.
pub fn record_reload(
    tenant: &str,
    added: usize,
    updated: usize,
    removed: usize,
    unchanged: usize,
    duration: Duration,
) {
    let tenant = tenant.to_string();

    counter!("rewriter_registry_reloads_total", "tenant" => tenant.clone()).increment(1);
    counter!("rewriter_registry_reload_added_total", "tenant" => tenant.clone())
        .increment(added as u64);
    counter!("rewriter_registry_reload_updated_total", "tenant" => tenant.clone())
        .increment(updated as u64);
    counter!("rewriter_registry_reload_removed_total", "tenant" => tenant.clone())
        .increment(removed as u64);
    counter!("rewriter_registry_reload_reused_total", "tenant" => tenant.clone())
        .increment(unchanged as u64);

    histogram!("rewriter_registry_reload_duration_seconds", "tenant" => tenant)
        .record(duration.as_secs_f64());
}

// =============================================================================
// Snapshot Metrics
// =============================================================================

/// Record a snapshot publication.
pub fn set_snapshot(tenant: &str, rewriters: usize, generation: u64) {
    gauge!("rewriter_registry_snapshot_rewriters", "tenant" => tenant.to_string())
        .set(rewriters as f64);
    gauge!("rewriter_registry_snapshot_generation", "tenant" => tenant.to_string())
        .set(generation as f64);
    counter!("rewriter_registry_snapshots_published_total", "tenant" => tenant.to_string())
        .increment(1);
}

// =============================================================================
// Store Metrics
// =============================================================================

/// Record a retried store operation (transient failure or SQLITE_BUSY).
pub fn record_store_retry(operation: &str) {
    counter!("rewriter_registry_store_retries_total", "operation" => operation.to_string())
        .increment(1);
}

/// Record store operation latency.
pub fn record_store_latency(operation: &'static str, duration: Duration) {
    histogram!("rewriter_registry_store_operation_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests verify the metrics functions don't panic.
    // Actual metric values would need a test recorder to verify.

    #[test]
    fn test_record_bootstrap() {
        record_bootstrap("t", true, 12, Duration::from_millis(30));
        record_bootstrap("t", false, 0, Duration::from_secs(2));
    }

    #[test]
    fn test_set_registry_state_all_states() {
        for state in [
            "Created",
            "Bootstrapping",
            "Running",
            "ShuttingDown",
            "Stopped",
            "Failed",
            "Unknown",
        ] {
            set_registry_state("t", state);
        }
    }

    #[test]
    fn test_record_mutation() {
        record_mutation("t", "save", "ok");
        record_mutation("t", "delete", "not_found");
        record_mutation("t", "save", "rejected_role");
    }

    #[test]
    fn test_record_validation_failure() {
        record_validation_failure("t", 3);
    }

    #[test]
    fn test_record_listener_notified() {
        record_listener_notified("t");
    }

    #[test]
    fn test_record_poll_tick() {
        record_poll_tick("t", "unchanged");
        record_poll_tick("t", "store_error");
    }

    #[test]
    fn test_record_reload() {
        record_reload("t", 1, 2, 3, 4, Duration::from_millis(5));
        record_reload("t", 0, 0, 0, 0, Duration::ZERO);
    }

    #[test]
    fn test_set_snapshot() {
        set_snapshot("t", 10, 42);
    }

    #[test]
    fn test_store_metrics() {
        record_store_retry("store_write");
        record_store_latency("current_generation", Duration::from_micros(200));
    }
}
