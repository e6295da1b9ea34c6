//! Prometheus metrics for the memory service core (`prometheus` feature).
//!
//! Covers the operations §2's component table calls out: entry
//! append/sync, cache hit/miss, Response Resumer lifecycle, search
//! fallback, and the two background workers.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder if `config.enabled`. No-op otherwise,
/// and a no-op entirely when the `prometheus` feature isn't compiled.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("metrics already initialized".to_string()))?;

    Ok(())
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// The handle that renders the Prometheus scrape endpoint's body.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ── Entry Engine (§4.2) ─────────────────────────────────────────────────

/// Entries appended via `AppendEntries`, by channel ("history"/"memory").
pub fn record_entry_appended(channel: &str) {
    #[cfg(feature = "prometheus")]
    counter!("entries_appended_total", "channel" => channel.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = channel;
}

/// A `SyncAgentEntry` decision outcome: "no_op", "append_delta",
/// "append_full", or "append_full_create".
pub fn record_sync_decision(outcome: &str) {
    #[cfg(feature = "prometheus")]
    counter!("sync_agent_entry_decisions_total", "outcome" => outcome.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = outcome;
}

// ── Conversation/Group Store (§4.1) ─────────────────────────────────────

/// A membership or ownership-transfer mutation was recorded: "add",
/// "update", "remove", or "transfer".
pub fn record_membership_mutation(action: &str) {
    #[cfg(feature = "prometheus")]
    counter!("membership_mutations_total", "action" => action.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = action;
}

// ── Memory-Entries Cache (§4.3) ─────────────────────────────────────────

/// Cache lookup result for the latest-epoch memory path: "hit" or "miss".
pub fn record_cache_lookup(result: &str) {
    #[cfg(feature = "prometheus")]
    counter!("memory_entries_cache_lookups_total", "result" => result.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = result;
}

// ── Response Resumer (§4.4) ─────────────────────────────────────────────

/// Update the count of currently-open recordings on this instance.
pub fn set_recordings_open(count: usize) {
    #[cfg(feature = "prometheus")]
    gauge!("resumer_recordings_open").set(count as f64);
    #[cfg(not(feature = "prometheus"))]
    let _ = count;
}

/// A recording transitioned state: "open", "closing", or "closed".
pub fn record_recording_transition(state: &str) {
    #[cfg(feature = "prometheus")]
    counter!("resumer_recording_transitions_total", "state" => state.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = state;
}

/// A `Replay` or `Cancel` call was redirected to another instance.
pub fn record_resumer_redirect() {
    #[cfg(feature = "prometheus")]
    counter!("resumer_redirects_total").increment(1);
}

// ── Search Adapter Boundary (§4.5) ──────────────────────────────────────

/// An `auto` search resolved to "semantic" or fell back to "fulltext".
pub fn record_search_resolution(resolved_to: &str) {
    #[cfg(feature = "prometheus")]
    counter!("search_auto_resolutions_total", "resolved_to" => resolved_to.to_string())
        .increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = resolved_to;
}

// ── Task Queue Boundary (§4.8) ───────────────────────────────────────────

/// Tasks claimed off the queue by a worker.
pub fn record_tasks_claimed(task_type: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    if count > 0 {
        counter!("tasks_claimed_total", "task_type" => task_type.to_string()).increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (task_type, count);
}

/// A claimed task failed and was scheduled for retry.
pub fn record_task_failed(task_type: &str) {
    #[cfg(feature = "prometheus")]
    counter!("tasks_failed_total", "task_type" => task_type.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = task_type;
}

// ── Background workers (retention, spool reaper, vector indexing) ──────

/// Records hard-deleted by the retention worker, by table.
pub fn record_retention_deletion(table: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    if count > 0 {
        counter!("retention_deletions_total", "table" => table.to_string()).increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (table, count);
}

/// Resources deleted by a cleanup job (spool reaper, vector indexing),
/// by resource kind.
pub fn record_cleanup_deletion(resource: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    if count > 0 {
        counter!("cleanup_deletions_total", "resource" => resource.to_string()).increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (resource, count);
}

/// A cleanup job pass failed outright (not a per-item failure).
pub fn record_cleanup_error(job: &str) {
    #[cfg(feature = "prometheus")]
    counter!("cleanup_errors_total", "job" => job.to_string()).increment(1);
    #[cfg(not(feature = "prometheus"))]
    let _ = job;
}

/// Database operation latency/outcome, for basic health dashboards.
pub fn record_db_operation(operation: &str, table: &str, duration_secs: f64, success: bool) {
    #[cfg(feature = "prometheus")]
    {
        let status = if success { "success" } else { "error" };
        counter!(
            "db_operations_total",
            "operation" => operation.to_string(),
            "table" => table.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!(
            "db_operation_duration_seconds",
            "operation" => operation.to_string(),
            "table" => table.to_string()
        )
        .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = (operation, table, duration_secs, success);
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
