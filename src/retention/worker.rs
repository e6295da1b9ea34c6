//! Retention worker for hard-deleting soft-deleted conversations past
//! their grace period.
//!
//! Entries and memberships are never purged by time; they are hard-deleted
//! only as part of a group's cascade delete (§4.1). Spool file staleness
//! is handled separately by a one-shot startup reaper, not this periodic
//! worker, since it has nothing to poll on an interval for.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{config::RetentionConfig, db::DbPool, observability::metrics};

/// Results from a single retention run.
#[derive(Debug, Default)]
pub struct RetentionRunResult {
    /// Number of conversations hard-deleted.
    pub conversations_deleted: u64,
}

impl RetentionRunResult {
    /// Total number of records deleted across all tables.
    pub fn total(&self) -> u64 {
        self.conversations_deleted
    }

    /// Check if any records were deleted.
    pub fn has_deletions(&self) -> bool {
        self.total() > 0
    }
}

/// Starts the retention worker as a background task.
///
/// The worker runs in a loop, purging old data at the configured interval.
/// It will run indefinitely until the task is cancelled.
pub async fn start_retention_worker(db: Arc<DbPool>, config: RetentionConfig) {
    if !config.enabled {
        tracing::info!("retention worker disabled by configuration");
        return;
    }

    if !config.has_any_retention() {
        tracing::info!("retention worker enabled but no retention periods configured");
        return;
    }

    let dry_run_msg = if config.safety.dry_run {
        " (dry run)"
    } else {
        ""
    };

    tracing::info!(
        interval_hours = config.interval_hours,
        conversations_deleted_days = config.periods.conversations_deleted_days,
        dry_run = config.safety.dry_run,
        "starting retention worker{}",
        dry_run_msg
    );

    let interval = config.interval();

    loop {
        match run_retention(&db, &config).await {
            Ok(result) => {
                if result.has_deletions() {
                    tracing::info!(
                        conversations = result.conversations_deleted,
                        dry_run = config.safety.dry_run,
                        "retention run complete{}",
                        dry_run_msg
                    );
                } else {
                    tracing::debug!("retention run complete, no records to delete");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "error running retention");
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// Run a single retention pass.
async fn run_retention(
    db: &Arc<DbPool>,
    config: &RetentionConfig,
) -> Result<RetentionRunResult, Box<dyn std::error::Error + Send + Sync>> {
    let mut result = RetentionRunResult::default();

    if config.periods.should_retain_conversations() {
        result.conversations_deleted = delete_conversations(db, config).await?;
    }

    Ok(result)
}

/// Hard-delete conversations that were soft-deleted before the retention period.
async fn delete_conversations(
    db: &Arc<DbPool>,
    config: &RetentionConfig,
) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
    let cutoff = Utc::now() - Duration::days(config.periods.conversations_deleted_days as i64);

    if config.safety.dry_run {
        tracing::info!(
            cutoff = %cutoff,
            "dry run: would hard-delete soft-deleted conversations before {}",
            cutoff
        );
        return Ok(0);
    }

    let max_deletes = if config.safety.max_deletes_per_run == 0 {
        u64::MAX
    } else {
        config.safety.max_deletes_per_run
    };

    let deleted = db
        .conversations()
        .hard_delete_soft_deleted_before(cutoff, config.safety.batch_size, max_deletes)
        .await?;

    if deleted > 0 {
        tracing::debug!(
            deleted = deleted,
            cutoff = %cutoff,
            "hard-deleted soft-deleted conversations"
        );
        metrics::record_retention_deletion("conversations", deleted);
    }

    Ok(deleted)
}
