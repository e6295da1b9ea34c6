//! Data retention module for automatic purging of old data.
//!
//! This module provides a background worker that periodically hard-deletes
//! soft-deleted conversations once they pass their grace period. Deletion is
//! batched to avoid long-running transactions and supports dry-run mode for
//! testing retention policies. Stale spool files are reaped separately by
//! `jobs::spool_reaper` at startup.

mod worker;

pub use worker::start_retention_worker;
