//! Startup spool reaper (§4.4.5).
//!
//! Response Resumer spool files are written under `ResumerConfig.spool_dir`
//! and normally cleaned up by the recorder once every reader and writer
//! has detached. A crash can leave one behind with no live locator entry;
//! on startup, this sweeps the directory once and deletes any file whose
//! modification time is older than `spool_stale_minutes`. It is not a
//! periodic worker — a stale file can only appear around a restart, so
//! there is nothing to gain from polling.

use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::{config::ResumerConfig, observability::metrics};

/// Results from a single reap pass.
#[derive(Debug, Default)]
pub struct ReapResult {
    pub files_deleted: u64,
    pub files_skipped: u64,
}

impl ReapResult {
    pub fn has_deletions(&self) -> bool {
        self.files_deleted > 0
    }
}

/// Deletes spool files older than `stale_after` under `resumer.spool_dir`.
/// Missing directories are treated as nothing-to-do, not an error — a
/// fresh deployment may not have created the spool directory yet.
pub async fn reap_stale_spools(resumer: &ResumerConfig, stale_after: Duration) -> ReapResult {
    let dir = resumer.spool_dir.clone();
    let result = tokio::task::spawn_blocking(move || reap_dir(Path::new(&dir), stale_after)).await;

    match result {
        Ok(reap) => {
            if reap.has_deletions() {
                tracing::info!(
                    deleted = reap.files_deleted,
                    skipped = reap.files_skipped,
                    "reaped stale spool files"
                );
                metrics::record_cleanup_deletion("spool_files", reap.files_deleted);
            } else {
                tracing::debug!("spool reaper found nothing stale");
            }
            reap
        }
        Err(e) => {
            tracing::error!(error = %e, "spool reaper task panicked");
            metrics::record_cleanup_error("spool_reaper");
            ReapResult::default()
        }
    }
}

fn reap_dir(dir: &Path, stale_after: Duration) -> ReapResult {
    let mut result = ReapResult::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return result,
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "failed to read spool directory");
            return result;
        }
    };

    let now = SystemTime::now();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(_) => {
                result.files_skipped += 1;
                continue;
            }
        };

        let age = match metadata.modified().and_then(|m| {
            now.duration_since(m)
                .map_err(|e| std::io::Error::other(e.to_string()))
        }) {
            Ok(age) => age,
            Err(_) => {
                result.files_skipped += 1;
                continue;
            }
        };

        if age < stale_after {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), age_secs = age.as_secs(), "removed stale spool file");
                result.files_deleted += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove stale spool file");
                result.files_skipped += 1;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    #[tokio::test]
    async fn reaps_files_older_than_threshold() {
        let dir = tempfile::tempdir().unwrap();

        let stale_path = dir.path().join("stale.spool");
        fs::File::create(&stale_path).unwrap().write_all(b"stale").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let resumer = ResumerConfig {
            spool_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };

        let result = reap_stale_spools(&resumer, Duration::from_millis(10)).await;

        assert_eq!(result.files_deleted, 1);
        assert!(!stale_path.exists());
    }

    #[tokio::test]
    async fn leaves_files_younger_than_threshold() {
        let dir = tempfile::tempdir().unwrap();

        let fresh_path = dir.path().join("fresh.spool");
        fs::File::create(&fresh_path).unwrap().write_all(b"fresh").unwrap();

        let resumer = ResumerConfig {
            spool_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };

        let result = reap_stale_spools(&resumer, Duration::from_secs(1800)).await;

        assert_eq!(result.files_deleted, 0);
        assert!(fresh_path.exists());
    }

    #[tokio::test]
    async fn missing_directory_is_not_an_error() {
        let resumer = ResumerConfig {
            spool_dir: "/nonexistent/path/for/test".to_string(),
            ..Default::default()
        };

        let result = reap_stale_spools(&resumer, Duration::from_secs(1800)).await;
        assert_eq!(result.files_deleted, 0);
        assert_eq!(result.files_skipped, 0);
    }
}
