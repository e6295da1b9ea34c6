//! Data retention configuration.
//!
//! Configures automatic purging of soft-deleted conversations and stale
//! spool files. Entries and memberships are never purged by time; they are
//! hard-deleted only as part of a group's cascade delete (§4.1).
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! interval_hours = 24
//!
//! [retention.periods]
//! conversations_deleted_days = 30
//! spool_stale_minutes = 30
//!
//! [retention.safety]
//! dry_run = false
//! max_deletes_per_run = 100000
//! ```

use serde::{Deserialize, Serialize};

/// Data retention configuration.
///
/// Controls automatic purging of old data. When enabled, a background
/// worker periodically hard-deletes conversations past their soft-delete
/// grace period and a startup reaper removes stale spool files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether retention purging is enabled.
    /// Default: false (must be explicitly enabled)
    #[serde(default)]
    pub enabled: bool,

    /// How often to run the retention worker (in hours).
    /// Default: 24 (once per day)
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Retention periods for different data types.
    #[serde(default)]
    pub periods: RetentionPeriods,

    /// Safety settings to prevent accidental data loss.
    #[serde(default)]
    pub safety: RetentionSafety,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            periods: RetentionPeriods::default(),
            safety: RetentionSafety::default(),
        }
    }
}

fn default_interval_hours() -> u64 {
    24
}

/// Retention periods for different data types.
///
/// Set a `_days`/`_minutes` field to 0 to disable retention for that data
/// type (keep forever / never reap).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionPeriods {
    /// Days to keep soft-deleted conversations before hard-deleting them.
    /// Default: 30 days
    #[serde(default = "default_conversations_deleted_days")]
    pub conversations_deleted_days: u32,

    /// Minutes a spool file may sit unclaimed (no live locator) before the
    /// startup reaper removes it. See §4.4.5. Default: 30 minutes.
    #[serde(default = "default_spool_stale_minutes")]
    pub spool_stale_minutes: u32,
}

impl Default for RetentionPeriods {
    fn default() -> Self {
        Self {
            conversations_deleted_days: default_conversations_deleted_days(),
            spool_stale_minutes: default_spool_stale_minutes(),
        }
    }
}

fn default_conversations_deleted_days() -> u32 {
    30
}

fn default_spool_stale_minutes() -> u32 {
    30
}

/// Safety settings for retention operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionSafety {
    /// If true, log what would be deleted without actually deleting.
    #[serde(default)]
    pub dry_run: bool,

    /// Maximum number of records to delete per run. 0 means unlimited.
    /// Default: 100000
    #[serde(default = "default_max_deletes_per_run")]
    pub max_deletes_per_run: u64,

    /// Batch size for delete operations.
    /// Default: 1000
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for RetentionSafety {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_deletes_per_run: default_max_deletes_per_run(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_max_deletes_per_run() -> u64 {
    100_000
}

fn default_batch_size() -> u32 {
    1000
}

impl RetentionConfig {
    /// Check if any retention periods are configured (non-zero).
    pub fn has_any_retention(&self) -> bool {
        self.periods.conversations_deleted_days > 0 || self.periods.spool_stale_minutes > 0
    }

    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_hours * 3600)
    }
}

impl RetentionPeriods {
    /// Check if conversation hard-delete is enabled.
    pub fn should_retain_conversations(&self) -> bool {
        self.conversations_deleted_days > 0
    }

    /// Check if the spool reaper is enabled.
    pub fn should_reap_spools(&self) -> bool {
        self.spool_stale_minutes > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetentionConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.interval_hours, 24);
        assert_eq!(config.periods.conversations_deleted_days, 30);
        assert_eq!(config.periods.spool_stale_minutes, 30);
        assert!(!config.safety.dry_run);
        assert_eq!(config.safety.max_deletes_per_run, 100_000);
        assert_eq!(config.safety.batch_size, 1000);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            enabled = true
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval_hours, 24);
    }

    #[test]
    fn test_parse_disabled_periods() {
        let toml = r#"
            enabled = true

            [periods]
            conversations_deleted_days = 0
            spool_stale_minutes = 0
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert!(!config.periods.should_retain_conversations());
        assert!(!config.periods.should_reap_spools());
        assert!(!config.has_any_retention());
    }

    #[test]
    fn test_interval_duration() {
        let mut config = RetentionConfig::default();
        assert_eq!(config.interval(), std::time::Duration::from_secs(24 * 3600));

        config.interval_hours = 6;
        assert_eq!(config.interval(), std::time::Duration::from_secs(6 * 3600));
    }

    #[test]
    fn test_unlimited_deletes() {
        let toml = r#"
            enabled = true

            [safety]
            max_deletes_per_run = 0
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.safety.max_deletes_per_run, 0);
    }
}
