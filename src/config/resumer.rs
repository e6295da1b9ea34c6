//! Response Resumer configuration (§4.4): where spool recordings are
//! stored and how the cross-instance locator behaves.

use serde::{Deserialize, Serialize};

/// Response Resumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ResumerConfig {
    /// Whether streaming responses are recorded for resumption at all
    /// (§4.4.6 `isResumerEnabled`). When disabled, callers must fall back
    /// to a non-resumable stream.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory spool files are written under. Each in-flight response
    /// gets its own file, named by response id.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,

    /// Maximum number of concurrent open recordings before new streams
    /// are rejected rather than recorded (still served live, just not
    /// resumable).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_recordings: usize,

    /// How often a live instance refreshes its locator's advertisement
    /// TTL in the cache (§4.4.2). Default: 5 seconds.
    #[serde(default = "default_locator_refresh_secs")]
    pub locator_refresh_secs: u64,

    /// TTL set on a locator entry each refresh; if an instance dies
    /// without releasing, the locator expires and the recording is
    /// considered abandoned after this long without a refresh (§4.4.2).
    /// Default: 10 seconds.
    #[serde(default = "default_locator_ttl_secs")]
    pub locator_ttl_secs: u64,
}

impl Default for ResumerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            spool_dir: default_spool_dir(),
            max_concurrent_recordings: default_max_concurrent(),
            locator_refresh_secs: default_locator_refresh_secs(),
            locator_ttl_secs: default_locator_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_spool_dir() -> String {
    "/var/lib/memoryd/spool".to_string()
}

fn default_max_concurrent() -> usize {
    10_000
}

fn default_locator_refresh_secs() -> u64 {
    5
}

fn default_locator_ttl_secs() -> u64 {
    10
}

impl ResumerConfig {
    /// Refresh interval as a [`std::time::Duration`].
    pub fn locator_refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.locator_refresh_secs)
    }

    /// Locator TTL as a [`std::time::Duration`].
    pub fn locator_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.locator_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enabled() {
        let cfg = ResumerConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.max_concurrent_recordings, 10_000);
        assert_eq!(cfg.locator_refresh_secs, 5);
        assert_eq!(cfg.locator_ttl_secs, 10);
    }

    #[test]
    fn parses_custom_locator_timings() {
        let toml = r#"
            locator_refresh_secs = 3
            locator_ttl_secs = 9
        "#;
        let cfg: ResumerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.locator_refresh_interval(), std::time::Duration::from_secs(3));
        assert_eq!(cfg.locator_ttl(), std::time::Duration::from_secs(9));
    }
}
