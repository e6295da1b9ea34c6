//! Background job configuration (§4.2.6, §4.8): periodic workers that run
//! alongside the core rather than configuration the core's operations
//! themselves consume.

use serde::{Deserialize, Serialize};

/// Configuration for the vector indexing worker, which claims HISTORY
/// entries pending embedding through the Task Queue Boundary and calls
/// the Search Adapter Boundary's `upsertEmbedding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct VectorIndexingConfig {
    /// Whether the worker runs at all. Disabling it leaves entries
    /// unindexed; semantic search over them returns nothing until it is
    /// re-enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How often the worker sweeps for pending entries and processes
    /// claimed tasks, in seconds. Default: 30.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum entries/tasks handled per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for VectorIndexingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    100
}

/// Top-level container for background job configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    #[serde(default)]
    pub vector_indexing: VectorIndexingConfig,
}
