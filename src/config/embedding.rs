//! Embedding provider configuration, for the semantic search boundary
//! (§3.1 Non-goals: the providers themselves are external; this is only
//! the wiring the core needs to call one).

use serde::{Deserialize, Serialize};

/// Embedding provider configuration. Absent means semantic search is
/// unavailable and the Search Adapter Boundary falls back to fulltext or
/// empty results (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: Option<EmbeddingProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct EmbeddingProviderConfig {
    /// Name of the secret holding the provider API key.
    pub api_key_secret_name: String,

    /// Model identifier passed to the provider, e.g. `text-embedding-3-small`.
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}
