//! Search Adapter Boundary configuration (§4.5).

use serde::{Deserialize, Serialize};

/// Which search backends are wired up. `auto` resolution at the boundary
/// tries semantic first, then falls back to fulltext, then returns empty
/// (§4.5); this config only controls which backends are *available* to
/// try.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Enable semantic (vector) search. Requires an embedding provider.
    #[serde(default)]
    pub semantic_enabled: bool,

    /// Enable full-text search.
    #[serde(default)]
    pub fulltext_enabled: bool,
}

impl SearchConfig {
    /// Search types currently available, for `unavailable` error messages
    /// when a caller requests a type that isn't wired up (§7).
    pub fn available_types(&self) -> Vec<&'static str> {
        let mut types = Vec::new();
        if self.semantic_enabled {
            types.push("semantic");
        }
        if self.fulltext_enabled {
            types.push("fulltext");
        }
        types
    }
}
