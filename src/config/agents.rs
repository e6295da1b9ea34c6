//! Agent identity configuration (§6.5): maps an agent's API key to the
//! `clientId` it writes MEMORY entries as. Auth itself (verifying the key
//! belongs to the caller) is an external boundary (§3.1 Non-goals); this
//! is only the resulting key→clientId table the core consults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Agent identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AgentsConfig {
    /// Registered agents, keyed by the name of the secret holding their
    /// API key.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl AgentsConfig {
    /// Resolve the `clientId` that writes under the given API key secret
    /// name should be attributed to.
    pub fn client_id_for_secret(&self, secret_name: &str) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| a.api_key_secret_name == secret_name)
            .map(|a| a.client_id.as_str())
    }

    /// Build a lookup table from secret name to `clientId`.
    pub fn to_map(&self) -> HashMap<String, String> {
        self.agents
            .iter()
            .map(|a| (a.api_key_secret_name.clone(), a.client_id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Name of the secret holding this agent's API key.
    pub api_key_secret_name: String,

    /// The `clientId` this agent's MEMORY writes are attributed to
    /// (§4.2.2: epochs are scoped per `(conversationId, clientId)`).
    pub client_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_client_id_by_secret_name() {
        let cfg = AgentsConfig {
            agents: vec![AgentConfig {
                api_key_secret_name: "agent-a-key".into(),
                client_id: "agent-a".into(),
            }],
        };
        assert_eq!(cfg.client_id_for_secret("agent-a-key"), Some("agent-a"));
        assert_eq!(cfg.client_id_for_secret("unknown"), None);
    }
}
