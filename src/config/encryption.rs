//! At-rest encryption configuration for entry content and conversation
//! titles (§6.3).

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Encryption configuration for database-resident secrets: entry content
/// and conversation titles. Readers try registered providers in order, to
/// tolerate key rotation (§6.3); `active_provider` selects which one new
/// writes use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct EncryptionConfig {
    /// Whether entry content and conversation titles are encrypted at
    /// rest. An operator may disable this independently of attachment
    /// encryption (§6.3).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Registered providers, in the priority order readers try them.
    /// The first entry is also the provider new writes use.
    #[serde(default)]
    pub providers: Vec<EncryptionProviderConfig>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: Vec::new(),
        }
    }
}

impl EncryptionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.providers.is_empty() {
            return Err(ConfigError::Validation(
                "encryption.enabled is true but no providers are configured".into(),
            ));
        }
        let mut ids: Vec<&str> = self.providers.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::Validation(
                "encryption.providers ids must be unique".into(),
            ));
        }
        Ok(())
    }

    pub fn active(&self) -> Option<&EncryptionProviderConfig> {
        self.providers.first()
    }
}

/// A single registered envelope-encryption provider. The `id` is stamped
/// into the envelope header so a later key rotation can keep decrypting
/// old rows with a provider no longer first in line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct EncryptionProviderConfig {
    /// Stable identifier persisted in the envelope header.
    pub id: String,

    /// Name of the secret (resolved via the configured `SecretManager`)
    /// holding the 32-byte key, base64-encoded.
    pub key_secret_name: String,
}

fn default_true() -> bool {
    true
}
