//! At-rest encryption envelope for entry content and conversation titles
//! (§6.3): 4-byte magic `MSEH`, a header encoding provider id and nonce,
//! then ciphertext. Readers try registered providers in priority order
//! so a key rotation can keep decrypting rows written under a provider
//! that is no longer first in line; writers always use the active
//! (first) provider.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use thiserror::Error;

use crate::config::EncryptionConfig;
use crate::secrets::SecretManager;

const MAGIC: &[u8; 4] = b"MSEH";
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption disabled")]
    Disabled,

    #[error("no encryption providers registered")]
    NoProviders,

    #[error("unknown envelope provider id: {0}")]
    UnknownProvider(String),

    #[error("envelope is malformed: {0}")]
    MalformedEnvelope(String),

    #[error("cipher failure")]
    Cipher,

    #[error("secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

pub type EncryptionResult<T> = Result<T, EncryptionError>;

struct Provider {
    id: String,
    cipher: ChaCha20Poly1305,
}

/// Holds every registered provider and knows which one is active for new
/// writes. Construct once at startup via [`EnvelopeService::from_config`].
pub struct EnvelopeService {
    enabled: bool,
    active: Option<String>,
    providers: HashMap<String, Provider>,
}

impl EnvelopeService {
    /// Resolves provider keys from the configured `SecretManager` and
    /// builds the provider registry. When `enabled` is false the service
    /// passes content through unmodified.
    pub async fn from_config(
        config: &EncryptionConfig,
        secrets: &Arc<dyn SecretManager>,
    ) -> EncryptionResult<Self> {
        if !config.enabled {
            return Ok(Self {
                enabled: false,
                active: None,
                providers: HashMap::new(),
            });
        }
        if config.providers.is_empty() {
            return Err(EncryptionError::NoProviders);
        }

        let mut providers = HashMap::with_capacity(config.providers.len());
        for provider_cfg in &config.providers {
            let key_b64 = secrets
                .get(&provider_cfg.key_secret_name)
                .await?
                .ok_or_else(|| {
                    EncryptionError::InvalidKey(format!(
                        "secret {} not found",
                        provider_cfg.key_secret_name
                    ))
                })?;
            let key_bytes = BASE64
                .decode(key_b64.trim())
                .map_err(|e| EncryptionError::InvalidKey(e.to_string()))?;
            if key_bytes.len() != 32 {
                return Err(EncryptionError::InvalidKey(format!(
                    "provider {} key must decode to 32 bytes, got {}",
                    provider_cfg.id,
                    key_bytes.len()
                )));
            }
            let cipher = ChaCha20Poly1305::new_from_slice(&key_bytes)
                .map_err(|_| EncryptionError::InvalidKey(provider_cfg.id.clone()))?;
            providers.insert(
                provider_cfg.id.clone(),
                Provider {
                    id: provider_cfg.id.clone(),
                    cipher,
                },
            );
        }

        let active = config.active().map(|p| p.id.clone());
        Ok(Self {
            enabled: true,
            active,
            providers,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Encrypt `plaintext` under the active provider, returning the
    /// envelope bytes. Pass-through when encryption is disabled.
    pub fn encrypt(&self, plaintext: &[u8]) -> EncryptionResult<Vec<u8>> {
        if !self.enabled {
            return Ok(plaintext.to_vec());
        }
        let active_id = self.active.as_ref().ok_or(EncryptionError::NoProviders)?;
        let provider = self
            .providers
            .get(active_id)
            .ok_or(EncryptionError::NoProviders)?;

        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = provider
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| EncryptionError::Cipher)?;

        let id_bytes = provider.id.as_bytes();
        let mut envelope =
            Vec::with_capacity(4 + 1 + id_bytes.len() + NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(MAGIC);
        envelope.push(id_bytes.len() as u8);
        envelope.extend_from_slice(id_bytes);
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    /// Decrypt an envelope, trying the provider named in its header.
    /// Pass-through when encryption is disabled (the caller is
    /// responsible for not mixing disabled/enabled states at rest).
    pub fn decrypt(&self, envelope: &[u8]) -> EncryptionResult<Vec<u8>> {
        if !self.enabled {
            return Ok(envelope.to_vec());
        }
        if envelope.len() < 5 || &envelope[0..4] != MAGIC {
            return Err(EncryptionError::MalformedEnvelope(
                "missing MSEH magic".into(),
            ));
        }
        let id_len = envelope[4] as usize;
        let id_start = 5;
        let id_end = id_start + id_len;
        let nonce_end = id_end + NONCE_LEN;
        if envelope.len() < nonce_end {
            return Err(EncryptionError::MalformedEnvelope(
                "truncated header".into(),
            ));
        }
        let provider_id = std::str::from_utf8(&envelope[id_start..id_end])
            .map_err(|_| EncryptionError::MalformedEnvelope("non-utf8 provider id".into()))?;
        let provider = self
            .providers
            .get(provider_id)
            .ok_or_else(|| EncryptionError::UnknownProvider(provider_id.to_string()))?;

        let nonce = Nonce::from_slice(&envelope[id_end..nonce_end]);
        let ciphertext = &envelope[nonce_end..];
        provider
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| EncryptionError::Cipher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncryptionProviderConfig;
    use crate::secrets::MemorySecretManager;

    async fn service_with_providers(ids: &[&str]) -> EnvelopeService {
        let secrets = MemorySecretManager::new();
        let mut providers = Vec::new();
        for id in ids {
            let key = BASE64.encode([7u8; 32]);
            secrets.set(&format!("key_{id}"), &key).await.unwrap();
            providers.push(EncryptionProviderConfig {
                id: id.to_string(),
                key_secret_name: format!("key_{id}"),
            });
        }
        let config = EncryptionConfig {
            enabled: true,
            providers,
        };
        let secrets: Arc<dyn SecretManager> = Arc::new(secrets);
        EnvelopeService::from_config(&config, &secrets)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn round_trips_through_active_provider() {
        let service = service_with_providers(&["p1"]).await;
        let envelope = service.encrypt(b"hello world").unwrap();
        assert_eq!(&envelope[0..4], MAGIC);
        let plaintext = service.decrypt(&envelope).unwrap();
        assert_eq!(plaintext, b"hello world");
    }

    #[tokio::test]
    async fn decrypt_tries_non_active_provider_by_header_id() {
        let service = service_with_providers(&["new", "old"]).await;
        let envelope = service.encrypt(b"rotated content").unwrap();
        assert_eq!(&envelope[5..8], b"new");

        let rotated = service_with_providers(&["old"]).await;
        let err = rotated.decrypt(&envelope).unwrap_err();
        assert!(matches!(err, EncryptionError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn disabled_service_passes_through() {
        let config = EncryptionConfig {
            enabled: false,
            providers: Vec::new(),
        };
        let secrets: Arc<dyn SecretManager> = Arc::new(MemorySecretManager::new());
        let service = EnvelopeService::from_config(&config, &secrets).await.unwrap();
        let out = service.encrypt(b"plain").unwrap();
        assert_eq!(out, b"plain");
    }

    #[tokio::test]
    async fn malformed_envelope_is_rejected() {
        let service = service_with_providers(&["p1"]).await;
        let err = service.decrypt(b"not an envelope").unwrap_err();
        assert!(matches!(err, EncryptionError::MalformedEnvelope(_)));
    }
}
