//! Core library for a multi-tenant conversation memory service: a
//! fork-tree data engine for conversation entries and epoch-versioned
//! agent memory, a Response Resumer for in-flight streaming replies, and
//! a group-scoped access-control boundary.
//!
//! This crate is the engine; it owns no wire protocol. A shell (HTTP/gRPC
//! server, CLI, test harness) embeds [`AppState`] and dispatches requests
//! into [`engine`] and [`services`] after resolving a [`access::CallerIdentity`].

pub mod access;
pub mod cache;
pub mod config;
pub mod db;
pub mod encryption;
pub mod engine;
pub mod error;
pub mod events;
pub mod jobs;
pub mod models;
pub mod observability;
pub mod retention;
pub mod search;
pub mod secrets;
pub mod services;
pub mod streaming;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    access::AccessChecker,
    cache::{Cache, MemoryCache, MemoryEntriesCache, ResumerLocator},
    config::{CacheConfig, CoreConfig, SecretsConfig},
    db::DbPool,
    encryption::{EncryptionError, EnvelopeService},
    events::EventBus,
    search::{SearchResolver, fulltext::FulltextSearchBackend},
    secrets::{EnvSecretManager, MemorySecretManager, SecretManager},
    engine::EntryEngine,
    services::{ConversationService, MembershipService, TransferService},
    streaming::ResumerRegistry,
};

/// Everything a shell needs to serve requests: repositories, the access
/// checker, the encryption envelope, caches, the event bus, search, and
/// the Response Resumer registry.
///
/// Constructed once at startup from [`CoreConfig`] via [`AppState::new`].
/// Local mode (no `database` section configured) is supported for tests
/// and single-shot tooling; `db` is `None` in that case and every
/// operation that needs storage returns [`error::CoreError::Unavailable`].
pub struct AppState {
    pub config: CoreConfig,
    pub db: Arc<DbPool>,
    pub cache: Arc<dyn Cache>,
    pub secrets: Arc<dyn SecretManager>,
    pub encryption: Arc<EnvelopeService>,
    pub access: Arc<AccessChecker>,
    pub memory_entries_cache: Arc<MemoryEntriesCache>,
    pub resumer_locator: Arc<ResumerLocator>,
    pub search: Arc<SearchResolver>,
    pub events: Arc<EventBus>,
    pub resumer: Arc<ResumerRegistry>,
    pub entries: Arc<EntryEngine>,
    pub conversations: Arc<ConversationService>,
    pub memberships: Arc<MembershipService>,
    pub transfers: Arc<TransferService>,
}

#[derive(Debug, Error)]
pub enum AppStateError {
    #[error("database: {0}")]
    Db(#[from] db::DbError),

    #[error("cache: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("encryption: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error("no database configured: AppState requires `database` to be set")]
    LocalMode,
}

impl AppState {
    /// Builds every piece that can be constructed purely from
    /// configuration. Semantic search needs a concrete `EmbeddingProvider`,
    /// which is a deployment-specific external collaborator (§1 Non-goals
    /// in the source spec this crate implements); callers that have one
    /// should build their own [`SearchResolver`] and replace
    /// `AppState::search` after construction.
    pub async fn new(config: CoreConfig) -> Result<Self, AppStateError> {
        config.validate()?;

        if config.is_local_mode() {
            return Err(AppStateError::LocalMode);
        }
        let db = Arc::new(DbPool::from_config(&config.database).await?);

        let cache: Arc<dyn Cache> = match &config.cache {
            CacheConfig::None => Arc::new(MemoryCache::new(&config::MemoryCacheConfig::default())),
            CacheConfig::Memory(memory_config) => Arc::new(MemoryCache::new(memory_config)),
            #[cfg(feature = "redis-backend")]
            CacheConfig::Redis(redis_config) => {
                Arc::new(cache::RedisCache::from_config(redis_config).await?)
            }
        };

        let secrets: Arc<dyn SecretManager> = match &config.secrets {
            SecretsConfig::None => Arc::new(MemorySecretManager::new()),
            SecretsConfig::Env => Arc::new(EnvSecretManager),
            #[allow(unreachable_patterns)]
            _ => Arc::new(MemorySecretManager::new()),
        };

        let encryption = Arc::new(EnvelopeService::from_config(&config.encryption, &secrets).await?);

        let ttl = config.cache.ttl();
        let memory_entries_cache = Arc::new(MemoryEntriesCache::new(
            cache.clone(),
            std::time::Duration::from_secs(ttl.memory_entries_secs),
        ));
        let resumer_locator = Arc::new(ResumerLocator::new(
            cache.clone(),
            config.resumer.locator_ttl(),
        ));

        let access = Arc::new(AccessChecker::new(db.memberships()));
        let fulltext: Option<Box<dyn search::SearchBackend>> = if config.search.fulltext_enabled {
            Some(Box::new(FulltextSearchBackend::new(db.entries())))
        } else {
            None
        };
        let search = Arc::new(SearchResolver::new(config.search.clone(), None, fulltext));

        let events = Arc::new(EventBus::new());
        let resumer = Arc::new(ResumerRegistry::new(
            config.resumer.clone(),
            resumer_locator.clone(),
            events.clone(),
        ));

        let entries = Arc::new(EntryEngine::new(
            db.clone(),
            access.clone(),
            encryption.clone(),
            memory_entries_cache.clone(),
        ));
        let conversations = Arc::new(ConversationService::new(
            db.clone(),
            access.clone(),
            encryption.clone(),
            events.clone(),
        ));
        let memberships = Arc::new(MembershipService::new(db.clone(), access.clone(), events.clone()));
        let transfers = Arc::new(TransferService::new(db.clone(), access.clone(), events.clone()));

        Ok(Self {
            config,
            db,
            cache,
            secrets,
            encryption,
            access,
            memory_entries_cache,
            resumer_locator,
            search,
            events,
            resumer,
            entries,
            conversations,
            memberships,
            transfers,
        })
    }

    /// Runs pending database migrations.
    pub async fn migrate(&self) -> Result<(), db::DbError> {
        self.db.migrate().await
    }
}
