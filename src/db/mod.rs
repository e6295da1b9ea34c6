mod error;
#[cfg(feature = "database-postgres")]
pub mod postgres;
pub mod repos;
#[cfg(feature = "database-sqlite")]
pub mod sqlite;

#[cfg(all(test, any(feature = "database-sqlite", feature = "database-postgres")))]
pub mod tests;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    groups: Arc<dyn GroupRepo>,
    conversations: Arc<dyn ConversationRepo>,
    memberships: Arc<dyn MembershipRepo>,
    entries: Arc<dyn EntryRepo>,
    transfers: Arc<dyn TransferRepo>,
    attachments: Arc<dyn AttachmentRepo>,
    tasks: Arc<dyn TaskRepo>,
}

enum PoolStorage {
    #[cfg(feature = "database-sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(feature = "database-postgres")]
    Postgres(sqlx::PgPool),
    #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
    _None(std::convert::Infallible),
}

/// Borrowed reference to the underlying database pool.
/// Used for database-specific operations that need direct pool access.
pub enum DbPoolRef<'a> {
    #[cfg(feature = "database-sqlite")]
    Sqlite(&'a sqlx::SqlitePool),
    #[cfg(feature = "database-postgres")]
    Postgres(&'a sqlx::PgPool),
    #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
    _None(std::convert::Infallible, std::marker::PhantomData<&'a ()>),
}

/// Database pool supporting both SQLite and PostgreSQL.
///
/// Repositories are cached at construction time to avoid allocation on each access.
pub struct DbPool {
    inner: PoolStorage,
    repos: CachedRepos,
}

macro_rules! cached_repos_sqlite {
    ($pool:expr) => {
        CachedRepos {
            groups: Arc::new(sqlite::SqliteGroupRepo::new($pool.clone())),
            conversations: Arc::new(sqlite::SqliteConversationRepo::new($pool.clone())),
            memberships: Arc::new(sqlite::SqliteMembershipRepo::new($pool.clone())),
            entries: Arc::new(sqlite::SqliteEntryRepo::new($pool.clone())),
            transfers: Arc::new(sqlite::SqliteTransferRepo::new($pool.clone())),
            attachments: Arc::new(sqlite::SqliteAttachmentRepo::new($pool.clone())),
            tasks: Arc::new(sqlite::SqliteTaskRepo::new($pool.clone())),
        }
    };
}

macro_rules! cached_repos_postgres {
    ($pool:expr) => {
        CachedRepos {
            groups: Arc::new(postgres::PostgresGroupRepo::new($pool.clone())),
            conversations: Arc::new(postgres::PostgresConversationRepo::new($pool.clone())),
            memberships: Arc::new(postgres::PostgresMembershipRepo::new($pool.clone())),
            entries: Arc::new(postgres::PostgresEntryRepo::new($pool.clone())),
            transfers: Arc::new(postgres::PostgresTransferRepo::new($pool.clone())),
            attachments: Arc::new(postgres::PostgresAttachmentRepo::new($pool.clone())),
            tasks: Arc::new(postgres::PostgresTaskRepo::new($pool.clone())),
        }
    };
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool. Primarily useful for testing.
    #[cfg(feature = "database-sqlite")]
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        let repos = cached_repos_sqlite!(pool);
        DbPool {
            inner: PoolStorage::Sqlite(pool),
            repos,
        }
    }

    /// Create a DbPool from an existing PostgreSQL pool. Primarily useful for testing.
    #[cfg(feature = "database-postgres")]
    pub fn from_postgres(pool: sqlx::PgPool) -> Self {
        let repos = cached_repos_postgres!(pool);
        DbPool {
            inner: PoolStorage::Postgres(pool),
            repos,
        }
    }

    /// Create a database pool from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::None => Err(DbError::NotConfigured),
            #[cfg(feature = "database-sqlite")]
            DatabaseConfig::Sqlite(cfg) => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .connect_with(
                        sqlx::sqlite::SqliteConnectOptions::new()
                            .filename(&cfg.path)
                            .create_if_missing(cfg.create_if_missing)
                            .journal_mode(if cfg.wal_mode {
                                sqlx::sqlite::SqliteJournalMode::Wal
                            } else {
                                sqlx::sqlite::SqliteJournalMode::Delete
                            })
                            .busy_timeout(std::time::Duration::from_millis(cfg.busy_timeout_ms)),
                    )
                    .await?;

                let repos = cached_repos_sqlite!(pool);
                Ok(DbPool {
                    inner: PoolStorage::Sqlite(pool),
                    repos,
                })
            }
            #[cfg(feature = "database-postgres")]
            DatabaseConfig::Postgres(cfg) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .min_connections(cfg.min_connections)
                    .max_connections(cfg.max_connections)
                    .acquire_timeout(std::time::Duration::from_secs(cfg.connect_timeout_secs))
                    .idle_timeout(std::time::Duration::from_secs(cfg.idle_timeout_secs))
                    .connect(&cfg.url)
                    .await?;

                let repos = cached_repos_postgres!(pool);
                Ok(DbPool {
                    inner: PoolStorage::Postgres(pool),
                    repos,
                })
            }
        }
    }

    /// Run pending migrations for the active backend.
    pub async fn migrate(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                tracing::info!("running sqlite migrations");
                sqlx::migrate!("./migrations_sqlx/sqlite").run(pool).await?;
                Ok(())
            }
            #[cfg(feature = "database-postgres")]
            PoolStorage::Postgres(pool) => {
                tracing::info!("running postgres migrations");
                sqlx::migrate!("./migrations_sqlx/postgres").run(pool).await?;
                Ok(())
            }
            #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    pub fn groups(&self) -> Arc<dyn GroupRepo> {
        Arc::clone(&self.repos.groups)
    }

    pub fn conversations(&self) -> Arc<dyn ConversationRepo> {
        Arc::clone(&self.repos.conversations)
    }

    pub fn memberships(&self) -> Arc<dyn MembershipRepo> {
        Arc::clone(&self.repos.memberships)
    }

    pub fn entries(&self) -> Arc<dyn EntryRepo> {
        Arc::clone(&self.repos.entries)
    }

    pub fn transfers(&self) -> Arc<dyn TransferRepo> {
        Arc::clone(&self.repos.transfers)
    }

    pub fn attachments(&self) -> Arc<dyn AttachmentRepo> {
        Arc::clone(&self.repos.attachments)
    }

    pub fn tasks(&self) -> Arc<dyn TaskRepo> {
        Arc::clone(&self.repos.tasks)
    }

    /// Get a reference to the underlying database pool.
    pub fn pool(&self) -> DbPoolRef<'_> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => DbPoolRef::Sqlite(pool),
            #[cfg(feature = "database-postgres")]
            PoolStorage::Postgres(pool) => DbPoolRef::Postgres(pool),
            #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    pub async fn health_check(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            #[cfg(feature = "database-postgres")]
            PoolStorage::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }
}
