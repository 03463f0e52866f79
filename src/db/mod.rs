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
    annotations: Arc<dyn AnnotationRepo>,
    tags: Arc<dyn TagRepo>,
}

#[cfg(feature = "database-sqlite")]
impl CachedRepos {
    fn sqlite(pool: &sqlx::SqlitePool) -> Self {
        Self {
            annotations: Arc::new(sqlite::SqliteAnnotationRepo::new(pool.clone())),
            tags: Arc::new(sqlite::SqliteTagRepo::new(pool.clone())),
        }
    }
}

#[cfg(feature = "database-postgres")]
impl CachedRepos {
    fn postgres(pool: &sqlx::PgPool) -> Self {
        Self {
            annotations: Arc::new(postgres::PostgresAnnotationRepo::new(pool.clone())),
            tags: Arc::new(postgres::PostgresTagRepo::new(pool.clone())),
        }
    }
}

enum PoolStorage {
    #[cfg(feature = "database-sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(feature = "database-postgres")]
    Postgres(sqlx::PgPool),
    #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
    _None(std::convert::Infallible),
}

/// Database pool supporting both SQLite and PostgreSQL.
///
/// Repositories are cached at construction time to avoid allocation on each access.
pub struct DbPool {
    inner: PoolStorage,
    repos: CachedRepos,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    #[cfg(feature = "database-sqlite")]
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        DbPool {
            repos: CachedRepos::sqlite(&pool),
            inner: PoolStorage::Sqlite(pool),
        }
    }

    /// Create a DbPool from an existing PostgreSQL pool.
    #[cfg(feature = "database-postgres")]
    pub fn from_postgres(pool: sqlx::PgPool) -> Self {
        DbPool {
            repos: CachedRepos::postgres(&pool),
            inner: PoolStorage::Postgres(pool),
        }
    }

    /// Create a database pool from configuration
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
                            .create_if_missing(true)
                            .journal_mode(if cfg.wal_mode {
                                sqlx::sqlite::SqliteJournalMode::Wal
                            } else {
                                sqlx::sqlite::SqliteJournalMode::Delete
                            })
                            .busy_timeout(std::time::Duration::from_millis(cfg.busy_timeout_ms)),
                    )
                    .await?;

                Ok(Self::from_sqlite(pool))
            }
            #[cfg(feature = "database-postgres")]
            DatabaseConfig::Postgres(cfg) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .acquire_timeout(std::time::Duration::from_secs(cfg.acquire_timeout_secs))
                    .connect(&cfg.url)
                    .await?;

                Ok(Self::from_postgres(pool))
            }
        }
    }

    /// Run database migrations using sqlx's migration runner
    /// This automatically creates and manages a _sqlx_migrations table
    pub async fn run_migrations(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                tracing::info!("Running SQLite migrations");
                sqlx::migrate!("./migrations_sqlx/sqlite").run(pool).await?;
                tracing::info!("SQLite migrations completed successfully");
                Ok(())
            }
            #[cfg(feature = "database-postgres")]
            PoolStorage::Postgres(pool) => {
                tracing::info!("Running PostgreSQL migrations");
                sqlx::migrate!("./migrations_sqlx/postgres").run(pool).await?;
                tracing::info!("PostgreSQL migrations completed successfully");
                Ok(())
            }
            #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    /// Close every underlying pool, waiting for in-flight queries.
    pub async fn close(&self) {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => pool.close().await,
            #[cfg(feature = "database-postgres")]
            PoolStorage::Postgres(pool) => pool.close().await,
            #[cfg(not(any(feature = "database-sqlite", feature = "database-postgres")))]
            PoolStorage::_None(infallible) => match *infallible {},
        }
    }

    /// Get annotation repository
    pub fn annotations(&self) -> Arc<dyn AnnotationRepo> {
        Arc::clone(&self.repos.annotations)
    }

    /// Get tag repository
    pub fn tags(&self) -> Arc<dyn TagRepo> {
        Arc::clone(&self.repos.tags)
    }
}
