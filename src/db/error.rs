use thiserror::Error;

/// Errors raised by the annotation and tag stores.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not configured")]
    NotConfigured,

    /// Input rejected before touching the database
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connectivity, lock timeouts, constraint failures. The surrounding
    /// transaction has been rolled back when this is returned.
    #[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The `tags` column held something other than a JSON string array
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;
