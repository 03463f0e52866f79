//! Annotation retention.
//!
//! A cleanup run resolves the retention window into a cutoff
//! ([`RetentionSelector`]), then deletes at most
//! `retention.safety.max_deletes_per_run` annotations created before it,
//! together with their tag associations, in a single transaction
//! ([`AnnotationCleanup`]). Larger backlogs drain over successive runs of the
//! background worker, lowest ids first.
//!
//! Tag rows are never deleted here, even when no annotation references them
//! any more.

mod executor;
mod selector;
mod worker;

use std::time::Duration;

pub use executor::{AnnotationCleanup, CleanupOutcome};
pub use selector::{DeleteExpiredAnnotationsCommand, RetentionSelection, RetentionSelector};
pub use worker::start_retention_worker;

use crate::db::DbError;

/// Errors from a cleanup run. In every case no partial delete persists.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    /// The policy was rejected before anything was deleted
    #[error("Invalid retention policy: {0}")]
    Config(String),

    /// The store failed; the run's transaction was rolled back
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Cleanup cancelled")]
    Cancelled,

    #[error("Cleanup exceeded its deadline of {0:?}")]
    TimedOut(Duration),
}

impl RetentionError {
    /// Label used for the `status` of the runs metric.
    pub fn status(&self) -> &'static str {
        match self {
            RetentionError::Config(_) | RetentionError::Storage(_) => "error",
            RetentionError::Cancelled => "cancelled",
            RetentionError::TimedOut(_) => "timeout",
        }
    }
}
