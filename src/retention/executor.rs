use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::{
    DeleteExpiredAnnotationsCommand, RetentionError, RetentionSelection, RetentionSelector,
};
use crate::{config::RetentionConfig, db::DbPool, observability::metrics};

/// Result of one cleanup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// Effective retention window
    pub days_to_keep: u32,
    /// Annotations created before this instant were eligible
    pub cutoff: DateTime<Utc>,
    /// Eligible annotations counted before deleting
    pub expired_before: i64,
    /// Annotation rows deleted (always 0 for a dry run)
    pub deleted: u64,
    pub dry_run: bool,
}

impl CleanupOutcome {
    /// Expired annotations left for later runs.
    pub fn remaining(&self) -> i64 {
        let deleted = i64::try_from(self.deleted).unwrap_or(i64::MAX);
        self.expired_before.saturating_sub(deleted).max(0)
    }
}

/// Deletes expired annotations in capped, atomic batches.
///
/// Each call deletes at most `retention.safety.max_deletes_per_run`
/// annotations together with their `annotation_tag` rows. A call that fails,
/// is cancelled or runs past its deadline leaves both tables as they were.
pub struct AnnotationCleanup {
    db: Arc<DbPool>,
    config: RetentionConfig,
}

impl AnnotationCleanup {
    pub fn new(db: Arc<DbPool>, config: RetentionConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Delete annotations older than the command's (or configured)
    /// retention window.
    pub async fn delete_expired_annotations(
        &self,
        command: DeleteExpiredAnnotationsCommand,
        cancel: &CancellationToken,
    ) -> Result<CleanupOutcome, RetentionError> {
        self.delete_expired_annotations_at(command, Utc::now(), cancel)
            .await
    }

    /// Same as [`Self::delete_expired_annotations`] with an explicit clock.
    pub async fn delete_expired_annotations_at(
        &self,
        command: DeleteExpiredAnnotationsCommand,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CleanupOutcome, RetentionError> {
        let result = self.run(command, now, cancel).await;

        match &result {
            Ok(outcome) if outcome.dry_run => metrics::record_retention_run("dry_run"),
            Ok(outcome) => {
                metrics::record_retention_run("success");
                metrics::record_expired_backlog(outcome.remaining());
            }
            Err(e) => metrics::record_retention_run(e.status()),
        }

        result
    }

    async fn run(
        &self,
        command: DeleteExpiredAnnotationsCommand,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CleanupOutcome, RetentionError> {
        let max_deletes = self.config.safety.max_deletes_per_run;
        if max_deletes == 0 {
            return Err(RetentionError::Config(
                "max_deletes_per_run must be at least 1".into(),
            ));
        }

        let selection =
            RetentionSelector::new(self.config.days_to_keep).resolve(&command, now)?;

        let work = self.execute(&selection, max_deletes);
        let bounded = async {
            match self.config.run_timeout() {
                Some(limit) => tokio::time::timeout(limit, work)
                    .await
                    .map_err(|_| RetentionError::TimedOut(limit))?,
                None => work.await,
            }
        };

        // Dropping the in-flight future drops its transaction, which rolls back.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(cutoff = %selection.cutoff, "Annotation cleanup cancelled");
                Err(RetentionError::Cancelled)
            }
            result = bounded => result,
        }
    }

    async fn execute(
        &self,
        selection: &RetentionSelection,
        max_deletes: u64,
    ) -> Result<CleanupOutcome, RetentionError> {
        let repo = self.db.annotations();
        let dry_run = self.config.safety.dry_run;

        let expired_before = repo.count_expired(&selection.filter).await?;

        let mut outcome = CleanupOutcome {
            days_to_keep: selection.days_to_keep,
            cutoff: selection.cutoff,
            expired_before,
            deleted: 0,
            dry_run,
        };

        if expired_before == 0 {
            tracing::debug!(cutoff = %selection.cutoff, "No expired annotations");
            return Ok(outcome);
        }

        if dry_run {
            let would_delete = u64::try_from(expired_before)
                .unwrap_or(0)
                .min(max_deletes);
            tracing::info!(
                cutoff = %selection.cutoff,
                days_to_keep = selection.days_to_keep,
                expired = expired_before,
                would_delete,
                "DRY RUN: Would delete {} expired annotations",
                would_delete
            );
            return Ok(outcome);
        }

        outcome.deleted = repo.delete_expired(&selection.filter, max_deletes).await?;

        if outcome.deleted > 0 {
            tracing::info!(
                deleted = outcome.deleted,
                remaining = outcome.remaining(),
                cutoff = %selection.cutoff,
                days_to_keep = selection.days_to_keep,
                org_id = ?selection.filter.org_id,
                dashboard_id = ?selection.filter.dashboard_id,
                "Deleted expired annotations"
            );
            metrics::record_retention_deletion("annotation", outcome.deleted);
        }

        Ok(outcome)
    }
}
