//! Background worker running annotation cleanup on an interval.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{AnnotationCleanup, DeleteExpiredAnnotationsCommand, RetentionError};
use crate::{config::RetentionConfig, db::DbPool};

/// Starts the retention worker.
///
/// Runs one cleanup pass immediately, then one per interval, until
/// `shutdown` is cancelled. A failed pass is logged and retried on the next
/// tick; a pass in flight at shutdown is rolled back.
pub async fn start_retention_worker(
    db: Arc<DbPool>,
    config: RetentionConfig,
    shutdown: CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Retention worker disabled by configuration");
        return;
    }

    let dry_run_msg = if config.safety.dry_run {
        " (DRY RUN)"
    } else {
        ""
    };

    tracing::info!(
        interval_minutes = config.interval_minutes,
        days_to_keep = config.days_to_keep,
        max_deletes_per_run = config.safety.max_deletes_per_run,
        dry_run = config.safety.dry_run,
        "Starting annotation retention worker{}",
        dry_run_msg
    );

    let interval = config.interval();
    let cleanup = AnnotationCleanup::new(db, config);

    loop {
        match cleanup
            .delete_expired_annotations(DeleteExpiredAnnotationsCommand::default(), &shutdown)
            .await
        {
            Ok(outcome) => {
                if outcome.deleted > 0 {
                    tracing::info!(
                        deleted = outcome.deleted,
                        remaining = outcome.remaining(),
                        "Retention run complete{}",
                        dry_run_msg
                    );
                } else {
                    tracing::debug!(
                        expired = outcome.expired_before,
                        "Retention run complete, nothing deleted{}",
                        dry_run_msg
                    );
                }
            }
            Err(RetentionError::Cancelled) => break,
            Err(e) => {
                tracing::error!(error = %e, "Error running annotation retention");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("Annotation retention worker stopped");
}
