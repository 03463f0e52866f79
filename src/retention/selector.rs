use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::RetentionError;
use crate::models::ExpiredAnnotationFilter;

/// Request to delete annotations past their retention window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteExpiredAnnotationsCommand {
    /// Days of history to keep. `None` or `Some(0)` uses the configured default.
    #[serde(default)]
    pub days_to_keep: Option<u32>,
    /// Restrict the run to one organization.
    #[serde(default)]
    pub org_id: Option<i64>,
    /// Restrict the run to one dashboard.
    #[serde(default)]
    pub dashboard_id: Option<i64>,
}

/// Resolved policy for a single cleanup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSelection {
    pub days_to_keep: u32,
    /// Annotations created strictly before this instant are expired.
    pub cutoff: DateTime<Utc>,
    pub filter: ExpiredAnnotationFilter,
}

/// Turns a cleanup command into the predicate the store evaluates.
#[derive(Debug, Clone, Copy)]
pub struct RetentionSelector {
    default_days_to_keep: u32,
}

impl RetentionSelector {
    pub fn new(default_days_to_keep: u32) -> Self {
        Self {
            default_days_to_keep,
        }
    }

    /// Resolve days-to-keep and compute the cutoff relative to `now`.
    ///
    /// Rejects a policy that would expire everything (0 days) or whose
    /// cutoff falls outside the representable time range.
    pub fn resolve(
        &self,
        command: &DeleteExpiredAnnotationsCommand,
        now: DateTime<Utc>,
    ) -> Result<RetentionSelection, RetentionError> {
        let days_to_keep = match command.days_to_keep {
            None | Some(0) => self.default_days_to_keep,
            Some(days) => days,
        };
        if days_to_keep == 0 {
            return Err(RetentionError::Config(
                "days_to_keep must be at least 1".into(),
            ));
        }

        let cutoff = Duration::try_days(i64::from(days_to_keep))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                RetentionError::Config(format!(
                    "days_to_keep ({days_to_keep}) puts the cutoff out of range"
                ))
            })?;

        Ok(RetentionSelection {
            days_to_keep,
            cutoff,
            filter: ExpiredAnnotationFilter {
                cutoff_ms: cutoff.timestamp_millis(),
                org_id: command.org_id,
                dashboard_id: command.dashboard_id,
            },
        })
    }
}
