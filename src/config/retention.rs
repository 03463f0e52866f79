//! Annotation retention configuration.
//!
//! Controls how long annotations are kept and how much a single cleanup run
//! may delete.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! interval_minutes = 10
//! days_to_keep = 30
//!
//! [retention.safety]
//! dry_run = false
//! max_deletes_per_run = 900
//! run_timeout_secs = 60
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Days of annotation history kept when neither the config nor the cleanup
/// command specifies a value.
pub const DEFAULT_DAYS_TO_KEEP: u32 = 30;

/// Annotation rows a single cleanup run may delete by default.
pub const DEFAULT_MAX_DELETES_PER_RUN: u64 = 900;

/// Annotation retention configuration.
///
/// When enabled, a background worker periodically deletes annotations
/// created more than `days_to_keep` days ago.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether the background cleanup worker runs.
    /// Default: false (must be explicitly enabled)
    #[serde(default)]
    pub enabled: bool,

    /// How often the worker runs a cleanup pass (in minutes).
    /// Default: 10
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Days of annotations to keep. Used whenever a cleanup command does not
    /// carry its own value (or carries 0).
    /// Default: 30
    #[serde(default = "default_days_to_keep")]
    pub days_to_keep: u32,

    /// Safety settings bounding each cleanup run.
    #[serde(default)]
    pub safety: RetentionSafety,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval_minutes(),
            days_to_keep: default_days_to_keep(),
            safety: RetentionSafety::default(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    10
}

fn default_days_to_keep() -> u32 {
    DEFAULT_DAYS_TO_KEEP
}

/// Safety settings for retention runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionSafety {
    /// If true, log what would be deleted without deleting anything.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Maximum number of annotations deleted per run. Bounds the size of the
    /// cleanup transaction and the rows it locks. Must be at least 1.
    /// Default: 900
    #[serde(default = "default_max_deletes_per_run")]
    pub max_deletes_per_run: u64,

    /// Deadline for a single run in seconds. A run exceeding it is abandoned
    /// and its transaction rolled back. 0 disables the deadline.
    /// Default: 60
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for RetentionSafety {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_deletes_per_run: default_max_deletes_per_run(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

fn default_max_deletes_per_run() -> u64 {
    DEFAULT_MAX_DELETES_PER_RUN
}

fn default_run_timeout_secs() -> u64 {
    60
}

impl RetentionConfig {
    /// Get the worker interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes * 60)
    }

    /// Get the per-run deadline, if any.
    pub fn run_timeout(&self) -> Option<std::time::Duration> {
        match self.safety.run_timeout_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days_to_keep == 0 {
            return Err(ConfigError::Validation(
                "retention.days_to_keep must be at least 1; \
                 0 would expire every annotation"
                    .into(),
            ));
        }
        if self.safety.max_deletes_per_run == 0 {
            return Err(ConfigError::Validation(
                "retention.safety.max_deletes_per_run must be at least 1".into(),
            ));
        }
        if self.enabled && self.interval_minutes == 0 {
            return Err(ConfigError::Validation(
                "retention.interval_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
