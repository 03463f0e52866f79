use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A timestamped event record attached to an organization and, optionally,
/// a dashboard.
///
/// All timestamps are epoch milliseconds, matching the unit the store keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Store-assigned identifier. Strictly increasing, never reused.
    pub id: i64,
    pub org_id: i64,
    /// Dashboard the annotation belongs to (0 = global)
    pub dashboard_id: i64,
    /// Creator
    pub user_id: i64,
    /// Free-text annotation type (e.g. "alert")
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    /// Creation time. This is what retention compares against, not `epoch`.
    pub created: i64,
    pub updated: i64,
    /// Start of the annotated event range
    pub epoch: i64,
    /// End of the annotated event range (`epoch <= epoch_end`)
    pub epoch_end: i64,
    /// Joined tag pairs in insertion order
    pub tags: Vec<String>,
}

/// Input for creating a new annotation
#[derive(Debug, Clone, Default)]
pub struct CreateAnnotation {
    pub org_id: i64,
    pub dashboard_id: i64,
    pub user_id: i64,
    pub kind: String,
    pub text: String,
    /// Raw tag strings (`key` or `key:value`); normalized on insert
    pub tags: Vec<String>,
    pub epoch: i64,
    /// Defaults to `epoch` when unset
    pub epoch_end: Option<i64>,
    /// Creation time override in epoch milliseconds. Defaults to now.
    ///
    /// Used by importers that replay historical annotations.
    pub created: Option<i64>,
}

/// Filter for reading annotations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationQuery {
    pub org_id: i64,
    pub dashboard_id: Option<i64>,
    /// Only annotations whose event range ends at or after this instant
    pub from: Option<i64>,
    /// Only annotations whose event range starts at or before this instant
    pub to: Option<i64>,
    /// Tag filter (`key` or `key:value` strings)
    #[serde(default)]
    pub tags: Vec<String>,
    /// When true, an annotation matches if it carries any of `tags`;
    /// otherwise it must carry all of them.
    #[serde(default)]
    pub match_any: bool,
    /// Maximum number of results (default: 100)
    pub limit: Option<i64>,
}

/// Selection predicate for expired annotations.
///
/// Built by the retention selector; the store evaluates it inside the
/// deleting transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredAnnotationFilter {
    /// Annotations with `created < cutoff_ms` are expired
    pub cutoff_ms: i64,
    pub org_id: Option<i64>,
    pub dashboard_id: Option<i64>,
}

impl ExpiredAnnotationFilter {
    pub fn before(cutoff_ms: i64) -> Self {
        Self {
            cutoff_ms,
            org_id: None,
            dashboard_id: None,
        }
    }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
