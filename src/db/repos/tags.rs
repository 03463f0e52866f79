use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Tag, TagPair},
};

#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Look up the given pairs, creating the missing ones.
    ///
    /// Returns one stored tag per input pair, in input order.
    async fn ensure_tags_exist(&self, tags: &[TagPair]) -> DbResult<Vec<Tag>>;

    /// Tags linked to an annotation, ordered by tag ID
    async fn list_for_annotation(&self, annotation_id: i64) -> DbResult<Vec<Tag>>;

    /// Total number of rows in the tag table
    async fn count(&self) -> DbResult<i64>;

    /// Number of `annotation_tag` rows whose annotation no longer exists.
    ///
    /// Always zero unless an association outlived its annotation.
    async fn count_dangling_associations(&self) -> DbResult<i64>;
}
