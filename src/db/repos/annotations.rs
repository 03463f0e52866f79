use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{Annotation, AnnotationQuery, CreateAnnotation, ExpiredAnnotationFilter},
};

#[async_trait]
pub trait AnnotationRepo: Send + Sync {
    /// Insert an annotation together with its tags and tag associations.
    ///
    /// Tags are normalized with `parse_tag_pairs`, created if missing, and
    /// linked through `annotation_tag`, all in one transaction.
    async fn create(&self, input: CreateAnnotation) -> DbResult<Annotation>;

    /// Get an annotation by ID within an organization
    async fn get_by_id(&self, org_id: i64, id: i64) -> DbResult<Option<Annotation>>;

    /// Find annotations matching the query, newest event first
    async fn find(&self, query: AnnotationQuery) -> DbResult<Vec<Annotation>>;

    // ==================== Retention Operations ====================

    /// Count annotations matching the expiry filter.
    async fn count_expired(&self, filter: &ExpiredAnnotationFilter) -> DbResult<i64>;

    /// Delete up to `max_deletes` expired annotations and their tag associations.
    ///
    /// Candidates are the lowest-id rows matching the filter. Selection, the
    /// `annotation_tag` delete and the `annotation` delete run in a single
    /// transaction: either every selected annotation and all of its
    /// associations are gone, or nothing changed.
    /// Returns the number of annotation rows deleted.
    async fn delete_expired(
        &self,
        filter: &ExpiredAnnotationFilter,
        max_deletes: u64,
    ) -> DbResult<u64>;
}
