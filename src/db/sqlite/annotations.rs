use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::common::{
    ANNOTATION_COLUMNS, DELETE_CHUNK_SIZE, annotation_from_row, delete_by_ids,
    push_expiry_predicate, upsert_tags,
};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{AnnotationRepo, DEFAULT_FIND_LIMIT},
    },
    models::{
        Annotation, AnnotationQuery, CreateAnnotation, ExpiredAnnotationFilter, join_tag_pairs,
        now_millis, parse_tag_pairs,
    },
};

pub struct SqliteAnnotationRepo {
    pool: SqlitePool,
}

impl SqliteAnnotationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnnotationRepo for SqliteAnnotationRepo {
    async fn create(&self, input: CreateAnnotation) -> DbResult<Annotation> {
        let epoch_end = input.epoch_end.unwrap_or(input.epoch);
        if input.epoch > epoch_end {
            return Err(DbError::Validation(format!(
                "epoch ({}) must not be after epoch_end ({})",
                input.epoch, epoch_end
            )));
        }

        let created = input.created.unwrap_or_else(now_millis);
        let pairs = parse_tag_pairs(&input.tags);
        let tags = join_tag_pairs(&pairs);
        let tags_json = serde_json::to_string(&tags)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO annotation (
                org_id, dashboard_id, user_id, type, text, tags,
                created, updated, epoch, epoch_end
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.org_id)
        .bind(input.dashboard_id)
        .bind(input.user_id)
        .bind(&input.kind)
        .bind(&input.text)
        .bind(&tags_json)
        .bind(created)
        .bind(created)
        .bind(input.epoch)
        .bind(epoch_end)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();

        for tag in upsert_tags(&mut tx, &pairs).await? {
            sqlx::query("INSERT INTO annotation_tag (annotation_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Annotation {
            id,
            org_id: input.org_id,
            dashboard_id: input.dashboard_id,
            user_id: input.user_id,
            kind: input.kind,
            text: input.text,
            created,
            updated: created,
            epoch: input.epoch,
            epoch_end,
            tags,
        })
    }

    async fn get_by_id(&self, org_id: i64, id: i64) -> DbResult<Option<Annotation>> {
        let row = sqlx::query(&format!(
            "SELECT {ANNOTATION_COLUMNS} FROM annotation WHERE org_id = ? AND id = ?"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(annotation_from_row).transpose()
    }

    async fn find(&self, query: AnnotationQuery) -> DbResult<Vec<Annotation>> {
        let pairs = parse_tag_pairs(&query.tags);

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ANNOTATION_COLUMNS} FROM annotation WHERE org_id = "
        ));
        qb.push_bind(query.org_id);

        if let Some(dashboard_id) = query.dashboard_id {
            qb.push(" AND dashboard_id = ").push_bind(dashboard_id);
        }
        if let Some(from) = query.from {
            qb.push(" AND epoch_end >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND epoch <= ").push_bind(to);
        }

        if !pairs.is_empty() {
            qb.push(
                " AND (SELECT COUNT(1) FROM annotation_tag atag \
                 INNER JOIN tag ON tag.id = atag.tag_id \
                 WHERE atag.annotation_id = annotation.id AND (",
            );
            for (i, pair) in pairs.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("(tag.key = ")
                    .push_bind(pair.key.clone())
                    .push(" AND tag.value = ")
                    .push_bind(pair.value.clone())
                    .push(")");
            }
            let required = if query.match_any {
                1
            } else {
                pairs.len() as i64
            };
            qb.push(")) >= ").push_bind(required);
        }

        qb.push(" ORDER BY epoch DESC, id DESC LIMIT ")
            .push_bind(query.limit.unwrap_or(DEFAULT_FIND_LIMIT));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(annotation_from_row).collect()
    }

    async fn count_expired(&self, filter: &ExpiredAnnotationFilter) -> DbResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM annotation");
        push_expiry_predicate(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn delete_expired(
        &self,
        filter: &ExpiredAnnotationFilter,
        max_deletes: u64,
    ) -> DbResult<u64> {
        if max_deletes == 0 {
            return Ok(0);
        }
        let limit = i64::try_from(max_deletes).unwrap_or(i64::MAX);

        // IMMEDIATE takes the write lock before the candidate SELECT. A
        // deferred transaction would fail with SQLITE_BUSY, without waiting
        // out busy_timeout, if an insert committed between the read and the
        // first DELETE.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM annotation");
        push_expiry_predicate(&mut qb, filter);
        qb.push(" ORDER BY id ASC LIMIT ").push_bind(limit);

        let ids: Vec<i64> = qb.build_query_scalar().fetch_all(&mut *tx).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        tracing::debug!(
            candidates = ids.len(),
            first_id = ids[0],
            last_id = ids[ids.len() - 1],
            cutoff_ms = filter.cutoff_ms,
            "Deleting expired annotations"
        );

        // Associations go first; both deletes share the transaction.
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            delete_by_ids(&mut tx, "annotation_tag", "annotation_id", chunk).await?;
        }

        let mut deleted: u64 = 0;
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            deleted += delete_by_ids(&mut tx, "annotation", "id", chunk).await?;
        }

        tx.commit().await?;

        Ok(deleted)
    }
}
