use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::common::upsert_tags;
use crate::{
    db::{error::DbResult, repos::TagRepo},
    models::{Tag, TagPair},
};

pub struct SqliteTagRepo {
    pool: SqlitePool,
}

impl SqliteTagRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepo for SqliteTagRepo {
    async fn ensure_tags_exist(&self, tags: &[TagPair]) -> DbResult<Vec<Tag>> {
        let mut tx = self.pool.begin().await?;
        let stored = upsert_tags(&mut tx, tags).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn list_for_annotation(&self, annotation_id: i64) -> DbResult<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT tag.id, tag.key, tag.value
            FROM tag
            INNER JOIN annotation_tag atag ON atag.tag_id = tag.id
            WHERE atag.annotation_id = ?
            ORDER BY tag.id
            "#,
        )
        .bind(annotation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Tag {
                id: row.get("id"),
                key: row.get("key"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_dangling_associations(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM annotation_tag atag
            WHERE NOT EXISTS (
                SELECT 1 FROM annotation WHERE annotation.id = atag.annotation_id
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
