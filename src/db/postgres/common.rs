use sqlx::{PgConnection, Postgres, QueryBuilder, Row, postgres::PgRow};

use crate::{
    db::error::DbResult,
    models::{Annotation, ExpiredAnnotationFilter, Tag, TagPair},
};

/// Column list shared by every annotation SELECT
pub const ANNOTATION_COLUMNS: &str =
    "id, org_id, dashboard_id, user_id, type, text, tags, created, updated, epoch, epoch_end";

pub fn annotation_from_row(row: &PgRow) -> DbResult<Annotation> {
    let tags: String = row.get("tags");
    Ok(Annotation {
        id: row.get("id"),
        org_id: row.get("org_id"),
        dashboard_id: row.get("dashboard_id"),
        user_id: row.get("user_id"),
        kind: row.get("type"),
        text: row.get("text"),
        created: row.get("created"),
        updated: row.get("updated"),
        epoch: row.get("epoch"),
        epoch_end: row.get("epoch_end"),
        tags: serde_json::from_str(&tags)?,
    })
}

/// Append the `WHERE` clause selecting expired annotations.
pub fn push_expiry_predicate(
    qb: &mut QueryBuilder<'_, Postgres>,
    filter: &ExpiredAnnotationFilter,
) {
    qb.push(" WHERE created < ").push_bind(filter.cutoff_ms);
    if let Some(org_id) = filter.org_id {
        qb.push(" AND org_id = ").push_bind(org_id);
    }
    if let Some(dashboard_id) = filter.dashboard_id {
        qb.push(" AND dashboard_id = ").push_bind(dashboard_id);
    }
}

/// Find-or-create each tag pair on the given connection.
pub async fn upsert_tags(conn: &mut PgConnection, pairs: &[TagPair]) -> DbResult<Vec<Tag>> {
    let mut tags = Vec::with_capacity(pairs.len());

    for pair in pairs {
        sqlx::query(
            r#"
            INSERT INTO tag (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key, value) DO NOTHING
            "#,
        )
        .bind(&pair.key)
        .bind(&pair.value)
        .execute(&mut *conn)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM tag WHERE key = $1 AND value = $2")
            .bind(&pair.key)
            .bind(&pair.value)
            .fetch_one(&mut *conn)
            .await?;

        tags.push(Tag {
            id,
            key: pair.key.clone(),
            value: pair.value.clone(),
        });
    }

    Ok(tags)
}
