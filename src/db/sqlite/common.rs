use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, sqlite::SqliteRow};

use crate::{
    db::error::DbResult,
    models::{Annotation, ExpiredAnnotationFilter, Tag, TagPair},
};

/// Column list shared by every annotation SELECT
pub const ANNOTATION_COLUMNS: &str =
    "id, org_id, dashboard_id, user_id, type, text, tags, created, updated, epoch, epoch_end";

/// Upper bound on bound parameters per `IN (...)` list.
///
/// Stays well below SQLite's `SQLITE_MAX_VARIABLE_NUMBER` on old builds (999).
pub const DELETE_CHUNK_SIZE: usize = 500;

pub fn annotation_from_row(row: &SqliteRow) -> DbResult<Annotation> {
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
pub fn push_expiry_predicate(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ExpiredAnnotationFilter) {
    qb.push(" WHERE created < ").push_bind(filter.cutoff_ms);
    if let Some(org_id) = filter.org_id {
        qb.push(" AND org_id = ").push_bind(org_id);
    }
    if let Some(dashboard_id) = filter.dashboard_id {
        qb.push(" AND dashboard_id = ").push_bind(dashboard_id);
    }
}

/// Find-or-create each tag pair on the given connection.
///
/// Callers pass a transaction so tag creation commits or rolls back together
/// with whatever references the tags.
pub async fn upsert_tags(conn: &mut SqliteConnection, pairs: &[TagPair]) -> DbResult<Vec<Tag>> {
    let mut tags = Vec::with_capacity(pairs.len());

    for pair in pairs {
        sqlx::query(
            r#"
            INSERT INTO tag (key, value)
            VALUES (?, ?)
            ON CONFLICT (key, value) DO NOTHING
            "#,
        )
        .bind(&pair.key)
        .bind(&pair.value)
        .execute(&mut *conn)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM tag WHERE key = ? AND value = ?")
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

/// `DELETE FROM {table} WHERE {column} IN (ids...)`, returning rows affected.
pub async fn delete_by_ids(
    conn: &mut SqliteConnection,
    table: &'static str,
    column: &'static str,
    ids: &[i64],
) -> DbResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!("DELETE FROM {table} WHERE {column} IN ({placeholders})");

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }

    let result = query.execute(&mut *conn).await?;
    Ok(result.rows_affected())
}
