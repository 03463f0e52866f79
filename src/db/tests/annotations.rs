//! Shared tests for AnnotationRepo and TagRepo implementations
//!
//! Tests are written as async functions that take a test context containing
//! both repos, so the retention delete can be checked against the tag tables.

use super::harness::{annotation_created_at, days_before};
use crate::{
    db::repos::{AnnotationRepo, TagRepo},
    models::{AnnotationQuery, CreateAnnotation, ExpiredAnnotationFilter, TagPair, now_millis},
};

const FIXTURE_TAGS: [&str; 4] = ["outage", "error", "type:outage", "server:server-1"];

/// Test context containing repos needed for annotation tests
pub struct AnnotationTestContext<'a> {
    pub annotation_repo: &'a dyn AnnotationRepo,
    pub tag_repo: &'a dyn TagRepo,
}

impl<'a> AnnotationTestContext<'a> {
    /// Create an annotation on dashboard 1 of org 1 and return its ID
    async fn create_aged(&self, created_ms: i64, tags: &[&str]) -> i64 {
        self.annotation_repo
            .create(annotation_created_at(1, 1, created_ms, tags))
            .await
            .expect("Failed to create annotation")
            .id
    }

    async fn total(&self) -> i64 {
        self.annotation_repo
            .count_expired(&ExpiredAnnotationFilter::before(i64::MAX))
            .await
            .expect("Failed to count annotations")
    }
}

// ============================================================================
// Create / Read Tests
// ============================================================================

pub async fn test_create_with_tags(ctx: &AnnotationTestContext<'_>) {
    let annotation = ctx
        .annotation_repo
        .create(CreateAnnotation {
            org_id: 1,
            dashboard_id: 7,
            user_id: 3,
            kind: "alert".to_string(),
            text: "disk full".to_string(),
            tags: vec![
                " outage ".to_string(),
                "server:server-1".to_string(),
                "outage".to_string(),
                "".to_string(),
            ],
            epoch: 1_000,
            epoch_end: Some(2_000),
            created: None,
        })
        .await
        .expect("Failed to create");

    assert!(annotation.id > 0);
    assert_eq!(annotation.tags, vec!["outage", "server:server-1"]);
    assert_eq!(annotation.created, annotation.updated);

    let tags = ctx
        .tag_repo
        .list_for_annotation(annotation.id)
        .await
        .expect("Failed to list tags");
    assert_eq!(tags.len(), 2);
    assert!(tags.iter().any(|t| t.key == "server" && t.value == "server-1"));
    assert!(tags.iter().any(|t| t.key == "outage" && t.value.is_empty()));
}

pub async fn test_ids_strictly_increase(ctx: &AnnotationTestContext<'_>) {
    let now = now_millis();
    let first = ctx.create_aged(now, &[]).await;
    let second = ctx.create_aged(now, &[]).await;
    assert!(second > first);
}

pub async fn test_get_by_id(ctx: &AnnotationTestContext<'_>) {
    let id = ctx.create_aged(now_millis(), &FIXTURE_TAGS).await;

    let fetched = ctx
        .annotation_repo
        .get_by_id(1, id)
        .await
        .expect("Failed to get")
        .expect("Annotation should exist");
    assert_eq!(fetched.id, id);
    assert_eq!(fetched.tags, FIXTURE_TAGS);

    let other_org = ctx.annotation_repo.get_by_id(2, id).await.expect("Failed to get");
    assert!(other_org.is_none());
}

pub async fn test_find_by_tags(ctx: &AnnotationTestContext<'_>) {
    let now = now_millis();
    let both = ctx.create_aged(now, &["outage", "region:eu"]).await;
    let only_outage = ctx.create_aged(now, &["outage"]).await;
    let _untagged = ctx.create_aged(now, &[]).await;

    let all_of = ctx
        .annotation_repo
        .find(AnnotationQuery {
            org_id: 1,
            tags: vec!["outage".into(), "region:eu".into()],
            ..Default::default()
        })
        .await
        .expect("Failed to find");
    assert_eq!(all_of.iter().map(|a| a.id).collect::<Vec<_>>(), vec![both]);

    let any_of = ctx
        .annotation_repo
        .find(AnnotationQuery {
            org_id: 1,
            tags: vec!["outage".into(), "region:eu".into()],
            match_any: true,
            ..Default::default()
        })
        .await
        .expect("Failed to find");
    let mut ids: Vec<i64> = any_of.iter().map(|a| a.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![both, only_outage]);
}

pub async fn test_find_time_range_and_order(ctx: &AnnotationTestContext<'_>) {
    let mut ids = Vec::new();
    for epoch in [100, 200, 300] {
        let annotation = ctx
            .annotation_repo
            .create(CreateAnnotation {
                org_id: 1,
                dashboard_id: 1,
                kind: "event".into(),
                text: format!("at {epoch}"),
                epoch,
                epoch_end: Some(epoch + 50),
                ..Default::default()
            })
            .await
            .expect("Failed to create");
        ids.push(annotation.id);
    }

    let found = ctx
        .annotation_repo
        .find(AnnotationQuery {
            org_id: 1,
            dashboard_id: Some(1),
            from: Some(240),
            to: Some(320),
            ..Default::default()
        })
        .await
        .expect("Failed to find");

    // Ranges [200,250] and [300,350] overlap [240,320]; newest event first.
    assert_eq!(
        found.iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![ids[2], ids[1]]
    );

    let limited = ctx
        .annotation_repo
        .find(AnnotationQuery {
            org_id: 1,
            limit: Some(1),
            ..Default::default()
        })
        .await
        .expect("Failed to find");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, ids[2]);
}

pub async fn test_ensure_tags_exist_is_idempotent(ctx: &AnnotationTestContext<'_>) {
    let pairs = vec![TagPair::new("outage", ""), TagPair::new("server", "server-1")];

    let first = ctx
        .tag_repo
        .ensure_tags_exist(&pairs)
        .await
        .expect("Failed to ensure tags");
    let second = ctx
        .tag_repo
        .ensure_tags_exist(&pairs)
        .await
        .expect("Failed to ensure tags");

    assert_eq!(first, second);
    assert_eq!(ctx.tag_repo.count().await.expect("Failed to count"), 2);
}

// ============================================================================
// Retention Tests
// ============================================================================

pub async fn test_count_expired(ctx: &AnnotationTestContext<'_>) {
    let now = now_millis();
    for _ in 0..3 {
        ctx.create_aged(days_before(now, 10), &[]).await;
    }
    ctx.create_aged(days_before(now, 2), &[]).await;

    let filter = ExpiredAnnotationFilter::before(days_before(now, 5));
    assert_eq!(
        ctx.annotation_repo
            .count_expired(&filter)
            .await
            .expect("Failed to count"),
        3
    );
}

pub async fn test_delete_expired_keeps_fresh(ctx: &AnnotationTestContext<'_>) {
    let now = now_millis();
    for _ in 0..9 {
        ctx.create_aged(days_before(now, 10), &FIXTURE_TAGS).await;
    }
    let fresh = ctx.create_aged(days_before(now, 2), &FIXTURE_TAGS).await;

    let deleted = ctx
        .annotation_repo
        .delete_expired(&ExpiredAnnotationFilter::before(days_before(now, 5)), 900)
        .await
        .expect("Failed to delete");
    assert_eq!(deleted, 9);

    let remaining = ctx
        .annotation_repo
        .find(AnnotationQuery {
            org_id: 1,
            ..Default::default()
        })
        .await
        .expect("Failed to find");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, fresh);
    assert_eq!(remaining[0].tags, FIXTURE_TAGS);

    let tags = ctx
        .tag_repo
        .list_for_annotation(fresh)
        .await
        .expect("Failed to list tags");
    assert_eq!(tags.len(), 4);
    assert_eq!(
        ctx.tag_repo
            .count_dangling_associations()
            .await
            .expect("Failed to count"),
        0
    );
}

pub async fn test_delete_expired_respects_cap_lowest_ids_first(ctx: &AnnotationTestContext<'_>) {
    let now = now_millis();
    let mut expired = Vec::new();
    for _ in 0..15 {
        expired.push(ctx.create_aged(days_before(now, 10), &["outage"]).await);
    }
    for _ in 0..3 {
        ctx.create_aged(now, &["outage"]).await;
    }
    let filter = ExpiredAnnotationFilter::before(days_before(now, 5));

    let deleted = ctx
        .annotation_repo
        .delete_expired(&filter, 5)
        .await
        .expect("Failed to delete");
    assert_eq!(deleted, 5);

    for id in &expired[..5] {
        assert!(ctx.annotation_repo.get_by_id(1, *id).await.unwrap().is_none());
    }
    for id in &expired[5..] {
        assert!(ctx.annotation_repo.get_by_id(1, *id).await.unwrap().is_some());
    }
    assert_eq!(ctx.total().await, 13);
    assert_eq!(ctx.tag_repo.count_dangling_associations().await.unwrap(), 0);
}

pub async fn test_delete_expired_boundary_survives(ctx: &AnnotationTestContext<'_>) {
    let cutoff = days_before(now_millis(), 5);
    let at_cutoff = ctx.create_aged(cutoff, &[]).await;
    let just_before = ctx.create_aged(cutoff - 1, &[]).await;

    let deleted = ctx
        .annotation_repo
        .delete_expired(&ExpiredAnnotationFilter::before(cutoff), 900)
        .await
        .expect("Failed to delete");
    assert_eq!(deleted, 1);
    assert!(ctx.annotation_repo.get_by_id(1, at_cutoff).await.unwrap().is_some());
    assert!(ctx.annotation_repo.get_by_id(1, just_before).await.unwrap().is_none());
}

pub async fn test_delete_expired_scoped(ctx: &AnnotationTestContext<'_>) {
    let old = days_before(now_millis(), 10);
    for (org_id, dashboard_id) in [(1, 1), (1, 2), (2, 1)] {
        ctx.annotation_repo
            .create(annotation_created_at(org_id, dashboard_id, old, &[]))
            .await
            .expect("Failed to create");
    }

    let filter = ExpiredAnnotationFilter {
        cutoff_ms: days_before(now_millis(), 5),
        org_id: Some(1),
        dashboard_id: Some(2),
    };
    assert_eq!(ctx.annotation_repo.delete_expired(&filter, 900).await.unwrap(), 1);
    assert_eq!(ctx.total().await, 2);

    let org_wide = ExpiredAnnotationFilter {
        dashboard_id: None,
        ..filter
    };
    assert_eq!(ctx.annotation_repo.delete_expired(&org_wide, 900).await.unwrap(), 1);
    assert_eq!(ctx.total().await, 1);
}

pub async fn test_delete_expired_nothing_to_do(ctx: &AnnotationTestContext<'_>) {
    let now = now_millis();
    ctx.create_aged(days_before(now, 2), &["outage"]).await;

    let filter = ExpiredAnnotationFilter::before(days_before(now, 5));
    assert_eq!(ctx.annotation_repo.delete_expired(&filter, 900).await.unwrap(), 0);
    assert_eq!(ctx.annotation_repo.delete_expired(&filter, 900).await.unwrap(), 0);
    assert_eq!(ctx.total().await, 1);
}

pub async fn test_delete_expired_leaves_tag_rows(ctx: &AnnotationTestContext<'_>) {
    let now = now_millis();
    ctx.create_aged(days_before(now, 10), &["only-on-old"]).await;
    ctx.create_aged(days_before(now, 1), &["outage"]).await;
    assert_eq!(ctx.tag_repo.count().await.unwrap(), 2);

    let filter = ExpiredAnnotationFilter::before(days_before(now, 5));
    assert_eq!(ctx.annotation_repo.delete_expired(&filter, 900).await.unwrap(), 1);

    // Orphaned tags stay; only the association went away.
    assert_eq!(ctx.tag_repo.count().await.unwrap(), 2);
    assert_eq!(ctx.tag_repo.count_dangling_associations().await.unwrap(), 0);
}

// ============================================================================
// SQLite Tests
// ============================================================================

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use super::*;
    use crate::db::{
        sqlite::{SqliteAnnotationRepo, SqliteTagRepo},
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    async fn create_repos() -> (SqliteAnnotationRepo, SqliteTagRepo) {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        (
            SqliteAnnotationRepo::new(pool.clone()),
            SqliteTagRepo::new(pool),
        )
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let (annotation_repo, tag_repo) = create_repos().await;
                let ctx = AnnotationTestContext {
                    annotation_repo: &annotation_repo,
                    tag_repo: &tag_repo,
                };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_create_with_tags);
    sqlite_test!(test_ids_strictly_increase);
    sqlite_test!(test_get_by_id);
    sqlite_test!(test_find_by_tags);
    sqlite_test!(test_find_time_range_and_order);
    sqlite_test!(test_ensure_tags_exist_is_idempotent);

    sqlite_test!(test_count_expired);
    sqlite_test!(test_delete_expired_keeps_fresh);
    sqlite_test!(test_delete_expired_respects_cap_lowest_ids_first);
    sqlite_test!(test_delete_expired_boundary_survives);
    sqlite_test!(test_delete_expired_scoped);
    sqlite_test!(test_delete_expired_nothing_to_do);
    sqlite_test!(test_delete_expired_leaves_tag_rows);
}

// ============================================================================
// PostgreSQL Tests - Require Docker, run with `cargo test -- --ignored`
// ============================================================================

#[cfg(feature = "database-postgres")]
mod postgres_tests {
    use super::*;
    use crate::db::{
        postgres::{PostgresAnnotationRepo, PostgresTagRepo},
        tests::harness::postgres::{create_isolated_postgres_pool, run_postgres_migrations},
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let annotation_repo = PostgresAnnotationRepo::new(pool.clone());
                let tag_repo = PostgresTagRepo::new(pool);
                let ctx = AnnotationTestContext {
                    annotation_repo: &annotation_repo,
                    tag_repo: &tag_repo,
                };
                super::$name(&ctx).await;
            }
        };
    }

    postgres_test!(test_create_with_tags);
    postgres_test!(test_ids_strictly_increase);
    postgres_test!(test_get_by_id);
    postgres_test!(test_find_by_tags);
    postgres_test!(test_find_time_range_and_order);
    postgres_test!(test_ensure_tags_exist_is_idempotent);

    postgres_test!(test_count_expired);
    postgres_test!(test_delete_expired_keeps_fresh);
    postgres_test!(test_delete_expired_respects_cap_lowest_ids_first);
    postgres_test!(test_delete_expired_boundary_survives);
    postgres_test!(test_delete_expired_scoped);
    postgres_test!(test_delete_expired_nothing_to_do);
    postgres_test!(test_delete_expired_leaves_tag_rows);

    /// Two overlapping runs each skip the rows the other has locked, so
    /// together they delete every expired row exactly once.
    #[tokio::test]
    #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
    async fn test_concurrent_runs_do_not_double_delete() {
        let pool = create_isolated_postgres_pool().await;
        run_postgres_migrations(&pool).await;
        let repo = PostgresAnnotationRepo::new(pool.clone());

        let now = now_millis();
        for _ in 0..40 {
            repo.create(annotation_created_at(1, 1, days_before(now, 10), &["outage"]))
                .await
                .unwrap();
        }

        let filter = ExpiredAnnotationFilter::before(days_before(now, 5));
        let (a, b) = tokio::join!(
            repo.delete_expired(&filter, 25),
            repo.delete_expired(&filter, 25)
        );
        let total = a.unwrap() + b.unwrap();
        assert!(total <= 40);

        let rest = repo.delete_expired(&filter, 25).await.unwrap();
        assert_eq!(total + rest, 40);
        assert_eq!(repo.count_expired(&filter).await.unwrap(), 0);
    }
}
