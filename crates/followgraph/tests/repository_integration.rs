//! Integration tests for repository operations.
//!
//! These tests require the `sqlite` and `migrate` features to be enabled
//! and use an in-memory SQLite database.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use chrono::{Duration, Utc};
use followgraph::connect_and_migrate;
use followgraph::entity::Direction;
use followgraph::entity::user::ActiveModel;
use followgraph::repository::{self, user};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};

/// Create an in-memory SQLite database with migrations applied.
async fn setup_test_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

fn profile(id: i64, screen_name: &str, at: DateTimeWithTimeZone) -> ActiveModel {
    ActiveModel {
        user_id: Set(id),
        screen_name: Set(Some(screen_name.to_string())),
        display_name: Set(Some(format!("User {id}"))),
        protected: Set(Some(false)),
        followers_count: Set(Some(10)),
        friends_count: Set(Some(20)),
        api_response: Set(Some(serde_json::json!({ "id": id }))),
        created_at: Set(at),
        modified_at: Set(at),
    }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upsert_user_creates_once() {
    let db = setup_test_db().await;

    assert!(repository::upsert_user(&db, 7).await.expect("first"));
    assert!(!repository::upsert_user(&db, 7).await.expect("second"));
    assert_eq!(user::count(&db).await.expect("count"), 1);
}

#[tokio::test]
async fn test_upsert_profiles_refreshes_but_keeps_created_at() {
    let db = setup_test_db().await;
    let first_seen = Utc::now().fixed_offset() - Duration::days(3);
    let now = Utc::now().fixed_offset();

    repository::upsert_profiles(&db, vec![profile(1, "before", first_seen)])
        .await
        .expect("insert");
    repository::upsert_profiles(&db, vec![profile(1, "after", now)])
        .await
        .expect("update");

    let stored = user::find_by_id(&db, 1).await.expect("query").expect("row");
    assert_eq!(stored.screen_name.as_deref(), Some("after"));
    assert_eq!(stored.created_at.timestamp(), first_seen.timestamp());
    assert_eq!(stored.modified_at.timestamp(), now.timestamp());
}

#[tokio::test]
async fn test_profiles_fill_bare_endpoint_rows() {
    let db = setup_test_db().await;
    repository::upsert_user(&db, 5).await.expect("bare");
    let bare = user::find_by_id(&db, 5).await.expect("query").expect("row");
    assert!(bare.screen_name.is_none());

    repository::upsert_profiles(&db, vec![profile(5, "named", Utc::now().fixed_offset())])
        .await
        .expect("profile");
    let named = user::find_by_id(&db, 5).await.expect("query").expect("row");
    assert_eq!(named.screen_name.as_deref(), Some("named"));
}

#[tokio::test]
async fn test_find_by_screen_names_ignores_case() {
    let db = setup_test_db().await;
    let now = Utc::now().fixed_offset();
    repository::upsert_profiles(&db, vec![profile(1, "Alice", now), profile(2, "bob", now)])
        .await
        .expect("insert");

    let found = repository::find_by_screen_names(&db, &["ALICE".to_string(), "carol".to_string()])
        .await
        .expect("query");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].user_id, 1);
}

// ─── Staging ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_staging_batch_is_atomic() {
    let db = setup_test_db().await;
    repository::clear_staging(&db).await.expect("clear");

    repository::insert_staging_batch(&db, &[(1, 2), (1, 3)]).await.expect("batch");
    let err = repository::insert_staging_batch(&db, &[(1, 4), (1, 2)])
        .await
        .expect_err("duplicate pair");
    assert!(err.is_unique_violation());
    assert_eq!(
        repository::staging_pairs(&db).await.expect("pairs"),
        vec![(1, 2), (1, 3)]
    );

    let dup = repository::insert_staging_row(&db, 1, 3).await.expect_err("dup row");
    assert!(dup.is_unique_violation());
    repository::insert_staging_row(&db, 1, 4).await.expect("new row");
    assert_eq!(repository::count_staged(&db).await.expect("count"), 3);
}

#[tokio::test]
async fn test_clear_staging_empties_table() {
    let db = setup_test_db().await;
    repository::insert_staging_batch(&db, &[(1, 2)]).await.expect("batch");
    repository::clear_staging(&db).await.expect("clear");
    assert_eq!(repository::count_staged(&db).await.expect("count"), 0);
}

// ─── Reconcile ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconcile_only_closes_edges_on_the_users_side() {
    let db = setup_test_db().await;
    let earlier = Utc::now().fixed_offset() - Duration::hours(1);
    for id in [1, 2, 3, 9] {
        repository::upsert_user(&db, id).await.expect("user");
    }
    // 1 follows 2, and 9 follows 2; only user 1's friends are synced.
    repository::open_edge(&db, 1, 2, earlier).await.expect("edge");
    repository::open_edge(&db, 9, 2, earlier).await.expect("edge");

    repository::clear_staging(&db).await.expect("clear");
    repository::insert_staging_batch(&db, &[(1, 3)]).await.expect("stage");

    let txn = db.begin().await.expect("begin");
    let counts = repository::reconcile_staged(&txn, Direction::Friends, 1, Utc::now().fixed_offset())
        .await
        .expect("reconcile");
    txn.commit().await.expect("commit");

    assert_eq!(counts.edges_opened, 1);
    assert_eq!(counts.edges_closed, 1);
    assert_eq!(counts.users_inserted, 0);

    let others = repository::list_open_edges(&db, Direction::Friends, 9).await.expect("edges");
    assert_eq!(others.len(), 1, "other users' edges stay open");
}

#[tokio::test]
async fn test_rolled_back_reconcile_leaves_history_alone() {
    let db = setup_test_db().await;
    repository::clear_staging(&db).await.expect("clear");
    repository::insert_staging_batch(&db, &[(4, 1)]).await.expect("stage");
    repository::upsert_user(&db, 1).await.expect("user");

    let txn = db.begin().await.expect("begin");
    repository::reconcile_staged(&txn, Direction::Followers, 1, Utc::now().fixed_offset())
        .await
        .expect("reconcile");
    txn.rollback().await.expect("rollback");

    assert_eq!(repository::count_open(&db).await.expect("count"), 0);
    assert_eq!(user::count(&db).await.expect("count"), 1);
}
