//! Integration tests for the user store.

use chrono::{Duration, TimeZone, Utc};
use hn_alerts::db::{
    advance_watermark, get_user_by_username, insert_user, list_verified_users, Database, NewUser,
    WatermarkUpdate,
};
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn new_user(username: &str, verified: bool) -> NewUser {
    NewUser {
        hn_username: username.to_string(),
        email: format!("{username}@example.com"),
        is_verified: verified,
        last_checked: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_insert_and_get_user() {
    let (db, _tmp) = setup_db().await;

    insert_user(db.pool(), &new_user("alice", true)).await.unwrap();

    let user = get_user_by_username(db.pool(), "alice")
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(user.hn_username, "alice");
    assert_eq!(user.email, "alice@example.com");
    assert!(user.is_verified);
    assert_eq!(user.last_checked, Utc.timestamp_opt(1_700_000_000, 0).unwrap());

    assert!(get_user_by_username(db.pool(), "nobody")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let (db, _tmp) = setup_db().await;

    insert_user(db.pool(), &new_user("alice", true)).await.unwrap();
    assert!(insert_user(db.pool(), &new_user("alice", true)).await.is_err());
}

#[tokio::test]
async fn test_list_verified_users_skips_unverified() {
    let (db, _tmp) = setup_db().await;

    insert_user(db.pool(), &new_user("carol", true)).await.unwrap();
    insert_user(db.pool(), &new_user("alice", true)).await.unwrap();
    insert_user(db.pool(), &new_user("bob", false)).await.unwrap();

    let users = list_verified_users(db.pool()).await.unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.hn_username.as_str()).collect();
    assert_eq!(names, vec!["alice", "carol"]);
}

#[tokio::test]
async fn test_advance_watermark_cas() {
    let (db, _tmp) = setup_db().await;

    insert_user(db.pool(), &new_user("alice", true)).await.unwrap();
    let observed = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let next = observed + Duration::minutes(10);

    let update = advance_watermark(db.pool(), "alice", observed, next)
        .await
        .unwrap();
    assert_eq!(update, WatermarkUpdate::Advanced);

    let user = get_user_by_username(db.pool(), "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.last_checked, next);
}

#[tokio::test]
async fn test_advance_watermark_conflict_on_stale_observation() {
    let (db, _tmp) = setup_db().await;

    insert_user(db.pool(), &new_user("alice", true)).await.unwrap();
    let observed = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let first = observed + Duration::minutes(10);
    let second = observed + Duration::minutes(20);

    // First cycle wins the CAS.
    assert_eq!(
        advance_watermark(db.pool(), "alice", observed, first)
            .await
            .unwrap(),
        WatermarkUpdate::Advanced
    );

    // A second cycle that read the old watermark loses and writes nothing.
    assert_eq!(
        advance_watermark(db.pool(), "alice", observed, second)
            .await
            .unwrap(),
        WatermarkUpdate::Conflict
    );

    let user = get_user_by_username(db.pool(), "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.last_checked, first);
}

#[tokio::test]
async fn test_advance_watermark_unknown_user_is_conflict() {
    let (db, _tmp) = setup_db().await;

    let observed = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let update = advance_watermark(db.pool(), "ghost", observed, observed)
        .await
        .unwrap();
    assert_eq!(update, WatermarkUpdate::Conflict);
}
