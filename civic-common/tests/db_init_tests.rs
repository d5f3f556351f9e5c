//! Database initialization tests
//!
//! - Automatic database creation on first run
//! - Idempotent schema application
//! - Default runtime settings

use civic_common::db::init::{init_database, init_in_memory_database, DEFAULT_SETTINGS};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("civic.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("civic.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let pool = init_in_memory_database().await.unwrap();

    for (key, default_value) in DEFAULT_SETTINGS {
        let value: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(value, default_value, "setting {}", key);
    }
}

#[tokio::test]
async fn test_existing_setting_not_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("civic.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = '0.97' WHERE key = 'duplicate_similarity_threshold'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let value: String = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = 'duplicate_similarity_threshold'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(value, "0.97");
}

#[tokio::test]
async fn test_vote_uniqueness_enforced_by_schema() {
    let pool = init_in_memory_database().await.unwrap();

    sqlx::query(
        "INSERT INTO issues (image_url, latitude, longitude, citizen_token) VALUES ('x', 1.0, 2.0, 'tok')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("INSERT INTO votes (issue_id, citizen_token, vote_type) VALUES (1, 'abc', 'upvote')")
        .execute(&pool)
        .await
        .unwrap();

    let second = sqlx::query(
        "INSERT INTO votes (issue_id, citizen_token, vote_type) VALUES (1, 'abc', 'downvote')",
    )
    .execute(&pool)
    .await;
    assert!(second.is_err(), "duplicate (issue, token) vote must be rejected");
}

#[tokio::test]
async fn test_coordinate_range_checked() {
    let pool = init_in_memory_database().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO issues (image_url, latitude, longitude, citizen_token) VALUES ('x', 91.0, 2.0, 'tok')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
