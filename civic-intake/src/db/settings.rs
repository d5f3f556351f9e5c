//! Settings database operations
//!
//! Key-value accessors for the `settings` table.

use civic_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Read a raw setting value; `None` when the row is missing or NULL
pub async fn get_raw_setting(db: &Pool<Sqlite>, key: &str) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(row.and_then(|(value,)| value))
}

/// Read and parse a setting
///
/// An unparsable value is a `Config` error; callers decide whether to fall
/// back to a default.
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_raw_setting(db, key).await? {
        Some(value) => {
            let parsed = value.trim().parse::<T>().map_err(|e| {
                Error::Config(format!("Setting '{}' has invalid value '{}': {}", key, value, e))
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Insert or replace a setting
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Captioner API key stored in the database
pub async fn get_captioner_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_raw_setting(db, "captioner_api_key").await
}

pub async fn set_captioner_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, "captioner_api_key", key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_common::db::init_in_memory_database;

    #[tokio::test]
    async fn test_seeded_setting_parses() {
        let pool = init_in_memory_database().await.unwrap();
        let threshold: Option<f32> = get_setting(&pool, "duplicate_similarity_threshold")
            .await
            .unwrap();
        assert_eq!(threshold, Some(0.92));
    }

    #[tokio::test]
    async fn test_missing_setting_is_none() {
        let pool = init_in_memory_database().await.unwrap();
        let value: Option<u32> = get_setting(&pool, "no_such_key").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let pool = init_in_memory_database().await.unwrap();
        set_setting(&pool, "duplicate_radius_meters", 75.0).await.unwrap();
        set_setting(&pool, "duplicate_radius_meters", 80.0).await.unwrap();

        let radius: Option<f64> = get_setting(&pool, "duplicate_radius_meters").await.unwrap();
        assert_eq!(radius, Some(80.0));
    }

    #[tokio::test]
    async fn test_unparsable_setting_is_config_error() {
        let pool = init_in_memory_database().await.unwrap();
        set_setting(&pool, "duplicate_search_k", "many").await.unwrap();

        let result: Result<Option<usize>> = get_setting(&pool, "duplicate_search_k").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_captioner_key_roundtrip() {
        let pool = init_in_memory_database().await.unwrap();
        assert_eq!(get_captioner_api_key(&pool).await.unwrap(), None);

        set_captioner_api_key(&pool, "key-123".to_string()).await.unwrap();
        assert_eq!(
            get_captioner_api_key(&pool).await.unwrap(),
            Some("key-123".to_string())
        );
    }
}
