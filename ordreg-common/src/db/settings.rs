//! Settings database operations
//!
//! Get/set accessors for the settings table following the key-value
//! pattern. Typed getters parse from the stored TEXT value.

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_get_missing_setting() {
        let pool = init_memory_database().await.unwrap();
        let value: Option<f64> = get_setting(&pool, "absent").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_set_and_get_setting() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "review_threshold", 0.8).await.unwrap();

        let value: Option<f64> = get_setting(&pool, "review_threshold").await.unwrap();
        assert_eq!(value, Some(0.8));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "warn_penalty", "0.1").await.unwrap();
        set_setting(&pool, "warn_penalty", "0.2").await.unwrap();

        let value: Option<f64> = get_setting(&pool, "warn_penalty").await.unwrap();
        assert_eq!(value, Some(0.2));
    }

    #[tokio::test]
    async fn test_parse_failure_is_config_error() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "review_threshold", "not-a-number")
            .await
            .unwrap();

        let result: Result<Option<f64>> = get_setting(&pool, "review_threshold").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
