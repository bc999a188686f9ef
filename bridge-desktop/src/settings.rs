//! SQLite-backed settings store

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::sqlite::SqlitePool;
use std::path::PathBuf;
use tracing::{debug, error};

fn storage_err(action: &'static str) -> impl FnOnce(sqlx::Error) -> BridgeError {
    move |e| BridgeError::OperationFailed(format!("{}: {}", action, e))
}

/// [`SettingsStore`] persisting typed key-value pairs in a small SQLite
/// table. Values are stored as text with a kind tag; reading a key back
/// with a different type is an error rather than a silent coercion.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (or create) the settings database at `db_path`.
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        // SQLite URLs want forward slashes even on Windows.
        let path_str = db_path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(storage_err("Failed to open settings database"))?;
        Self::init_schema(&pool).await?;

        debug!(path = ?db_path, "Opened settings store");
        Ok(Self { pool })
    }

    /// Store living entirely in memory, for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(storage_err("Failed to open settings database"))?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                kind       TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await
        .map_err(storage_err("Failed to create settings table"))?;
        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    async fn put(&self, key: &str, value: &str, kind: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, kind, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 kind = excluded.kind,
                 updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(kind)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(storage_err("Failed to store setting"))?;

        debug!(key, kind, "Stored setting");
        Ok(())
    }

    async fn fetch(&self, key: &str, expected_kind: &str) -> Result<Option<String>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT value, kind FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err("Failed to read setting"))?;

        let Some((value, kind)) = row else {
            return Ok(None);
        };

        if kind != expected_kind {
            error!(key, expected = expected_kind, actual = %kind, "Setting kind mismatch");
            return Err(BridgeError::OperationFailed(format!(
                "Setting '{}' holds a {} value, not {}",
                key, kind, expected_kind
            )));
        }

        Ok(Some(value))
    }

    fn parse<T: std::str::FromStr>(key: &str, raw: String) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        raw.parse().map_err(|e| {
            BridgeError::OperationFailed(format!("Setting '{}' failed to parse: {}", key, e))
        })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, value, "string").await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.fetch(key, "string").await
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, &value.to_string(), "bool").await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.fetch(key, "bool")
            .await?
            .map(|raw| Self::parse(key, raw))
            .transpose()
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, &value.to_string(), "i64").await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.fetch(key, "i64")
            .await?
            .map(|raw| Self::parse(key, raw))
            .transpose()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err("Failed to delete setting"))?;

        debug!(key, "Deleted setting");
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err("Failed to list settings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_round_trip_and_delete() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store
            .set_string("sync.provider", "nextcloud")
            .await
            .unwrap();
        assert_eq!(
            store.get_string("sync.provider").await.unwrap(),
            Some("nextcloud".to_string())
        );

        store.delete("sync.provider").await.unwrap();
        assert_eq!(store.get_string("sync.provider").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bool_and_integer_values_keep_their_type() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_bool("sync.on_metered", true).await.unwrap();
        assert_eq!(store.get_bool("sync.on_metered").await.unwrap(), Some(true));

        store.set_i64("sync.debounce_ms", 500).await.unwrap();
        assert_eq!(store.get_i64("sync.debounce_ms").await.unwrap(), Some(500));
    }

    #[tokio::test]
    async fn test_reading_with_wrong_type_is_an_error() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("key", "value").await.unwrap();
        assert!(store.get_bool("key").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_key_reads_as_none() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        assert_eq!(store.get_bool("never.set").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_keys_is_sorted() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("b", "2").await.unwrap();
        store.set_string("a", "1").await.unwrap();

        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);
    }
}
