//! SQLite-backed progress store (sqlx).
//!
//! Schema: `flags` holds the lifecycle flag and total length, `progress` holds
//! the downloaded length and the JSON-encoded per-segment offsets. Both are
//! keyed by (path, url).

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::key::FileKey;

use super::{DownloadFlag, FlagRecord, PersistenceError, ProgressRecord, ProgressStore};

/// Handle to the SQLite progress database.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/sdm/progress.db`.
#[derive(Clone)]
pub struct SqliteProgressStore {
    pool: Pool<Sqlite>,
}

impl SqliteProgressStore {
    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self, PersistenceError> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")
            .map_err(|e| PersistenceError::StateDir(e.to_string()))?;
        let db_path = xdg_dirs.get_state_home().join("progress.db");
        Self::open_at(db_path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = SqliteProgressStore { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "progress store opened");
        Ok(store)
    }

    /// Private in-memory database (single connection, nothing touches disk).
    pub async fn open_in_memory() -> Result<Self, PersistenceError> {
        // The database lives only as long as its one connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = SqliteProgressStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flags (
                path TEXT NOT NULL,
                url TEXT NOT NULL,
                flag TEXT NOT NULL,
                total_length INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (path, url)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progress (
                path TEXT NOT NULL,
                url TEXT NOT NULL,
                downloaded_length INTEGER NOT NULL,
                segment_offsets TEXT NOT NULL DEFAULT '[]',
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (path, url)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for row timestamps).
fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn decode_offsets(json: &str) -> Result<Vec<u64>, PersistenceError> {
    if json.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json)
        .map_err(|e| PersistenceError::Corrupt(format!("segment offsets {json:?}: {e}")))
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn query_flag(&self, key: &FileKey) -> Result<Option<FlagRecord>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT flag, total_length FROM flags
            WHERE path = ?1 AND url = ?2
            "#,
        )
        .bind(key.path_str())
        .bind(key.url())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<FlagRecord, PersistenceError> {
            let flag: String = row.get("flag");
            let total_length: i64 = row.get("total_length");
            Ok(FlagRecord {
                flag: flag.parse()?,
                total_length: total_length.max(0) as u64,
            })
        })
        .transpose()
    }

    async fn insert_flag(
        &self,
        key: &FileKey,
        flag: DownloadFlag,
        total_length: u64,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO flags (path, url, flag, total_length, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(key.path_str())
        .bind(key.url())
        .bind(flag.as_str())
        .bind(total_length as i64)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_flag(&self, key: &FileKey, flag: DownloadFlag) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            UPDATE flags
            SET flag = ?1,
                updated_at = ?2
            WHERE path = ?3 AND url = ?4
            "#,
        )
        .bind(flag.as_str())
        .bind(unix_timestamp())
        .bind(key.path_str())
        .bind(key.url())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_downloaded_length(&self, key: &FileKey) -> Result<u64, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT downloaded_length FROM progress
            WHERE path = ?1 AND url = ?2
            "#,
        )
        .bind(key.path_str())
        .bind(key.url())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| r.get::<i64, _>("downloaded_length").max(0) as u64)
            .unwrap_or(0))
    }

    async fn query_segment_offsets(&self, key: &FileKey) -> Result<Vec<u64>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT segment_offsets FROM progress
            WHERE path = ?1 AND url = ?2
            "#,
        )
        .bind(key.path_str())
        .bind(key.url())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => decode_offsets(&r.get::<String, _>("segment_offsets")),
            None => Ok(Vec::new()),
        }
    }

    async fn update_download_length(
        &self,
        key: &FileKey,
        downloaded_length: u64,
        segment_offsets: &[u64],
    ) -> Result<(), PersistenceError> {
        let offsets_json = serde_json::to_string(segment_offsets)?;
        sqlx::query(
            r#"
            INSERT INTO progress (path, url, downloaded_length, segment_offsets, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (path, url) DO UPDATE SET
                downloaded_length = excluded.downloaded_length,
                segment_offsets = excluded.segment_offsets,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.path_str())
        .bind(key.url())
        .bind(downloaded_length as i64)
        .bind(offsets_json)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &FileKey) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM flags WHERE path = ?1 AND url = ?2")
            .bind(key.path_str())
            .bind(key.url())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM progress WHERE path = ?1 AND url = ?2")
            .bind(key.path_str())
            .bind(key.url())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProgressRecord>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT f.path, f.url, f.flag, f.total_length,
                   COALESCE(p.downloaded_length, 0) AS downloaded_length,
                   COALESCE(p.segment_offsets, '[]') AS segment_offsets
            FROM flags f
            LEFT JOIN progress p ON p.path = f.path AND p.url = f.url
            ORDER BY f.path ASC, f.url ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let path: String = row.get("path");
            let url: String = row.get("url");
            let flag: String = row.get("flag");
            let total_length: i64 = row.get("total_length");
            let downloaded_length: i64 = row.get("downloaded_length");
            let offsets: String = row.get("segment_offsets");
            out.push(ProgressRecord {
                key: FileKey::new(path, url),
                flag: flag.parse()?,
                total_length: total_length.max(0) as u64,
                downloaded_length: downloaded_length.max(0) as u64,
                segment_offsets: decode_offsets(&offsets)?,
            });
        }
        Ok(out)
    }
}
