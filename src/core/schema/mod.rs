//! # Schema Module
//!
//! Ensures the cache database has the current table layout.
//!
//! The image cache originally keyed rows by URL alone. The current layout
//! adds a `(food_log_id, image_index)` composite primary key, so a one-time
//! migration copies legacy rows into the new layout (composite columns left
//! NULL, since legacy rows cannot be backfilled). The whole
//! create-copy-drop-rename sequence runs in a single transaction: a crash
//! mid-migration can never leave both tables absent.

use crate::error::CacheError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Manages table layout and one-time migrations for the cache database.
///
/// `ensure_schema` is idempotent and safe to call on every process start;
/// the stores call it once when they are constructed.
pub struct SchemaManager {
    db_path: PathBuf,
}

impl SchemaManager {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Bring the database up to the current layout.
    pub fn ensure_schema(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::OpenFailed {
                path: self.db_path.clone(),
                reason: e.to_string(),
            })?;
        }

        let mut conn = Connection::open(&self.db_path).map_err(|e| CacheError::OpenFailed {
            path: self.db_path.clone(),
            reason: e.to_string(),
        })?;

        self.migrate_legacy_image_cache(&mut conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS image_cache (
                image_url TEXT,
                food_log_id TEXT,
                image_index INTEGER,
                local_path TEXT NOT NULL,
                file_hash TEXT,
                download_time INTEGER,
                file_size INTEGER,
                PRIMARY KEY (food_log_id, image_index),
                UNIQUE(image_url)
            )",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ai_summary_cache (
                cache_key TEXT PRIMARY KEY,
                food_log_id TEXT,
                image_url TEXT NOT NULL,
                patient_notes_hash TEXT,
                summary_json TEXT NOT NULL,
                created_at INTEGER
            )",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        self.add_summary_food_log_id_column(&conn)?;

        // Secondary indexes for the lookup paths the stores and the status
        // probe actually take
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_image_url ON image_cache(image_url);
             CREATE INDEX IF NOT EXISTS idx_food_log_id ON image_cache(food_log_id);
             CREATE INDEX IF NOT EXISTS idx_ai_summary_image_url ON ai_summary_cache(image_url);
             CREATE INDEX IF NOT EXISTS idx_ai_summary_notes_hash ON ai_summary_cache(patient_notes_hash);
             CREATE INDEX IF NOT EXISTS idx_ai_summary_food_log_id ON ai_summary_cache(food_log_id);",
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Detect and migrate an image_cache table that predates the
    /// `(food_log_id, image_index)` composite key.
    ///
    /// Detection failures (most commonly: the table does not exist yet) mean
    /// there is nothing to migrate, never a fatal error.
    fn migrate_legacy_image_cache(&self, conn: &mut Connection) -> Result<(), CacheError> {
        let columns = match table_columns(conn, "image_cache") {
            Ok(columns) => columns,
            Err(e) => {
                debug!(error = %e, "image_cache layout probe failed, assuming no migration needed");
                return Ok(());
            }
        };

        if columns.is_empty() || columns.iter().any(|c| c == "food_log_id") {
            return Ok(());
        }

        info!("migrating image_cache to composite-key layout");

        let tx = conn
            .transaction()
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;

        tx.execute_batch(
            "CREATE TABLE image_cache_new (
                image_url TEXT,
                food_log_id TEXT,
                image_index INTEGER,
                local_path TEXT NOT NULL,
                file_hash TEXT,
                download_time INTEGER,
                file_size INTEGER,
                PRIMARY KEY (food_log_id, image_index),
                UNIQUE(image_url)
            );
            INSERT INTO image_cache_new (image_url, local_path, file_hash, download_time, file_size)
                SELECT image_url, local_path, file_hash, download_time, file_size
                FROM image_cache;
            DROP TABLE image_cache;
            ALTER TABLE image_cache_new RENAME TO image_cache;",
        )
        .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;

        tx.commit()
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;

        info!("image_cache migration completed");
        Ok(())
    }

    /// Older summary tables lack the food_log_id column the status probe
    /// counts by; add it in place.
    fn add_summary_food_log_id_column(&self, conn: &Connection) -> Result<(), CacheError> {
        let columns = match table_columns(conn, "ai_summary_cache") {
            Ok(columns) => columns,
            Err(_) => return Ok(()),
        };

        if !columns.is_empty() && !columns.iter().any(|c| c == "food_log_id") {
            info!("adding food_log_id column to ai_summary_cache");
            conn.execute("ALTER TABLE ai_summary_cache ADD COLUMN food_log_id TEXT", [])
                .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    fn create_legacy_table(db_path: &Path, rows: usize) {
        let conn = Connection::open(db_path).unwrap();
        conn.execute(
            "CREATE TABLE image_cache (
                image_url TEXT PRIMARY KEY,
                local_path TEXT NOT NULL,
                file_hash TEXT,
                download_time INTEGER,
                file_size INTEGER
            )",
            [],
        )
        .unwrap();

        for i in 0..rows {
            conn.execute(
                "INSERT INTO image_cache (image_url, local_path, file_hash, download_time, file_size)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    format!("https://img.example/{i}.jpg"),
                    format!("/img/{i}.jpg"),
                    format!("hash-{i}"),
                    1_700_000_000_i64 + i as i64,
                    1000 + i as i64,
                ],
            )
            .unwrap();
        }
    }

    #[test]
    fn ensure_schema_creates_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        SchemaManager::new(&db_path).ensure_schema().unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM image_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ai_summary_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        let manager = SchemaManager::new(&db_path);
        manager.ensure_schema().unwrap();
        manager.ensure_schema().unwrap();
        manager.ensure_schema().unwrap();
    }

    #[test]
    fn migration_preserves_legacy_rows() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        create_legacy_table(&db_path, 3);

        SchemaManager::new(&db_path).ensure_schema().unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM image_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);

        // Composite-key columns exist but are NULL; payload columns survive
        let (food_log_id, local_path, file_hash, file_size): (
            Option<String>,
            String,
            Option<String>,
            Option<i64>,
        ) = conn
            .query_row(
                "SELECT food_log_id, local_path, file_hash, file_size
                 FROM image_cache WHERE image_url = ?",
                ["https://img.example/1.jpg"],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();

        assert!(food_log_id.is_none());
        assert_eq!(local_path, "/img/1.jpg");
        assert_eq!(file_hash.as_deref(), Some("hash-1"));
        assert_eq!(file_size, Some(1001));
    }

    #[test]
    fn migration_does_not_run_twice() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        create_legacy_table(&db_path, 2);

        let manager = SchemaManager::new(&db_path);
        manager.ensure_schema().unwrap();
        manager.ensure_schema().unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM image_cache", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn old_summary_table_gains_food_log_id_column() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute(
                "CREATE TABLE ai_summary_cache (
                    cache_key TEXT PRIMARY KEY,
                    image_url TEXT NOT NULL,
                    patient_notes_hash TEXT,
                    summary_json TEXT NOT NULL,
                    created_at INTEGER
                )",
                [],
            )
            .unwrap();
        }

        SchemaManager::new(&db_path).ensure_schema().unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let columns = table_columns(&conn, "ai_summary_cache").unwrap();
        assert!(columns.iter().any(|c| c == "food_log_id"));
    }
}
