//! Persisted index of downloaded food-log images.

use super::{open_connection, CacheStats, ImageCacheEntry, ImageKey};
use crate::core::schema::SchemaManager;
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Image-blob cache keyed by `(food_log_id, image_index)` with a URL
/// fallback for rows that predate composite keys.
///
/// The store is self-healing: a hit whose backing file has been deleted or
/// moved is forgotten on the spot instead of served as a false hit.
pub struct ImageCacheStore {
    db_path: PathBuf,
}

/// Parameters for saving an image cache entry
#[derive(Debug, Clone)]
pub struct NewImageEntry {
    pub local_path: PathBuf,
    pub food_log_id: Option<String>,
    pub image_index: Option<u32>,
    pub image_url: Option<String>,
    pub file_hash: Option<String>,
    pub file_size: Option<u64>,
}

impl ImageCacheStore {
    /// Open the store, ensuring the schema is current.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let db_path = db_path.into();
        SchemaManager::new(&db_path).ensure_schema()?;
        Ok(Self { db_path })
    }

    /// Look up a cached image.
    ///
    /// Validity is checked lazily: on a hit the referenced file must still
    /// exist, otherwise the stale row is deleted and the lookup reports a
    /// miss.
    pub fn get(&self, key: &ImageKey<'_>) -> Result<Option<ImageCacheEntry>, CacheError> {
        let conn = open_connection(&self.db_path)?;

        let entry = match key {
            ImageKey::Composite {
                food_log_id,
                image_index,
            } => conn
                .query_row(
                    "SELECT local_path, file_hash, download_time, file_size
                     FROM image_cache
                     WHERE food_log_id = ? AND image_index = ?",
                    params![food_log_id, *image_index as i64],
                    entry_from_row,
                )
                .optional(),
            ImageKey::Url(url) => conn
                .query_row(
                    "SELECT local_path, file_hash, download_time, file_size
                     FROM image_cache
                     WHERE image_url = ?",
                    [url],
                    entry_from_row,
                )
                .optional(),
        }
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        if entry.local_path.exists() {
            debug!(path = %entry.local_path.display(), "image cache hit");
            return Ok(Some(entry));
        }

        // Backing file vanished: forget the row so the next fill re-downloads
        warn!(
            path = %entry.local_path.display(),
            "cached image file missing, removing stale row"
        );
        Self::delete_by_key(&conn, key)?;
        Ok(None)
    }

    /// Insert or overwrite an entry.
    ///
    /// `download_time` is always set to now, superseding any prior value.
    /// The URL is stored as an empty string when absent so the uniqueness
    /// constraint never sees NULL.
    pub fn save(&self, entry: NewImageEntry) -> Result<(), CacheError> {
        let conn = open_connection(&self.db_path)?;

        conn.execute(
            "INSERT OR REPLACE INTO image_cache
             (food_log_id, image_index, image_url, local_path, file_hash, download_time, file_size)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.food_log_id,
                entry.image_index.map(|i| i as i64),
                entry.image_url.as_deref().unwrap_or(""),
                entry.local_path.to_string_lossy(),
                entry.file_hash,
                Utc::now().timestamp(),
                entry.file_size.map(|s| s as i64),
            ],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Remove an entry by identity.
    pub fn remove(&self, key: &ImageKey<'_>) -> Result<(), CacheError> {
        let conn = open_connection(&self.db_path)?;
        Self::delete_by_key(&conn, key)
    }

    /// Aggregate counts over both cache tables plus the image byte total.
    ///
    /// Image rows without a recorded size contribute to the count but not
    /// the sum.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = open_connection(&self.db_path)?;

        let image_count: usize = conn
            .query_row("SELECT COUNT(*) FROM image_cache", [], |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let summary_count: usize = conn
            .query_row("SELECT COUNT(*) FROM ai_summary_cache", [], |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let total_image_bytes: u64 = conn
            .query_row(
                "SELECT COALESCE(SUM(file_size), 0) FROM image_cache WHERE file_size IS NOT NULL",
                [],
                |row| row.get::<_, i64>(0).map(|v| v as u64),
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(CacheStats {
            image_count,
            summary_count,
            total_image_bytes,
        })
    }

    fn delete_by_key(conn: &Connection, key: &ImageKey<'_>) -> Result<(), CacheError> {
        match key {
            ImageKey::Composite {
                food_log_id,
                image_index,
            } => conn.execute(
                "DELETE FROM image_cache WHERE food_log_id = ? AND image_index = ?",
                params![food_log_id, *image_index as i64],
            ),
            ImageKey::Url(url) => {
                conn.execute("DELETE FROM image_cache WHERE image_url = ?", [url])
            }
        }
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(())
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ImageCacheEntry> {
    Ok(ImageCacheEntry {
        local_path: PathBuf::from(row.get::<_, String>(0)?),
        file_hash: row.get(1)?,
        download_time: row
            .get::<_, Option<i64>>(2)?
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        file_size: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
    })
}
