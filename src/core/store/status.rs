//! Aggregate cache-coverage probe used to gate batch work.

use super::{open_connection, placeholders, CacheStatus};
use crate::core::schema::SchemaManager;
use crate::error::CacheError;
use rusqlite::params_from_iter;
use std::path::PathBuf;
use tracing::debug;

/// Reports how much of a food-log id set is already cached.
///
/// The counts are an approximation sufficient for a skip-vs-process
/// decision, not an exact per-image accounting: image coverage is counted
/// per `(food_log_id, image_index)` pair, and summary coverage falls back
/// to URL matching for legacy rows that predate the food_log_id column.
pub struct CacheStatusProbe {
    db_path: PathBuf,
}

impl CacheStatusProbe {
    /// Open the probe, ensuring the schema is current.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let db_path = db_path.into();
        SchemaManager::new(&db_path).ensure_schema()?;
        Ok(Self { db_path })
    }

    /// Count cached images and summaries across the given id set.
    ///
    /// An empty id set returns zeros without touching the store.
    pub fn check_status(&self, food_log_ids: &[String]) -> Result<CacheStatus, CacheError> {
        if food_log_ids.is_empty() {
            return Ok(CacheStatus::default());
        }

        let conn = open_connection(&self.db_path)?;
        let id_placeholders = placeholders(food_log_ids.len());

        let cached_images: usize = conn
            .query_row(
                &format!(
                    "SELECT COUNT(DISTINCT food_log_id || '_' || CAST(image_index AS TEXT))
                     FROM image_cache
                     WHERE food_log_id IN ({id_placeholders})"
                ),
                params_from_iter(food_log_ids),
                |row| row.get::<_, i64>(0).map(|v| v as usize),
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let cached_by_id: usize = conn
            .query_row(
                &format!(
                    "SELECT COUNT(DISTINCT food_log_id)
                     FROM ai_summary_cache
                     WHERE food_log_id IN ({id_placeholders})
                       AND food_log_id IS NOT NULL AND food_log_id != ''"
                ),
                params_from_iter(food_log_ids),
                |row| row.get::<_, i64>(0).map(|v| v as usize),
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        // Legacy summary rows were keyed by URL only; count those through
        // the URLs the image cache knows for this id set
        let mut stmt = conn
            .prepare(&format!(
                "SELECT DISTINCT image_url
                 FROM image_cache
                 WHERE food_log_id IN ({id_placeholders}) AND image_url IS NOT NULL"
            ))
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let image_urls: Vec<String> = stmt
            .query_map(params_from_iter(food_log_ids), |row| row.get(0))
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        drop(stmt);

        let cached_by_url: usize = if image_urls.is_empty() {
            0
        } else {
            let url_placeholders = placeholders(image_urls.len());
            let sql = format!(
                "SELECT COUNT(DISTINCT image_url)
                 FROM ai_summary_cache
                 WHERE image_url IN ({url_placeholders})
                   AND (food_log_id IS NULL OR food_log_id = ''
                        OR food_log_id NOT IN ({id_placeholders}))"
            );
            let bindings = image_urls.iter().chain(food_log_ids.iter());
            conn.query_row(&sql, params_from_iter(bindings), |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?
        };

        let status = CacheStatus {
            cached_images,
            cached_summaries: cached_by_id + cached_by_url,
            total_food_logs: food_log_ids.len(),
        };
        debug!(
            cached_images = status.cached_images,
            cached_summaries = status.cached_summaries,
            total = status.total_food_logs,
            "cache status probed"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{ImageCacheStore, NewImageEntry, SummaryCacheStore, SummaryIdentity};
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        probe: CacheStatusProbe,
        images: ImageCacheStore,
        summaries: SummaryCacheStore,
        dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("cache.db");
        Fixture {
            probe: CacheStatusProbe::open(&db_path).unwrap(),
            images: ImageCacheStore::open(&db_path).unwrap(),
            summaries: SummaryCacheStore::open(&db_path).unwrap(),
            dir,
        }
    }

    fn cache_image(f: &Fixture, food_log_id: &str, index: u32) -> PathBuf {
        let path = f.dir.path().join(format!("{food_log_id}-{index}.jpg"));
        fs::write(&path, b"bytes").unwrap();
        f.images
            .save(NewImageEntry {
                local_path: path.clone(),
                food_log_id: Some(food_log_id.to_string()),
                image_index: Some(index),
                image_url: Some(format!("https://x/{food_log_id}/{index}.jpg")),
                file_hash: None,
                file_size: Some(5),
            })
            .unwrap();
        path
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_id_set_returns_zeros() {
        let f = fixture();
        let status = f.probe.check_status(&[]).unwrap();

        assert_eq!(status.cached_images, 0);
        assert_eq!(status.cached_summaries, 0);
        assert_eq!(status.total_food_logs, 0);
    }

    #[test]
    fn counts_images_per_index_pair() {
        let f = fixture();
        cache_image(&f, "F1", 0);
        cache_image(&f, "F1", 1);
        cache_image(&f, "F2", 0);
        cache_image(&f, "OTHER", 0);

        let status = f.probe.check_status(&ids(&["F1", "F2"])).unwrap();

        assert_eq!(status.cached_images, 3);
        assert_eq!(status.total_food_logs, 2);
    }

    #[test]
    fn counts_summaries_by_food_log_id() {
        let f = fixture();
        f.summaries
            .save(&json!({"meal": "lunch"}), &SummaryIdentity::for_food_log("F1"))
            .unwrap();
        f.summaries
            .save(&json!({"meal": "dinner"}), &SummaryIdentity::for_food_log("F3"))
            .unwrap();

        let status = f.probe.check_status(&ids(&["F1", "F2"])).unwrap();

        assert_eq!(status.cached_summaries, 1);
    }

    #[test]
    fn url_fallback_counts_legacy_summary_rows() {
        let f = fixture();
        cache_image(&f, "F1", 0);

        // Legacy row: summary cached by URL only, before food_log_id existed
        f.summaries
            .save(
                &json!({"meal": "lunch"}),
                &SummaryIdentity::for_url("https://x/F1/0.jpg"),
            )
            .unwrap();

        let status = f.probe.check_status(&ids(&["F1"])).unwrap();

        assert_eq!(status.cached_summaries, 1);
    }
}
