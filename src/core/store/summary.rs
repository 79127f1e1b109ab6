//! Persisted index of AI meal summaries, keyed by resolved cache key.

use super::{open_connection, placeholders, SummaryIdentity};
use crate::core::keys::{normalize_notes, notes_hash, resolve_summary_key};
use crate::core::schema::SchemaManager;
use crate::error::CacheError;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// AI-summary cache.
///
/// Each row stores one serialized summary under a deterministic key derived
/// from the entry's identity. Rows whose payload no longer parses are
/// deleted at read time, so corruption surfaces only as a cache miss.
pub struct SummaryCacheStore {
    db_path: PathBuf,
}

impl SummaryCacheStore {
    /// Open the store, ensuring the schema is current.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let db_path = db_path.into();
        SchemaManager::new(&db_path).ensure_schema()?;
        Ok(Self { db_path })
    }

    /// Look up a cached summary by identity.
    pub fn get(
        &self,
        identity: &SummaryIdentity<'_>,
    ) -> Result<Option<serde_json::Value>, CacheError> {
        let cache_key = key_for(identity);
        let conn = open_connection(&self.db_path)?;

        let summary_json: Option<String> = conn
            .query_row(
                "SELECT summary_json FROM ai_summary_cache WHERE cache_key = ?",
                [&cache_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let Some(summary_json) = summary_json else {
            return Ok(None);
        };

        match serde_json::from_str(&summary_json) {
            Ok(summary) => {
                debug!(%cache_key, "summary cache hit");
                Ok(Some(summary))
            }
            Err(e) => {
                // Corrupt payload: forget the row and treat as a miss
                warn!(%cache_key, error = %e, "cached summary failed to parse, removing row");
                conn.execute("DELETE FROM ai_summary_cache WHERE cache_key = ?", [&cache_key])
                    .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
                Ok(None)
            }
        }
    }

    /// Insert or overwrite a summary under the resolved key.
    pub fn save(
        &self,
        summary: &serde_json::Value,
        identity: &SummaryIdentity<'_>,
    ) -> Result<(), CacheError> {
        let patient_notes = normalize_notes(identity.patient_notes);
        let cache_key = resolve_summary_key(identity.food_log_id, identity.image_url, patient_notes);
        let notes_hash = notes_hash(patient_notes);
        let summary_json = serde_json::to_string(summary)
            .map_err(|e| CacheError::SerializationFailed(e.to_string()))?;

        let conn = open_connection(&self.db_path)?;
        conn.execute(
            "INSERT OR REPLACE INTO ai_summary_cache
             (cache_key, food_log_id, image_url, patient_notes_hash, summary_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                cache_key,
                identity.food_log_id.unwrap_or(""),
                identity.image_url.unwrap_or(""),
                notes_hash,
                summary_json,
                Utc::now().timestamp(),
            ],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    /// Remove a summary by identity.
    pub fn remove(&self, identity: &SummaryIdentity<'_>) -> Result<(), CacheError> {
        let cache_key = key_for(identity);
        let conn = open_connection(&self.db_path)?;
        conn.execute("DELETE FROM ai_summary_cache WHERE cache_key = ?", [&cache_key])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    /// All cached summaries for a set of food-log ids, grouped by id.
    ///
    /// Rows that fail to parse are skipped rather than healed here; the
    /// next keyed `get` will take care of them.
    pub fn summaries_for_food_logs(
        &self,
        food_log_ids: &[String],
    ) -> Result<HashMap<String, Vec<serde_json::Value>>, CacheError> {
        if food_log_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = open_connection(&self.db_path)?;
        let sql = format!(
            "SELECT food_log_id, summary_json
             FROM ai_summary_cache
             WHERE food_log_id IN ({}) AND food_log_id IS NOT NULL",
            placeholders(food_log_ids.len())
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(food_log_ids), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let mut results: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
        for row in rows {
            let (food_log_id, summary_json) =
                row.map_err(|e| CacheError::QueryFailed(e.to_string()))?;
            match serde_json::from_str(&summary_json) {
                Ok(summary) => results.entry(food_log_id).or_default().push(summary),
                Err(e) => {
                    warn!(%food_log_id, error = %e, "skipping unparseable cached summary");
                }
            }
        }

        Ok(results)
    }

    /// Number of cached summaries.
    pub fn count(&self) -> Result<usize, CacheError> {
        let conn = open_connection(&self.db_path)?;
        conn.query_row("SELECT COUNT(*) FROM ai_summary_cache", [], |row| {
            row.get::<_, i64>(0).map(|v| v as usize)
        })
        .map_err(|e| CacheError::QueryFailed(e.to_string()))
    }

    /// Operator-triggered cache reset: empties the summary cache AND the
    /// image cache sharing this database file.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        let conn = open_connection(&self.db_path)?;
        conn.execute_batch("DELETE FROM image_cache; DELETE FROM ai_summary_cache;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }
}

fn key_for(identity: &SummaryIdentity<'_>) -> String {
    resolve_summary_key(
        identity.food_log_id,
        identity.image_url,
        normalize_notes(identity.patient_notes),
    )
}
