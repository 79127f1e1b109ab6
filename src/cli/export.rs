//! File-backed collaborators for offline batch runs.
//!
//! The production web app talks to the document store, the vendor image
//! API, and the AI vision model directly. The CLI instead works from a
//! window export: a JSON snapshot of a patient's food-log entries produced
//! by the upstream query tooling, with image URLs pointing at already
//! fetched files on disk and (optionally) precomputed summaries.

use food_log_cache::core::batch::{
    FillWindow, FoodLogEntry, FoodLogSource, ImageAnalyzer, ImageDownloader,
};
use food_log_cache::error::CollaboratorError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A window export file as written by the query tooling
#[derive(Debug, Deserialize)]
pub struct WindowExport {
    pub patient_id: String,
    /// Lifetime log count, used by the eligibility gate
    #[serde(default)]
    pub total_log_count: u64,
    pub entries: Vec<FoodLogEntry>,
}

impl WindowExport {
    pub fn load(path: &Path) -> Result<Self, CollaboratorError> {
        let raw = fs::read_to_string(path).map_err(|e| CollaboratorError::QueryFailed {
            patient_id: String::new(),
            reason: format!("cannot read export {}: {e}", path.display()),
        })?;
        serde_json::from_str(&raw).map_err(|e| CollaboratorError::QueryFailed {
            patient_id: String::new(),
            reason: format!("malformed export {}: {e}", path.display()),
        })
    }
}

/// Food-log source backed by a window export
pub struct ExportSource {
    export: WindowExport,
}

impl ExportSource {
    pub fn new(export: WindowExport) -> Self {
        Self { export }
    }
}

impl FoodLogSource for ExportSource {
    fn total_log_count(&self, _patient_id: &str) -> Result<u64, CollaboratorError> {
        Ok(self.export.total_log_count)
    }

    fn logs_in_window(
        &self,
        patient_id: &str,
        window: &FillWindow,
    ) -> Result<Vec<FoodLogEntry>, CollaboratorError> {
        Ok(self
            .export
            .entries
            .iter()
            .filter(|e| {
                e.patient_id == patient_id
                    && e.logged_at >= window.start
                    && e.logged_at <= window.end
            })
            .cloned()
            .collect())
    }
}

/// Downloader that resolves URLs as local file paths.
///
/// Export files reference images the upstream tooling already fetched;
/// "downloading" copies the blob into the cache image directory under the
/// canonical `{food_log_id}_{index}` name. A URL pointing nowhere yields
/// `None`, matching a remote 404.
pub struct LocalFileDownloader;

impl ImageDownloader for LocalFileDownloader {
    fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        food_log_id: &str,
        image_index: u32,
    ) -> Result<Option<PathBuf>, CollaboratorError> {
        let source = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        if !source.exists() {
            return Ok(None);
        }

        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let dest = dest_dir.join(format!("{food_log_id}_{image_index}{ext}"));

        fs::create_dir_all(dest_dir).map_err(|e| CollaboratorError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        fs::copy(&source, &dest).map_err(|e| CollaboratorError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(dest))
    }
}

/// Analyzer serving precomputed summaries keyed by food-log id.
///
/// Without a summaries file every analysis "declines", leaving summary
/// rows to a later run that has one.
pub struct PrecomputedAnalyzer {
    summaries: HashMap<String, serde_json::Value>,
}

impl PrecomputedAnalyzer {
    pub fn empty() -> Self {
        Self {
            summaries: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CollaboratorError> {
        let raw = fs::read_to_string(path).map_err(|e| CollaboratorError::AnalysisFailed {
            food_log_id: String::new(),
            reason: format!("cannot read summaries {}: {e}", path.display()),
        })?;
        let summaries = serde_json::from_str(&raw).map_err(|e| {
            CollaboratorError::AnalysisFailed {
                food_log_id: String::new(),
                reason: format!("malformed summaries {}: {e}", path.display()),
            }
        })?;
        Ok(Self { summaries })
    }
}

impl ImageAnalyzer for PrecomputedAnalyzer {
    fn analyze(
        &self,
        _url: &str,
        _patient_notes: Option<&str>,
        food_log_id: &str,
        _patient_id: &str,
        _logged_at: DateTime<Utc>,
    ) -> Result<Option<serde_json::Value>, CollaboratorError> {
        Ok(self.summaries.get(food_log_id).cloned())
    }
}
