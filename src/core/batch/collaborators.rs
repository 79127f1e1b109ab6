//! Collaborator seams the orchestrator calls across the cache boundary.
//!
//! The document-store query layer, the remote image API, and the AI vision
//! caller all live outside this crate's core; the orchestrator only sees
//! these traits. Implementations own their own timeouts and retries.

use super::types::{FillWindow, FoodLogEntry};
use crate::error::CollaboratorError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Food-log queries against the document store
pub trait FoodLogSource: Send + Sync {
    /// Lifetime count of the patient's food logs
    fn total_log_count(&self, patient_id: &str) -> Result<u64, CollaboratorError>;

    /// All food-log entries for the patient within the window
    fn logs_in_window(
        &self,
        patient_id: &str,
        window: &FillWindow,
    ) -> Result<Vec<FoodLogEntry>, CollaboratorError>;
}

/// Image-listing API: resolves an entry's image URLs in place
pub trait ImageUrlResolver: Send + Sync {
    fn resolve_urls(&self, entry: &mut FoodLogEntry) -> Result<(), CollaboratorError>;
}

/// Image fetcher: downloads one image to the destination directory.
///
/// `Ok(None)` means the remote side had nothing for this URL; the entry is
/// skipped without being treated as a hard failure.
pub trait ImageDownloader: Send + Sync {
    fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        food_log_id: &str,
        image_index: u32,
    ) -> Result<Option<PathBuf>, CollaboratorError>;
}

/// AI vision caller: produces a structured meal summary for one image.
///
/// `Ok(None)` means the model declined to produce a summary; the entry is
/// skipped. The orchestrator handles cache consultation and persistence,
/// so implementations only ever do the expensive call.
pub trait ImageAnalyzer: Send + Sync {
    fn analyze(
        &self,
        url: &str,
        patient_notes: Option<&str>,
        food_log_id: &str,
        patient_id: &str,
        logged_at: DateTime<Utc>,
    ) -> Result<Option<serde_json::Value>, CollaboratorError>;
}
