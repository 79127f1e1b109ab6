//! # Store Module
//!
//! Persisted indexes for downloaded food-log images and AI meal summaries.
//!
//! ## Design
//! - Both stores share one SQLite file; each operation opens a short-lived
//!   connection rather than holding a long-lived handle. This trades
//!   connection reuse for simplicity: nothing leaks across calls and a
//!   crashed batch leaves no open handle behind.
//! - Entries are validated lazily at read time. A row whose backing file or
//!   JSON payload has gone bad is deleted on the spot and reported as a
//!   miss, so callers only ever see a miss followed by normal re-population.

mod image;
mod status;
mod summary;

pub use image::{ImageCacheStore, NewImageEntry};
pub use status::CacheStatusProbe;
pub use summary::SummaryCacheStore;

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of an image cache row.
///
/// The `(food_log_id, image_index)` composite is the preferred identity; a
/// URL is the fallback for rows that predate composite keys. Modeling this
/// as a variant makes the precedence rule type-checked instead of
/// convention-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKey<'a> {
    Composite {
        food_log_id: &'a str,
        image_index: u32,
    },
    Url(&'a str),
}

impl<'a> ImageKey<'a> {
    /// Apply the lookup precedence to a set of optional identity parts.
    ///
    /// Returns `None` when neither a full composite pair nor a non-empty
    /// URL is available; a lookup with no identity is always a miss.
    pub fn from_parts(
        food_log_id: Option<&'a str>,
        image_index: Option<u32>,
        image_url: Option<&'a str>,
    ) -> Option<Self> {
        if let (Some(food_log_id), Some(image_index)) = (food_log_id, image_index) {
            return Some(ImageKey::Composite {
                food_log_id,
                image_index,
            });
        }
        match image_url {
            Some(url) if !url.is_empty() => Some(ImageKey::Url(url)),
            _ => None,
        }
    }
}

/// Identity of a cached AI summary.
///
/// The key resolver derives the storage key from these parts; see
/// [`crate::core::keys::resolve_summary_key`] for the precedence rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryIdentity<'a> {
    pub food_log_id: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub patient_notes: Option<&'a str>,
}

impl<'a> SummaryIdentity<'a> {
    pub fn for_food_log(food_log_id: &'a str) -> Self {
        Self {
            food_log_id: Some(food_log_id),
            ..Self::default()
        }
    }

    pub fn for_url(image_url: &'a str) -> Self {
        Self {
            image_url: Some(image_url),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, image_url: &'a str) -> Self {
        self.image_url = Some(image_url);
        self
    }

    pub fn with_notes(mut self, patient_notes: &'a str) -> Self {
        self.patient_notes = Some(patient_notes);
        self
    }
}

/// A cached image entry as returned on a hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCacheEntry {
    /// Filesystem location of the cached blob
    pub local_path: PathBuf,
    /// Content hash recorded at download time
    pub file_hash: Option<String>,
    /// When the blob was downloaded
    pub download_time: Option<DateTime<Utc>>,
    /// Size of the blob in bytes
    pub file_size: Option<u64>,
}

/// Aggregate statistics over both cache tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of image rows
    pub image_count: usize,
    /// Number of summary rows
    pub summary_count: usize,
    /// Sum of recorded image file sizes (rows without a size excluded)
    pub total_image_bytes: u64,
}

/// Per-patient cache coverage reported by the status probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStatus {
    /// Distinct food-log entries with at least one cached image
    pub cached_images: usize,
    /// Distinct food-log entries with a cached summary
    pub cached_summaries: usize,
    /// Size of the id set the probe was asked about
    pub total_food_logs: usize,
}

pub(crate) fn open_connection(db_path: &Path) -> Result<Connection, CacheError> {
    Connection::open(db_path).map_err(|e| CacheError::OpenFailed {
        path: db_path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_key_wins_over_url() {
        let key = ImageKey::from_parts(Some("F1"), Some(0), Some("https://x/a.jpg"));

        assert_eq!(
            key,
            Some(ImageKey::Composite {
                food_log_id: "F1",
                image_index: 0,
            })
        );
    }

    #[test]
    fn url_is_the_fallback() {
        let key = ImageKey::from_parts(Some("F1"), None, Some("https://x/a.jpg"));

        assert_eq!(key, Some(ImageKey::Url("https://x/a.jpg")));
    }

    #[test]
    fn no_identity_means_no_key() {
        assert_eq!(ImageKey::from_parts(None, Some(3), None), None);
        assert_eq!(ImageKey::from_parts(None, None, Some("")), None);
        assert_eq!(ImageKey::from_parts(None, None, None), None);
    }

    #[test]
    fn summary_identity_builder() {
        let identity = SummaryIdentity::for_food_log("F1")
            .with_url("https://x/a.jpg")
            .with_notes("no dairy");

        assert_eq!(identity.food_log_id, Some("F1"));
        assert_eq!(identity.image_url, Some("https://x/a.jpg"));
        assert_eq!(identity.patient_notes, Some("no dairy"));
    }
}
