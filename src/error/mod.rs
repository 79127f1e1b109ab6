//! # Error Module
//!
//! Error types for the food-log cache core.
//!
//! ## Design Principles
//! - **Never panic** on store contents - stale or corrupt rows are healed, not fatal
//! - **Include context** - paths, cache keys, what went wrong
//! - **Batch work keeps going** - per-entry collaborator failures are recorded
//!   in the fill report, only gate/window queries abort a patient's batch

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum FoodLogCacheError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Batch fill error: {0}")]
    Batch(#[from] BatchError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors from the persisted cache stores
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    #[error("Failed to serialize summary data: {0}")]
    SerializationFailed(String),
}

/// Errors from external collaborators (document store, image API, AI caller)
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Food-log query failed for patient {patient_id}: {reason}")]
    QueryFailed { patient_id: String, reason: String },

    #[error("Image URL listing failed: {0}")]
    UrlListingFailed(String),

    #[error("Failed to download image {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("AI analysis failed for food log {food_log_id}: {reason}")]
    AnalysisFailed { food_log_id: String, reason: String },
}

/// Errors that abort a single patient's batch fill
///
/// Per-entry failures never surface here; they are collected in the
/// fill report and the batch continues.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Eligibility check failed for patient {patient_id}: {source}")]
    EligibilityQuery {
        patient_id: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("Window fetch failed for patient {patient_id}: {source}")]
    WindowFetch {
        patient_id: String,
        #[source]
        source: CollaboratorError,
    },

    #[error("Cache error during batch fill: {0}")]
    Cache(#[from] CacheError),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, FoodLogCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_error_includes_path() {
        let error = CacheError::OpenFailed {
            path: PathBuf::from("/data/cache.db"),
            reason: "permission denied".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/data/cache.db"));
        assert!(message.contains("permission denied"));
    }

    #[test]
    fn collaborator_error_includes_url() {
        let error = CollaboratorError::DownloadFailed {
            url: "https://img.example/a.jpg".to_string(),
            reason: "timeout".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("https://img.example/a.jpg"));
        assert!(message.contains("timeout"));
    }

    #[test]
    fn batch_error_names_patient() {
        let error = BatchError::EligibilityQuery {
            patient_id: "P-42".to_string(),
            source: CollaboratorError::QueryFailed {
                patient_id: "P-42".to_string(),
                reason: "connection refused".to_string(),
            },
        };
        assert!(error.to_string().contains("P-42"));
    }
}
