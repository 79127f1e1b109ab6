//! Types for the batch cache-fill workflow.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One food-log record as fetched from the document store.
///
/// `image_urls` may be empty until the image-listing collaborator has
/// enriched the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodLogEntry {
    /// Document-store id of the food log
    pub id: String,
    /// Patient the log belongs to
    pub patient_id: String,
    /// When the meal was logged
    pub logged_at: DateTime<Utc>,
    /// Resolved image URLs, in image-index order
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Free-text notes attached by the patient
    #[serde(default)]
    pub patient_notes: Option<String>,
}

/// Time window a fill operates over
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FillWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FillWindow {
    /// Window ending now and reaching back `days` days (default batch
    /// window is the trailing 30 days).
    pub fn trailing_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Window length in (fractional) days
    pub fn days(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 86_400.0
    }
}

impl Default for FillWindow {
    fn default() -> Self {
        Self::trailing_days(30)
    }
}

/// Thresholds for the "active patients" eligibility gate
#[derive(Debug, Clone, Copy)]
pub struct EligibilityConfig {
    /// Patients at or below this lifetime log count are skipped
    pub total_logs_threshold: u64,
    /// Patients at or below this many logs per week in the window are skipped
    pub weekly_rate_threshold: f64,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            total_logs_threshold: 100,
            weekly_rate_threshold: 5.0,
        }
    }
}

/// Why a patient's batch fill was skipped by the eligibility gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TotalLogsTooLow,
    NoLogsInWindow,
    WeeklyLogsTooLow,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TotalLogsTooLow => "total_logs_too_low",
            SkipReason::NoLogsInWindow => "no_logs_in_window",
            SkipReason::WeeklyLogsTooLow => "weekly_logs_too_low",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one patient's batch fill.
///
/// Always a structured result: eligibility rejections and "nothing to do"
/// both land here, never in an error, so a driving UI can always render a
/// status line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillReport {
    pub run_id: Uuid,
    pub patient_id: String,
    /// Set when the eligibility gate rejected the patient
    pub skipped: Option<SkipReason>,
    /// Food-log entries found in the window
    pub total_entries: usize,
    /// Images newly downloaded and cached by this run
    pub total_images: usize,
    /// Summaries newly analyzed and cached by this run
    pub total_summaries: usize,
    /// Pre-fill probe count of cached images for the window's ids
    pub cached_images: usize,
    /// Pre-fill probe count of cached summaries for the window's ids
    pub cached_summaries: usize,
    /// Heuristic verdict: at least one cached image and summary per entry
    pub fully_cached: bool,
    /// Per-entry collaborator failures (the batch continued past these)
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl FillReport {
    pub(crate) fn new(patient_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            skipped: None,
            total_entries: 0,
            total_images: 0,
            total_summaries: 0,
            cached_images: 0,
            cached_summaries: 0,
            fully_cached: false,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }
}
