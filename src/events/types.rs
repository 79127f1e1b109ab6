//! Event type definitions for fill progress reporting.

use crate::core::batch::SkipReason;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All events emitted by the cache core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Batch fill progress
    Fill(FillEvent),
}

/// Events during a patient's batch cache fill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FillEvent {
    /// Fill has started; total_entries is the window size after fetch
    Started {
        run_id: Uuid,
        patient_id: String,
        total_entries: usize,
    },
    /// The eligibility gate rejected this patient
    EligibilitySkipped {
        patient_id: String,
        reason: SkipReason,
    },
    /// One entry finished (possibly entirely from cache)
    EntryProcessed {
        food_log_id: String,
        images_added: usize,
        summary_added: bool,
    },
    /// A collaborator call failed for this entry; the fill continues
    EntryFailed {
        food_log_id: String,
        message: String,
    },
    /// Fill completed
    Completed { summary: FillSummary },
}

/// Summary of a completed fill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSummary {
    pub total_entries: usize,
    pub total_images: usize,
    pub total_summaries: usize,
    pub fully_cached: bool,
    pub error_count: usize,
    pub duration_ms: u64,
}
