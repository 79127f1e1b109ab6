//! # Batch Module
//!
//! Resumable, eligibility-gated cache population across a patient's
//! food-log window.
//!
//! ## Flow
//! 1. Eligibility gate (batch mode only): lifetime volume and recent
//!    weekly rate thresholds
//! 2. Window fetch and image-URL enrichment
//! 3. Per-entry fill: download on image-cache miss, analyze on
//!    summary-cache miss
//! 4. Completion verdict from the pre-fill status probe

mod collaborators;
mod orchestrator;
mod types;

pub use collaborators::{FoodLogSource, ImageAnalyzer, ImageDownloader, ImageUrlResolver};
pub use orchestrator::{BatchFillBuilder, BatchFillOrchestrator};
pub use types::{EligibilityConfig, FillReport, FillWindow, FoodLogEntry, SkipReason};
