//! # Core Module
//!
//! The caching engine behind per-patient food-log reports.
//!
//! ## Modules
//! - `schema` - Table layout and one-time migrations
//! - `keys` - Deterministic cache-key derivation
//! - `store` - Persisted image and AI-summary indexes plus the status probe
//! - `batch` - Eligibility-gated batch cache population

pub mod batch;
pub mod keys;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use batch::{BatchFillOrchestrator, FillReport, FillWindow, FoodLogEntry, SkipReason};
pub use store::{CacheStats, CacheStatus, ImageCacheEntry, ImageKey, SummaryIdentity};
