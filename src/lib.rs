//! # Food-Log Cache
//!
//! Persistent image and AI-summary caching for patient food-log reports.
//!
//! ## Core Philosophy
//! - **Never pay twice** - image downloads and AI inference run only on cache misses
//! - **Self-healing** - rows pointing at missing files or corrupt payloads are
//!   forgotten at read time, surfacing as ordinary misses
//! - **Always report** - batch fills return a structured result, never a bare error
//!
//! ## Architecture
//! The library is split into a core engine and thin surrounding layers:
//! - `core` - Schema, key resolution, the two cache stores, batch fill
//! - `events` - Event-driven progress reporting (UI-ready)
//! - `error` - Error taxonomy
//! - `cli` - Command-line batch driver

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{FoodLogCacheError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or server).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
