//! # foodlog-cache CLI
//!
//! Command-line batch driver for the food-log cache.
//!
//! ## Usage
//! ```bash
//! foodlog-cache fill patient-123 --export window.json --check-eligibility
//! foodlog-cache status F1 F2 F3 --output json
//! ```

mod cli;

use food_log_cache::Result;

fn main() -> Result<()> {
    cli::run()
}
