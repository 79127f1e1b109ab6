//! # Events Module
//!
//! Progress reporting for batch cache fills.
//!
//! The orchestrator emits events through a channel so any driver (CLI
//! progress bar, web status endpoint) can subscribe without the core
//! knowing about it. Fills run fine with no receiver attached.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Fill(FillEvent::EntryProcessed { food_log_id, .. }) = event {
//!             println!("filled {food_log_id}");
//!         }
//!     }
//! });
//!
//! orchestrator.fill_for_patient_with_events("P1", &window, true, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
