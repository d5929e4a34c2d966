//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageCursor`: Tracks the page index and wrap-around marker of a region walk
//! - `ZipcodeOutcome`: The final state of each postal code in a run

mod cursor;
mod zipcode_state;

// Re-export main types
pub use cursor::{CursorStep, PageCursor};
pub use zipcode_state::ZipcodeOutcome;
