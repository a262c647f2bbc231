//! Foundational low-level utilities shared across umbra crates.
//!
//! Provides the atomic file-write helper used by snapshot persistence and the
//! clock helpers used for staging names and journal lines.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_clock_hms, current_unix_timestamp};
