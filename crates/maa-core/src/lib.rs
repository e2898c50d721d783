//! Foundational low-level utilities shared across MAA relay crates.
//!
//! Provides atomic file-write helpers for the binding snapshot and time
//! utilities used by presence classification.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::{remove_file_if_present, write_text_atomic};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, elapsed_seconds_between};
