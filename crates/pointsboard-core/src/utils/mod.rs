//! Utility functions for display formatting.

pub mod format;

pub use format::{format_date, format_placement_result, truncate_string};
