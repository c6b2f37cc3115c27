//! Utility functions for display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{
    format_distance, format_end_date, format_event_date, format_genre_label, format_timestamp,
    truncate_string,
};
