//! Event filter pipeline.
//!
//! Stages run in a fixed order over borrowed events: upcoming only, inside
//! the radius/day window, not hidden. The saved view then floats a chosen
//! calendar day to the top, and the all-events view narrows by genre.

pub mod calendar;
pub mod genres;
pub mod pipeline;

use std::fmt;

pub use calendar::{local_start_date, partition_by_day, saved_calendar, CalendarDay, CalendarMonth};
pub use genres::{filter_by_genre, genre_counts, GenreCount, GenreSelection};
pub use pipeline::{apply_filters, is_upcoming, matches_preferences, window_end};

use crate::models::Event;

/// Which list is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    All,
    Saved,
}

impl View {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" | "events" => Some(View::All),
            "saved" => Some(View::Saved),
            _ => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::All => write!(f, "all"),
            View::Saved => write!(f, "saved"),
        }
    }
}

/// Split the all-events list into events not yet saved and the "Saved
/// events" section, keeping order within each.
pub fn split_saved<'e, F>(events: &[&'e Event], is_saved: F) -> (Vec<&'e Event>, Vec<&'e Event>)
where
    F: Fn(&str) -> bool,
{
    events
        .iter()
        .copied()
        .partition(|event| !is_saved(&event.identity()))
}
