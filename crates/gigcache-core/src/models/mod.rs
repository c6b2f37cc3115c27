//! Data models for live events and search preferences.
//!
//! - `Event`: a provider listing with identity, start time and genre helpers
//! - `SavedEntry`: a saved copy of an event plus when it was saved
//! - `SearchPrefs`, `Location`: the discovery window and the search origin

pub mod event;
pub mod prefs;
pub mod saved;

pub use event::{parse_timestamp, Address, Event, EventName, EventStart, Venue, IGNORED_GENRE_NAMES};
pub use prefs::{
    clamp_days, clamp_radius, days_from_date, end_date, Location, SearchPrefs,
    DEFAULT_LOOKAHEAD_DAYS, DEFAULT_RADIUS_MILES, MAX_LOOKAHEAD_DAYS, MAX_RADIUS_MILES,
    MIN_LOOKAHEAD_DAYS, MIN_RADIUS_MILES,
};
pub use saved::{SavedEntry, StoredSavedEntry};
