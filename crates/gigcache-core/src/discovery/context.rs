use chrono::{DateTime, TimeZone};

use super::status::{EventSource, Status};
use crate::filter::{apply_filters, genre_counts, CalendarDay, GenreSelection, View};
use crate::library::EventLibrary;
use crate::models::{Event, Location, SearchPrefs};

/// Everything a discovery session knows between calls.
pub struct DiscoveryContext {
    pub prefs: SearchPrefs,
    pub library: EventLibrary,
    /// Latest fetched or cached events, in provider order.
    pub events: Vec<Event>,
    pub view: View,
    pub genres: GenreSelection,
    pub calendar_day: Option<CalendarDay>,
    pub source: Option<EventSource>,
    pub fetched_at: Option<i64>,
    pub location: Option<Location>,
    pub status: Option<Status>,
}

impl DiscoveryContext {
    pub fn new(library: EventLibrary) -> Self {
        Self {
            prefs: SearchPrefs::default(),
            library,
            events: Vec::new(),
            view: View::default(),
            genres: GenreSelection::default(),
            calendar_day: None,
            source: None,
            fetched_at: None,
            location: None,
            status: None,
        }
    }

    /// Events of the current view that survive the time, preference and
    /// hidden-event stages.
    pub fn visible_events<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<&Event> {
        let source: Vec<&Event> = match self.view {
            View::All => self.events.iter().collect(),
            View::Saved => self.library.saved_events(),
        };
        apply_filters(source, now, &self.prefs, |id| self.library.is_event_hidden(id))
    }

    /// Genre labels on offer in the all-events view, sorted.
    pub fn available_genres<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<String> {
        let visible = match self.view {
            View::All => self.visible_events(now),
            View::Saved => {
                let events: Vec<&Event> = self.events.iter().collect();
                apply_filters(events, now, &self.prefs, |id| self.library.is_event_hidden(id))
            }
        };
        genre_counts(&visible, &GenreSelection::All, |g| self.library.is_genre_hidden(g))
            .into_iter()
            .map(|facet| facet.genre)
            .collect()
    }
}
