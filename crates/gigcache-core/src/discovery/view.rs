use chrono::{DateTime, TimeZone};

use super::context::DiscoveryContext;
use super::status::{EventSource, Status};
use crate::filter::{
    filter_by_genre, genre_counts, partition_by_day, saved_calendar, split_saved, CalendarDay,
    CalendarMonth, GenreCount, View,
};
use crate::models::{Event, SearchPrefs};

const NO_SAVED_NOTICE: &str = "No saved events yet.";
const NO_EVENTS_NOTICE: &str = "No events found.";
const NO_GENRE_MATCH_NOTICE: &str = "Select at least one tag to see matching shows.";

/// One event ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleEvent {
    pub identity: String,
    pub event: Event,
    /// Effective genres, as shown on the card.
    pub genres: Vec<String>,
    pub saved: bool,
}

/// An owned snapshot of what the current view shows.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedView {
    pub view: View,
    pub prefs: SearchPrefs,
    pub source: Option<EventSource>,
    pub fetched_at: Option<i64>,
    /// Main list. In the all-events view this holds only unsaved events.
    pub events: Vec<VisibleEvent>,
    /// The "Saved events" section of the all-events view.
    pub saved_section: Vec<VisibleEvent>,
    /// Events left after the time, preference and hidden stages, before
    /// genre narrowing.
    pub visible_count: usize,
    pub genres: Vec<GenreCount>,
    pub hidden_genres: Vec<String>,
    pub calendar: Vec<CalendarMonth>,
    pub calendar_day: Option<CalendarDay>,
    pub status: Option<Status>,
    /// Empty-state or summary text for the list itself.
    pub notice: Option<String>,
}

impl RenderedView {
    pub fn build<Tz: TimeZone>(ctx: &DiscoveryContext, now: &DateTime<Tz>) -> Self {
        let library = &ctx.library;
        let is_genre_hidden = |genre: &str| library.is_genre_hidden(genre);
        let to_visible = |event: &Event| VisibleEvent {
            identity: event.identity(),
            event: event.clone(),
            genres: event.effective_genres(is_genre_hidden),
            saved: library.is_saved(&event.identity()),
        };

        let visible = ctx.visible_events(now);
        let visible_count = visible.len();

        let mut rendered = RenderedView {
            view: ctx.view,
            prefs: ctx.prefs,
            source: ctx.source,
            fetched_at: ctx.fetched_at,
            events: Vec::new(),
            saved_section: Vec::new(),
            visible_count,
            genres: Vec::new(),
            hidden_genres: library.hidden_genres().iter().cloned().collect(),
            calendar: Vec::new(),
            calendar_day: ctx.calendar_day,
            status: ctx.status.clone(),
            notice: None,
        };

        match ctx.view {
            View::Saved => {
                rendered.calendar = saved_calendar(&visible, now);
                let ordered = match ctx.calendar_day {
                    Some(day) => partition_by_day(visible, day, &now.timezone()),
                    None => visible,
                };
                rendered.notice = Some(if ordered.is_empty() {
                    NO_SAVED_NOTICE.to_string()
                } else {
                    let plural = if ordered.len() == 1 { "" } else { "s" };
                    format!("Showing {} saved event{}.", ordered.len(), plural)
                });
                rendered.events = ordered.into_iter().map(to_visible).collect();
            }
            View::All => {
                rendered.genres = genre_counts(&visible, &ctx.genres, is_genre_hidden);
                let narrowed = filter_by_genre(&visible, &ctx.genres, is_genre_hidden);
                if visible.is_empty() {
                    rendered.notice = Some(NO_EVENTS_NOTICE.to_string());
                } else if narrowed.is_empty() {
                    rendered.notice = Some(NO_GENRE_MATCH_NOTICE.to_string());
                }
                let (unsaved, saved) = split_saved(&narrowed, |id| library.is_saved(id));
                rendered.events = unsaved.into_iter().map(to_visible).collect();
                rendered.saved_section = saved.into_iter().map(to_visible).collect();
            }
        }

        rendered
    }

    pub fn total_shown(&self) -> usize {
        self.events.len() + self.saved_section.len()
    }
}
