use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{Event, Location, SearchPrefs, DEFAULT_LOOKAHEAD_DAYS, DEFAULT_RADIUS_MILES};
use crate::storage::{load_json, save_json, KeyValueStore, SHOWS_CACHE_KEY};
use crate::utils::format_timestamp;

/// Cached results are trusted for 8 hours.
/// Listings change slowly; a working day of browsing should not refetch.
pub const CACHE_TTL: Duration = Duration::from_secs(8 * 60 * 60);

/// The last successful fetch, together with the window it was fetched for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub events: Vec<Event>,
    pub fetched_at: Option<i64>,
    pub location: Option<Location>,
    pub radius_miles: Option<f64>,
    pub days: Option<f64>,
}

impl CacheSnapshot {
    pub fn new(events: Vec<Event>, fetched_at: DateTime<Utc>, location: Option<Location>, prefs: SearchPrefs) -> Self {
        Self {
            events,
            fetched_at: Some(fetched_at.timestamp_millis()),
            location,
            radius_miles: Some(prefs.radius as f64),
            days: Some(prefs.days as f64),
        }
    }

    /// Decode a stored snapshot. Anything without an `events` array is no
    /// snapshot at all; other malformed fields read as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        let events = value.get("events")?.as_array()?.clone();
        let finite = |field: &str| value.get(field).and_then(Value::as_f64).filter(|v| v.is_finite());
        Some(Self {
            events: Event::list_from_values(events),
            fetched_at: finite("fetchedAt")
                .map(|v| v as i64)
                .filter(|ms| DateTime::from_timestamp_millis(*ms).is_some()),
            location: value.get("location").and_then(Location::from_value),
            radius_miles: finite("radiusMiles"),
            days: finite("days"),
        })
    }

    /// Milliseconds since the fetch; `None` when unknown or out of range.
    fn age_millis(&self, now: DateTime<Utc>) -> Option<i64> {
        now.timestamp_millis().checked_sub(self.fetched_at?)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.age_millis(now).is_some_and(|age| age < ttl_ms)
    }

    /// Whether the cached window contains the requested one. Missing cached
    /// values count as the defaults.
    pub fn covers(&self, desired: &SearchPrefs) -> bool {
        let desired = desired.clamped();
        let radius = self.radius_miles.unwrap_or(DEFAULT_RADIUS_MILES as f64);
        let days = self.days.unwrap_or(DEFAULT_LOOKAHEAD_DAYS as f64);
        radius >= desired.radius as f64 && days >= desired.days as f64
    }

    /// Usable without a network round-trip.
    pub fn satisfies(&self, desired: &SearchPrefs, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_fresh(now, ttl) && self.covers(desired)
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.age_millis(now).map(|age| age / 60_000)
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        format_age(self.age_minutes(now))
    }
}

/// "just now", "5m ago", "3h ago", "2d ago"; "never" when unknown.
pub fn format_age(minutes: Option<i64>) -> String {
    let Some(minutes) = minutes else {
        return "never".to_string();
    };
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// "Showing 3 cached events. Last updated Mar 02, 2030 07:15 PM."
pub fn describe_cached(count: usize, fetched_at: Option<i64>) -> String {
    let plural = if count == 1 { "" } else { "s" };
    let base = format!("Showing {} cached event{}.", count, plural);
    match fetched_at.and_then(format_timestamp) {
        Some(formatted) => format!("{} Last updated {}.", base, formatted),
        None => base,
    }
}

/// Reads and replaces the cached snapshot.
#[derive(Clone)]
pub struct EventCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl EventCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// The stored snapshot, or `None` when absent or unreadable.
    pub fn load(&self) -> Option<CacheSnapshot> {
        match load_json(self.store.as_ref(), SHOWS_CACHE_KEY) {
            Ok(Some(value)) => {
                let snapshot = CacheSnapshot::from_value(&value);
                if snapshot.is_none() {
                    debug!("Cached events snapshot has no events array, ignoring");
                }
                snapshot
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Unable to read cached live events");
                None
            }
        }
    }

    /// Replace the snapshot wholesale.
    pub fn save(&self, snapshot: &CacheSnapshot) {
        let mut stored = snapshot.clone();
        stored.radius_miles.get_or_insert(DEFAULT_RADIUS_MILES as f64);
        stored.days.get_or_insert(DEFAULT_LOOKAHEAD_DAYS as f64);
        if let Err(e) = save_json(self.store.as_ref(), SHOWS_CACHE_KEY, &stored) {
            warn!(error = %e, "Unable to cache live events");
        }
    }

    pub fn is_usable(&self, snapshot: &CacheSnapshot, desired: &SearchPrefs, now: DateTime<Utc>) -> bool {
        snapshot.satisfies(desired, now, self.ttl)
    }
}
