use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::{Event, SearchPrefs};

/// Events with a known start before `now` are over. Unknown starts stay.
pub fn is_upcoming(event: &Event, now: DateTime<Utc>) -> bool {
    match event.start_time() {
        Some(start) => start >= now,
        None => true,
    }
}

/// Last instant of the look-ahead window: local midnight today plus
/// `days + 1` days, minus one millisecond. `days = 0` therefore covers the
/// rest of today.
pub fn window_end<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> DateTime<Utc> {
    let tz = now.timezone();
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc));
    midnight + Duration::days(days as i64 + 1) - Duration::milliseconds(1)
}

/// Inside the window and the radius. Unknown start or distance never
/// excludes an event.
pub fn matches_preferences(event: &Event, prefs: &SearchPrefs, window_end: DateTime<Utc>) -> bool {
    if let Some(start) = event.start_time() {
        if start > window_end {
            return false;
        }
    }
    match event.distance {
        Some(distance) => !(distance > prefs.radius as f64),
        None => true,
    }
}

/// Run the time, preference and hidden-event stages, in that order, keeping
/// input order.
pub fn apply_filters<'e, Tz, F>(
    events: Vec<&'e Event>,
    now: &DateTime<Tz>,
    prefs: &SearchPrefs,
    is_hidden: F,
) -> Vec<&'e Event>
where
    Tz: TimeZone,
    F: Fn(&str) -> bool,
{
    let now_utc = now.with_timezone(&Utc);
    let end = window_end(now, prefs.days);
    events
        .into_iter()
        .filter(|event| is_upcoming(event, now_utc))
        .filter(|event| matches_preferences(event, prefs, end))
        .filter(|event| !is_hidden(&event.identity()))
        .collect()
}
