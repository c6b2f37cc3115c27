use chrono::{DateTime, Local, NaiveDate};

use crate::models::{parse_timestamp, Event};

/// Format an epoch-ms timestamp in local time: "Mar 02, 2030 07:15 PM"
pub fn format_timestamp(millis: i64) -> Option<String> {
    let dt = DateTime::from_timestamp_millis(millis)?;
    Some(dt.with_timezone(&Local).format("%b %d, %Y %I:%M %p").to_string())
}

/// Event start for list views: "Mar 02, 2030 07:15 PM (Sat)".
/// Falls back to the raw provider string when it cannot be parsed.
pub fn format_event_date(event: &Event) -> String {
    let Some(start) = event.start.as_ref() else {
        return String::new();
    };
    let Some(raw) = start
        .local
        .as_deref()
        .filter(|v| !v.is_empty())
        .or_else(|| start.utc.as_deref().filter(|v| !v.is_empty()))
    else {
        return String::new();
    };
    match parse_timestamp(raw) {
        Some(dt) => {
            let local = dt.with_timezone(&Local);
            format!("{} ({})", local.format("%b %d, %Y %I:%M %p"), local.format("%a"))
        }
        None => raw.to_string(),
    }
}

/// Distance rounded to one decimal: "12.3 mi"
pub fn format_distance(distance: f64) -> String {
    if !distance.is_finite() {
        return String::new();
    }
    let rounded = (distance * 10.0).round() / 10.0;
    format!("{} mi", rounded)
}

/// Title-case a stored (lower-cased) genre key for display.
pub fn format_genre_label(genre: &str) -> String {
    genre
        .split_whitespace()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Last included day of a search window: "Mar 12, 2030"
pub fn format_end_date(end: NaiveDate) -> String {
    end.format("%b %d, %Y").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
