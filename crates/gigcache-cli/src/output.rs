//! Plain-text rendering of a `RenderedView`.

use chrono::{DateTime, Local, NaiveDate};
use gigcache_core::cache::format_age;
use gigcache_core::discovery::VisibleEvent;
use gigcache_core::filter::CalendarMonth;
use gigcache_core::models::end_date;
use gigcache_core::utils::{
    format_distance, format_end_date, format_event_date, format_genre_label, truncate_string,
};
use gigcache_core::{RenderedView, StatusTone, View};

const TITLE_WIDTH: usize = 48;
const VENUE_WIDTH: usize = 40;

pub fn render_lines(view: &RenderedView, now: DateTime<Local>) -> Vec<String> {
    let mut lines = Vec::new();
    let today = now.date_naive();

    if let Some(status) = &view.status {
        let marker = match status.tone {
            StatusTone::Info => "",
            StatusTone::Success => "ok: ",
            StatusTone::Error => "error: ",
        };
        lines.push(format!("{}{}", marker, status));
    }

    lines.push(format!(
        "Within {} miles through {}{}",
        view.prefs.radius,
        format_end_date(end_date(view.prefs.days as i64, today)),
        match (view.source, view.fetched_at) {
            (Some(source), Some(fetched_at)) => {
                let minutes = now.timestamp_millis().checked_sub(fetched_at).map(|ms| ms / 60_000);
                format!(" ({}, updated {})", source, format_age(minutes))
            }
            _ => String::new(),
        }
    ));

    match view.view {
        View::All => {
            let facets: Vec<String> = view
                .genres
                .iter()
                .map(|g| {
                    let mark = if g.selected { "x" } else { " " };
                    format!("[{}] {} ({})", mark, g.genre, g.count)
                })
                .collect();
            if !facets.is_empty() {
                lines.push(String::new());
                lines.push(format!("Tags: {}", facets.join("  ")));
            }
            if !view.hidden_genres.is_empty() {
                let hidden: Vec<String> = view.hidden_genres.iter().map(|g| format_genre_label(g)).collect();
                lines.push(format!("Hidden: {}", hidden.join(", ")));
            }
            lines.push(String::new());
            lines.extend(view.events.iter().map(event_line));
            if !view.saved_section.is_empty() {
                lines.push(String::new());
                lines.push("Saved events".to_string());
                lines.extend(view.saved_section.iter().map(event_line));
            }
        }
        View::Saved => {
            for month in &view.calendar {
                lines.push(String::new());
                lines.extend(calendar_lines(month, view));
            }
            lines.push(String::new());
            lines.extend(view.events.iter().map(event_line));
        }
    }

    if let Some(notice) = &view.notice {
        lines.push(String::new());
        lines.push(notice.clone());
    }
    lines
}

fn event_line(visible: &VisibleEvent) -> String {
    let event = &visible.event;
    let star = if visible.saved { "*" } else { " " };
    let title = truncate_string(event.title().unwrap_or("Untitled event"), TITLE_WIDTH);
    let venue = event.venue.as_ref().and_then(|v| v.name.as_deref()).unwrap_or("");
    let place = match event.city_label() {
        Some(city) if !venue.is_empty() => format!("{}, {}", venue, city),
        Some(city) => city,
        None => venue.to_string(),
    };
    let mut line = format!(
        "{} {:<width$}  {}",
        star,
        title,
        format_event_date(event),
        width = TITLE_WIDTH
    );
    if !place.is_empty() {
        line.push_str(&format!("  {}", truncate_string(&place, VENUE_WIDTH)));
    }
    if let Some(distance) = event.distance.map(format_distance).filter(|d| !d.is_empty()) {
        line.push_str(&format!("  {}", distance));
    }
    if !visible.genres.is_empty() {
        line.push_str(&format!("  [{}]", visible.genres.join(", ")));
    }
    line.push_str(&format!("  {}", visible.identity));
    line
}

/// A Sunday-first month grid. Days with saved events show their count,
/// the selected day is bracketed.
fn calendar_lines(month: &CalendarMonth, view: &RenderedView) -> Vec<String> {
    let title = NaiveDate::from_ymd_opt(month.year, month.month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_default();
    let mut lines = vec![title, " Su  Mo  Tu  We  Th  Fr  Sa".to_string()];
    let mut row = "    ".repeat(month.leading_blanks as usize);
    let mut column = month.leading_blanks;
    for day in 1..=month.days_in_month {
        let selected = view
            .calendar_day
            .and_then(|d| NaiveDate::from_ymd_opt(month.year, month.month, day).map(|date| d.matches(date)))
            .unwrap_or(false);
        let cell = match (selected, month.count_on(day)) {
            (true, _) => format!("[{:>2}]", day),
            (false, 0) => format!(" {:>2} ", day),
            (false, n) => format!("{:>2}:{}", day, n.min(9)),
        };
        row.push_str(&cell);
        column += 1;
        if column == 7 {
            lines.push(row.trim_end().to_string());
            row = String::new();
            column = 0;
        }
    }
    if !row.is_empty() {
        lines.push(row.trim_end().to_string());
    }
    lines
}

pub fn print_view(view: &RenderedView) {
    for line in render_lines(view, Local::now()) {
        println!("{}", line);
    }
}
