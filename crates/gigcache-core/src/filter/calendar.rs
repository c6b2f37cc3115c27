use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone};

use crate::models::Event;

/// Months always shown in the saved calendar, starting with the current one.
const LEADING_MONTHS: u32 = 3;

/// A calendar date picked in the saved view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay {
    pub year: i32,
    /// 1-12
    pub month: u32,
    pub day: u32,
}

impl CalendarDay {
    /// `None` when the triple is not a real date.
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from_date)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month && date.day() == self.day
    }
}

/// Calendar date an event starts on, in `tz`.
pub fn local_start_date<Tz: TimeZone>(event: &Event, tz: &Tz) -> Option<NaiveDate> {
    event
        .start_time()
        .map(|start| start.with_timezone(tz).date_naive())
}

/// Move the events on `day` to the front. Nothing is dropped; relative order
/// is kept on both sides, and events without a start go with the rest.
pub fn partition_by_day<'e, Tz: TimeZone>(events: Vec<&'e Event>, day: CalendarDay, tz: &Tz) -> Vec<&'e Event> {
    let (on_day, others): (Vec<&Event>, Vec<&Event>) = events
        .into_iter()
        .partition(|event| local_start_date(event, tz).is_some_and(|date| day.matches(date)));
    on_day.into_iter().chain(others).collect()
}

/// One month grid of the saved calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarMonth {
    pub year: i32,
    /// 1-12
    pub month: u32,
    pub days_in_month: u32,
    /// Blank cells before the 1st in a Sunday-first week.
    pub leading_blanks: u32,
    /// Day of month to number of saved events starting that day.
    pub day_counts: BTreeMap<u32, usize>,
}

impl CalendarMonth {
    fn new(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = first.checked_add_months(Months::new(1))?;
        Some(Self {
            year,
            month,
            days_in_month: (next - first).num_days() as u32,
            leading_blanks: first.weekday().num_days_from_sunday(),
            day_counts: BTreeMap::new(),
        })
    }

    pub fn count_on(&self, day: u32) -> usize {
        self.day_counts.get(&day).copied().unwrap_or(0)
    }
}

/// Month grids for the saved view: this month and the next two, plus any
/// later month holding a saved event. Only events from today on are
/// counted. Empty when there are no events at all.
pub fn saved_calendar<Tz: TimeZone>(events: &[&Event], now: &DateTime<Tz>) -> Vec<CalendarMonth> {
    if events.is_empty() {
        return Vec::new();
    }
    let tz = now.timezone();
    let today = now.date_naive();
    let mut months: BTreeMap<(i32, u32), CalendarMonth> = BTreeMap::new();

    let Some(first_of_month) = today.with_day(1) else {
        return Vec::new();
    };
    for offset in 0..LEADING_MONTHS {
        if let Some(date) = first_of_month.checked_add_months(Months::new(offset)) {
            if let Some(month) = CalendarMonth::new(date.year(), date.month()) {
                months.insert((date.year(), date.month()), month);
            }
        }
    }

    for event in events {
        let Some(date) = local_start_date(event, &tz) else {
            continue;
        };
        if date < today {
            continue;
        }
        let key = (date.year(), date.month());
        if !months.contains_key(&key) {
            match CalendarMonth::new(date.year(), date.month()) {
                Some(month) => {
                    months.insert(key, month);
                }
                None => continue,
            }
        }
        if let Some(month) = months.get_mut(&key) {
            *month.day_counts.entry(date.day()).or_insert(0) += 1;
        }
    }

    months.into_values().collect()
}
