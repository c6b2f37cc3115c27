use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_RADIUS_MILES: u32 = 100;
pub const MIN_RADIUS_MILES: u32 = 5;
pub const MAX_RADIUS_MILES: u32 = 150;

pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 30;
pub const MIN_LOOKAHEAD_DAYS: u32 = 0;
pub const MAX_LOOKAHEAD_DAYS: u32 = 60;

pub fn clamp_radius(value: i64) -> u32 {
    value.clamp(MIN_RADIUS_MILES as i64, MAX_RADIUS_MILES as i64) as u32
}

pub fn clamp_days(value: i64) -> u32 {
    value.clamp(MIN_LOOKAHEAD_DAYS as i64, MAX_LOOKAHEAD_DAYS as i64) as u32
}

/// Read an integer out of loosely typed JSON the way a form field would be:
/// numbers are truncated, strings contribute their leading integer.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Saturate absurdly long digit runs instead of failing.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * magnitude)
}

/// Search radius and look-ahead window. Always clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPrefs {
    pub radius: u32,
    pub days: u32,
}

impl Default for SearchPrefs {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS_MILES,
            days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

impl SearchPrefs {
    pub fn new(radius: i64, days: i64) -> Self {
        Self {
            radius: clamp_radius(radius),
            days: clamp_days(days),
        }
    }

    pub fn clamped(self) -> Self {
        Self::new(self.radius as i64, self.days as i64)
    }

    /// Build from a stored `{radius, days}` object. Each field independently
    /// falls back to its default when missing or unreadable.
    pub fn from_value(value: &Value) -> Self {
        let radius = value
            .get("radius")
            .and_then(coerce_int)
            .map(clamp_radius)
            .unwrap_or(DEFAULT_RADIUS_MILES);
        let days = value
            .get("days")
            .and_then(coerce_int)
            .map(clamp_days)
            .unwrap_or(DEFAULT_LOOKAHEAD_DAYS);
        Self { radius, days }
    }
}

/// Look-ahead days for a chosen "through" date, rounded up to whole days.
pub fn days_from_date(date: NaiveDate, today: NaiveDate) -> u32 {
    clamp_days((date - today).num_days())
}

/// Last calendar day included by a look-ahead of `days`.
pub fn end_date(days: i64, today: NaiveDate) -> NaiveDate {
    today + Duration::days(clamp_days(days) as i64)
}

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Read a stored `{latitude, longitude}` object; anything else is absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        let latitude = value.get("latitude")?.as_f64()?;
        let longitude = value.get("longitude")?.as_f64()?;
        Some(Self { latitude, longitude })
    }
}
