use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Genre labels that carry no information and never become facets.
pub const IGNORED_GENRE_NAMES: [&str; 3] = ["undefined", "music", "event style"];

/// Name used in the composite identity when an event has no title at all.
const FALLBACK_IDENTITY_NAME: &str = "event";

/// A live event as returned by the shows endpoint.
///
/// Every provider field is optional. Fields with an unexpected JSON shape are
/// read as absent instead of failing the whole record, and anything this type
/// does not model is kept in `extra` so saved copies round-trip the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<EventName>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub start: Option<EventStart>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub venue: Option<Venue>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, deserialize_with = "genre_list", skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventName {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventStart {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub utc: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Read a field as `T`, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Genres must be an array; non-string entries are dropped.
fn genre_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

impl Event {
    /// Decode one entry of an events array. Entries that are not JSON objects
    /// are not events.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value::<Event>(value)
            .ok()
            .map(Event::normalized)
    }

    /// Decode an events array, skipping entries that are not events.
    pub fn list_from_values(values: Vec<Value>) -> Vec<Self> {
        values.into_iter().filter_map(Event::from_value).collect()
    }

    /// Clean up provider quirks once at ingestion. Never changes `identity()`.
    pub fn normalized(mut self) -> Self {
        self.id = self
            .id
            .take()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        self.url = self.url.take().filter(|url| !url.is_empty());
        if let Some(name) = self.name.as_mut() {
            name.text = name.text.take().map(|t| t.trim().to_string());
        }
        self
    }

    /// Stable key used to reference this event across fetches.
    pub fn identity(&self) -> String {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        if let Some(url) = self.url.as_deref().filter(|url| !url.is_empty()) {
            return format!("url::{}", url);
        }
        let name = self
            .name
            .as_ref()
            .and_then(|n| n.text.as_deref())
            .map(str::trim)
            .unwrap_or(FALLBACK_IDENTITY_NAME);
        let start = self
            .start
            .as_ref()
            .and_then(|s| {
                s.local
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .or_else(|| s.utc.as_deref().filter(|v| !v.is_empty()))
            })
            .unwrap_or("");
        format!("{}::{}", name, start)
    }

    pub fn title(&self) -> Option<&str> {
        self.name
            .as_ref()
            .and_then(|n| n.text.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Start instant, preferring the UTC field over the local one.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let start = self.start.as_ref()?;
        let raw = start
            .utc
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| start.local.as_deref().filter(|v| !v.is_empty()))?;
        parse_timestamp(raw)
    }

    pub fn start_millis(&self) -> Option<i64> {
        self.start_time().map(|dt| dt.timestamp_millis())
    }

    /// "City, Region" of the venue, or just the city.
    pub fn city_label(&self) -> Option<String> {
        let address = self.venue.as_ref()?.address.as_ref()?;
        let city = address.city.as_deref().filter(|c| !c.is_empty())?;
        match address.region.as_deref().filter(|r| !r.is_empty()) {
            Some(region) => Some(format!("{}, {}", city, region)),
            None => Some(city.to_string()),
        }
    }

    /// Genres as shown to the user: trimmed, without placeholders or hidden
    /// genres, deduplicated case-insensitively keeping the first spelling.
    pub fn effective_genres<F>(&self, is_hidden: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut seen: Vec<String> = Vec::new();
        let mut genres = Vec::new();
        for raw in self.genres.iter().flatten() {
            let genre = raw.trim();
            if genre.is_empty() {
                continue;
            }
            let key = genre.to_lowercase();
            if IGNORED_GENRE_NAMES.contains(&key.as_str()) || is_hidden(&key) {
                continue;
            }
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            genres.push(genre.to_string());
        }
        genres
    }

    /// Copy with no aliasing to the source payload, carrying `identity` as
    /// its id when the source had none.
    pub fn detached_copy(&self, identity: &str) -> Self {
        let mut copy = serde_json::to_value(self)
            .ok()
            .and_then(|v| serde_json::from_value::<Event>(v).ok())
            .unwrap_or_else(|| self.clone());
        if copy.id.as_deref().map(str::trim).unwrap_or("").is_empty() {
            copy.id = Some(identity.to_string());
        }
        copy
    }
}

/// Parse a provider timestamp.
///
/// RFC 3339 values keep their offset, offset-less date-times are local time
/// and bare dates are UTC midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn event(id: &str, start: Option<DateTime<Utc>>) -> Event {
        Event {
            id: Some(id.to_string()),
            name: Some(EventName {
                text: Some(format!("Show {}", id)),
                ..Default::default()
            }),
            start: start.map(|s| EventStart {
                utc: Some(s.to_rfc3339()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn with_genres(mut event: Event, genres: &[&str]) -> Event {
        event.genres = Some(genres.iter().map(|g| g.to_string()).collect());
        event
    }

    pub fn with_distance(mut event: Event, distance: f64) -> Event {
        event.distance = Some(distance);
        event
    }
}
