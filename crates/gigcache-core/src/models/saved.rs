use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Event;

/// An event the user saved, with the time it was saved (epoch ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub event: Event,
    pub saved_at: i64,
}

/// Persisted shape of one saved entry: `{ id, event, savedAt }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSavedEntry {
    pub id: String,
    pub event: Event,
    #[serde(rename = "savedAt")]
    pub saved_at: i64,
}

impl SavedEntry {
    /// Rebuild the saved map from a stored array.
    ///
    /// Entries without an id or event object are skipped, an event without its
    /// own id takes the stored one, and a missing `savedAt` becomes `now_ms`.
    /// Returns `None` when `value` is not an array at all.
    pub fn map_from_value(value: &Value, now_ms: i64) -> Option<HashMap<String, SavedEntry>> {
        let items = value.as_array()?;
        let mut map = HashMap::new();
        for item in items {
            let Some(obj) = item.as_object() else {
                continue;
            };
            let Some(id) = obj.get("id").and_then(stored_id) else {
                continue;
            };
            let Some(mut event) = obj.get("event").cloned().and_then(Event::from_value) else {
                continue;
            };
            if event.id.is_none() {
                event.id = Some(id.clone());
            }
            let saved_at = obj
                .get("savedAt")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .map(|v| v as i64)
                .unwrap_or(now_ms);
            map.insert(id, SavedEntry { event, saved_at });
        }
        Some(map)
    }

    pub fn to_stored(map: &HashMap<String, SavedEntry>) -> Vec<StoredSavedEntry> {
        let mut stored: Vec<StoredSavedEntry> = map
            .iter()
            .map(|(id, entry)| StoredSavedEntry {
                id: id.clone(),
                event: entry.event.clone(),
                saved_at: entry.saved_at,
            })
            .collect();
        stored.sort_by(|a, b| a.saved_at.cmp(&b.saved_at).then_with(|| a.id.cmp(&b.id)));
        stored
    }
}

/// Ids may have been written as strings or numbers; blank and zero ids are
/// treated as missing.
fn stored_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
