//! Local key-value persistence.
//!
//! Everything the engine remembers between runs lives under a handful of
//! string keys holding JSON values. `FileStore` keeps one file per key;
//! `MemoryStore` backs tests and ephemeral sessions.

pub mod file;
pub mod memory;
pub mod prefs;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use prefs::PreferenceStore;

/// Cached events snapshot.
pub const SHOWS_CACHE_KEY: &str = "shows.cachedEvents";
/// Lower-cased hidden genre labels.
pub const SHOWS_HIDDEN_GENRES_KEY: &str = "shows.hiddenGenres";
/// Saved events as `[{ id, event, savedAt }]`.
pub const SHOWS_SAVED_EVENTS_KEY: &str = "shows.savedEvents";
/// Hidden event identities.
pub const SHOWS_HIDDEN_EVENTS_KEY: &str = "shows.hiddenEventIds";
/// Search preferences `{ radius, days }`.
pub const SHOWS_SEARCH_PREFS_KEY: &str = "shows.searchPrefs";

/// String-keyed storage of JSON documents.
///
/// Writes replace the whole value; a reader never observes a partial write.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and parse a key. Missing keys are `Ok(None)`; unparsable JSON is an
/// error for the caller to degrade on.
pub fn load_json(store: &dyn KeyValueStore, key: &str) -> Result<Option<Value>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse stored value: {}", key))?;
    Ok(Some(value))
}

pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let contents = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize value for: {}", key))?;
    store.set(key, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_json_missing_and_blank() {
        let store = MemoryStore::new();
        assert!(load_json(&store, "k").unwrap().is_none());
        store.set("k", "   ").unwrap();
        assert!(load_json(&store, "k").unwrap().is_none());
    }

    #[test]
    fn test_load_json_corrupt_is_error() {
        let store = MemoryStore::new();
        store.set("k", "{not json").unwrap();
        assert!(load_json(&store, "k").is_err());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        save_json(&store, "k", &json!({ "a": [1, 2] })).unwrap();
        assert_eq!(load_json(&store, "k").unwrap(), Some(json!({ "a": [1, 2] })));
    }
}
