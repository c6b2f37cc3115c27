use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::mirror::MirrorQueue;
use super::remote::RemoteDocument;
use crate::models::{Event, SavedEntry};
use crate::storage::{
    load_json, save_json, KeyValueStore, SHOWS_HIDDEN_EVENTS_KEY, SHOWS_HIDDEN_GENRES_KEY,
    SHOWS_SAVED_EVENTS_KEY,
};

/// The user's saved events, hidden events and hidden genres.
///
/// Every mutation writes the affected keys straight away. Changes to saved or
/// hidden events also queue the full state for the remote mirror.
pub struct EventLibrary {
    store: Arc<dyn KeyValueStore>,
    mirror: MirrorQueue,
    saved: HashMap<String, SavedEntry>,
    hidden_events: HashSet<String>,
    hidden_genres: BTreeSet<String>,
}

impl EventLibrary {
    pub fn new(store: Arc<dyn KeyValueStore>, mirror: MirrorQueue) -> Self {
        Self {
            store,
            mirror,
            saved: HashMap::new(),
            hidden_events: HashSet::new(),
            hidden_genres: BTreeSet::new(),
        }
    }

    /// Replace in-memory state with whatever is stored locally. Unreadable
    /// keys leave that part of the library empty.
    pub fn load(&mut self, now_ms: i64) {
        self.saved = self
            .read_key(SHOWS_SAVED_EVENTS_KEY)
            .and_then(|value| SavedEntry::map_from_value(&value, now_ms))
            .unwrap_or_default();
        self.hidden_events = self
            .read_key(SHOWS_HIDDEN_EVENTS_KEY)
            .and_then(|value| id_set(&value))
            .unwrap_or_default();
        self.hidden_genres = self
            .read_key(SHOWS_HIDDEN_GENRES_KEY)
            .and_then(|value| genre_set(&value))
            .unwrap_or_default();
        debug!(
            saved = self.saved.len(),
            hidden_events = self.hidden_events.len(),
            hidden_genres = self.hidden_genres.len(),
            "Library loaded"
        );
    }

    /// Adopt the remote document read at startup. Each well-formed field
    /// replaces the local copy and is persisted; the rest is ignored.
    pub fn apply_remote(&mut self, document: &Value, now_ms: i64) {
        if let Some(saved) = document
            .get("savedEvents")
            .and_then(|value| SavedEntry::map_from_value(value, now_ms))
        {
            self.saved = saved;
            self.persist_saved();
        }
        if let Some(hidden) = document.get("hiddenEventIds").and_then(id_set) {
            self.hidden_events = hidden;
            self.persist_hidden_events();
        }
    }

    pub fn is_saved(&self, identity: &str) -> bool {
        self.saved.contains_key(identity)
    }

    pub fn is_event_hidden(&self, identity: &str) -> bool {
        self.hidden_events.contains(identity)
    }

    /// `genre` must already be lower-cased.
    pub fn is_genre_hidden(&self, genre: &str) -> bool {
        self.hidden_genres.contains(genre)
    }

    pub fn hidden_genres(&self) -> &BTreeSet<String> {
        &self.hidden_genres
    }

    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    pub fn saved_entry(&self, identity: &str) -> Option<&SavedEntry> {
        self.saved.get(identity)
    }

    /// Save `event`, or unsave it when it is already saved. Returns whether
    /// the event is saved afterwards.
    pub fn toggle_saved(&mut self, event: &Event, now_ms: i64) -> bool {
        let identity = event.identity();
        let now_saved = if self.saved.remove(&identity).is_some() {
            false
        } else {
            let entry = SavedEntry {
                event: event.detached_copy(&identity),
                saved_at: now_ms,
            };
            self.saved.insert(identity, entry);
            true
        };
        self.persist_saved();
        self.mirror(now_ms);
        now_saved
    }

    pub fn unsave(&mut self, identity: &str, now_ms: i64) -> bool {
        if self.saved.remove(identity).is_none() {
            return false;
        }
        self.persist_saved();
        self.mirror(now_ms);
        true
    }

    /// Hide an event for good. A saved copy is dropped in the same step, so
    /// the mirror never sees the event both hidden and saved.
    pub fn hide_event(&mut self, identity: &str, now_ms: i64) -> bool {
        if identity.is_empty() {
            return false;
        }
        let newly_hidden = self.hidden_events.insert(identity.to_string());
        let unsaved = self.saved.remove(identity).is_some();
        if !newly_hidden && !unsaved {
            return false;
        }
        self.persist_hidden_events();
        if unsaved {
            self.persist_saved();
        }
        self.mirror(now_ms);
        true
    }

    /// Returns the normalized label when the genre was not hidden before.
    pub fn hide_genre(&mut self, genre: &str) -> Option<String> {
        let key = genre.trim().to_lowercase();
        if key.is_empty() || !self.hidden_genres.insert(key.clone()) {
            return None;
        }
        self.persist_hidden_genres();
        Some(key)
    }

    pub fn restore_genre(&mut self, genre: &str) -> bool {
        let key = genre.trim().to_lowercase();
        if !self.hidden_genres.remove(&key) {
            return false;
        }
        self.persist_hidden_genres();
        true
    }

    /// Swap saved copies for the fresh payloads in `events`, keeping when
    /// each was saved. Returns how many saved entries changed.
    pub fn refresh_from(&mut self, events: &[Event], now_ms: i64) -> usize {
        let mut updated = 0;
        for event in events {
            let identity = event.identity();
            let Some(entry) = self.saved.get_mut(&identity) else {
                continue;
            };
            let fresh = event.detached_copy(&identity);
            if entry.event != fresh {
                entry.event = fresh;
                updated += 1;
            }
        }
        if updated > 0 {
            debug!(updated, "Refreshed saved events from latest fetch");
            self.persist_saved();
            self.mirror(now_ms);
        }
        updated
    }

    /// Saved events ordered by start time, falling back to when they were
    /// saved.
    pub fn saved_events(&self) -> Vec<&Event> {
        let mut entries: Vec<(&String, &SavedEntry)> = self.saved.iter().collect();
        entries.sort_by(|(a_id, a), (b_id, b)| {
            sort_key(a)
                .partial_cmp(&sort_key(b))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_id.cmp(b_id))
        });
        entries.into_iter().map(|(_, entry)| &entry.event).collect()
    }

    /// Full mirror document for the current state.
    pub fn document(&self, now_ms: i64) -> RemoteDocument {
        let mut hidden: Vec<String> = self.hidden_events.iter().cloned().collect();
        hidden.sort();
        RemoteDocument {
            saved_events: SavedEntry::to_stored(&self.saved),
            hidden_event_ids: hidden,
            updated_at: now_ms,
        }
    }

    fn mirror(&self, now_ms: i64) {
        if self.mirror.is_enabled() {
            self.mirror.enqueue(self.document(now_ms));
        }
    }

    fn read_key(&self, key: &str) -> Option<Value> {
        match load_json(self.store.as_ref(), key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, "Unable to load stored library data");
                None
            }
        }
    }

    fn persist_saved(&self) {
        let stored = SavedEntry::to_stored(&self.saved);
        if let Err(e) = save_json(self.store.as_ref(), SHOWS_SAVED_EVENTS_KEY, &stored) {
            warn!(error = %e, "Unable to persist saved events");
        }
    }

    fn persist_hidden_events(&self) {
        let mut ids: Vec<&String> = self.hidden_events.iter().collect();
        ids.sort();
        if let Err(e) = save_json(self.store.as_ref(), SHOWS_HIDDEN_EVENTS_KEY, &ids) {
            warn!(error = %e, "Unable to persist hidden events");
        }
    }

    fn persist_hidden_genres(&self) {
        if let Err(e) = save_json(self.store.as_ref(), SHOWS_HIDDEN_GENRES_KEY, &self.hidden_genres) {
            warn!(error = %e, "Unable to persist hidden genres");
        }
    }
}

fn sort_key(entry: &SavedEntry) -> f64 {
    entry
        .event
        .start_millis()
        .map(|ms| ms as f64)
        .unwrap_or(entry.saved_at as f64)
}

/// Hidden ids are stored as an array of strings; numeric ids from older
/// writers are accepted too.
fn id_set(value: &Value) -> Option<HashSet<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
    )
}

fn genre_set(value: &Value) -> Option<BTreeSet<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(|genre| genre.trim().to_lowercase())
            .filter(|genre| !genre.is_empty())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::remote::RemoteDocumentStore;
    use crate::models::event::fixtures::event;
    use crate::storage::MemoryStore;
    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::Mutex;

    fn library() -> (Arc<MemoryStore>, EventLibrary) {
        let store = Arc::new(MemoryStore::new());
        let library = EventLibrary::new(store.clone(), MirrorQueue::disabled());
        (store, library)
    }

    fn stored(store: &MemoryStore, key: &str) -> Value {
        load_json(store, key).unwrap().unwrap()
    }

    #[test]
    fn test_toggle_saved_twice_unsaves() {
        let (store, mut library) = library();
        let show = event("a", None);

        assert!(library.toggle_saved(&show, 10));
        assert!(library.is_saved("a"));
        assert_eq!(stored(&store, SHOWS_SAVED_EVENTS_KEY)[0]["savedAt"], json!(10));

        assert!(!library.toggle_saved(&show, 20));
        assert!(!library.is_saved("a"));
        assert_eq!(stored(&store, SHOWS_SAVED_EVENTS_KEY), json!([]));
    }

    #[test]
    fn test_saved_copy_carries_identity() {
        let (_, mut library) = library();
        let mut show = event("x", None);
        show.id = None;
        show.url = Some("https://tickets.test/x".into());

        library.toggle_saved(&show, 1);
        let entry = library.saved_entry("url::https://tickets.test/x").unwrap();
        assert_eq!(entry.event.id.as_deref(), Some("url::https://tickets.test/x"));
    }

    #[test]
    fn test_hide_event_unsaves() {
        let (store, mut library) = library();
        library.toggle_saved(&event("a", None), 1);

        assert!(library.hide_event("a", 2));
        assert!(library.is_event_hidden("a"));
        assert!(!library.is_saved("a"));
        assert_eq!(stored(&store, SHOWS_HIDDEN_EVENTS_KEY), json!(["a"]));
        assert_eq!(stored(&store, SHOWS_SAVED_EVENTS_KEY), json!([]));

        assert!(!library.hide_event("a", 3));
        assert!(!library.hide_event("", 3));
    }

    #[test]
    fn test_hide_and_restore_genre() {
        let (store, mut library) = library();
        assert_eq!(library.hide_genre("  Indie Rock "), Some("indie rock".to_string()));
        assert_eq!(library.hide_genre("indie rock"), None);
        assert_eq!(library.hide_genre("   "), None);
        assert!(library.is_genre_hidden("indie rock"));
        assert_eq!(stored(&store, SHOWS_HIDDEN_GENRES_KEY), json!(["indie rock"]));

        assert!(library.restore_genre("Indie Rock"));
        assert!(!library.restore_genre("Indie Rock"));
        assert_eq!(stored(&store, SHOWS_HIDDEN_GENRES_KEY), json!([]));
    }

    #[test]
    fn test_refresh_keeps_saved_at() {
        let (store, mut library) = library();
        library.toggle_saved(&event("a", None), 100);

        let mut fresh = event("a", None);
        fresh.url = Some("https://tickets.test/a".into());
        assert_eq!(library.refresh_from(&[fresh.clone(), event("b", None)], 500), 1);

        let entry = library.saved_entry("a").unwrap();
        assert_eq!(entry.saved_at, 100);
        assert_eq!(entry.event.url.as_deref(), Some("https://tickets.test/a"));
        assert_eq!(stored(&store, SHOWS_SAVED_EVENTS_KEY)[0]["savedAt"], json!(100));

        assert_eq!(library.refresh_from(&[fresh], 600), 0);
    }

    #[test]
    fn test_saved_events_order() {
        let (_, mut library) = library();
        let base = Utc.with_ymd_and_hms(2030, 5, 1, 20, 0, 0).unwrap();
        library.toggle_saved(&event("late", Some(base + Duration::days(2))), 1);
        library.toggle_saved(&event("undated", None), base.timestamp_millis() + 1);
        library.toggle_saved(&event("early", Some(base)), 3);

        let ids: Vec<String> = library.saved_events().iter().map(|e| e.identity()).collect();
        assert_eq!(ids, vec!["early", "undated", "late"]);
    }

    #[test]
    fn test_load_tolerates_corrupt_keys() {
        let store = Arc::new(MemoryStore::new());
        store.set(SHOWS_SAVED_EVENTS_KEY, "{broken").unwrap();
        store.set(SHOWS_HIDDEN_EVENTS_KEY, r#"["a", 7, null, ""]"#).unwrap();
        store.set(SHOWS_HIDDEN_GENRES_KEY, r#"{"not":"array"}"#).unwrap();

        let mut library = EventLibrary::new(store, MirrorQueue::disabled());
        library.load(0);
        assert_eq!(library.saved_count(), 0);
        assert!(library.is_event_hidden("a"));
        assert!(library.is_event_hidden("7"));
        assert!(!library.is_event_hidden(""));
        assert!(library.hidden_genres().is_empty());
    }

    #[test]
    fn test_apply_remote_replaces_and_persists() {
        let (store, mut library) = library();
        library.toggle_saved(&event("local", None), 1);
        library.hide_event("old", 1);

        library.apply_remote(
            &json!({
                "savedEvents": [{ "id": "remote", "event": { "name": { "text": "R" } }, "savedAt": 9 }],
                "hiddenEventIds": "not an array"
            }),
            50,
        );

        assert!(library.is_saved("remote"));
        assert!(!library.is_saved("local"));
        assert!(library.is_event_hidden("old"));
        assert_eq!(stored(&store, SHOWS_SAVED_EVENTS_KEY)[0]["id"], json!("remote"));
    }

    #[derive(Default)]
    struct Recorder {
        writes: Mutex<Vec<RemoteDocument>>,
    }

    impl RemoteDocumentStore for Recorder {
        fn read(&self) -> BoxFuture<'_, Result<Option<Value>>> {
            Box::pin(async { Ok(None) })
        }

        fn merge_write(&self, document: RemoteDocument) -> BoxFuture<'_, Result<()>> {
            self.writes.lock().unwrap().push(document);
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn test_mutations_are_mirrored() {
        let recorder = Arc::new(Recorder::default());
        let (queue, handle) = MirrorQueue::spawn(recorder.clone());
        let mut library = EventLibrary::new(Arc::new(MemoryStore::new()), queue);

        library.toggle_saved(&event("a", None), 1);
        library.hide_event("a", 2);
        library.hide_genre("rock");
        drop(library);
        handle.await.unwrap();

        let writes = recorder.writes.lock().unwrap();
        let last = writes.last().unwrap();
        assert_eq!(last.updated_at, 2);
        assert!(last.saved_events.is_empty());
        assert_eq!(last.hidden_event_ids, vec!["a".to_string()]);
    }
}
