use std::sync::Arc;

use tracing::warn;

use super::{load_json, save_json, KeyValueStore, SHOWS_SEARCH_PREFS_KEY};
use crate::models::SearchPrefs;

/// Load/persist round-trip for the search radius and look-ahead window.
#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored preferences, or defaults when nothing usable is stored.
    pub fn load(&self) -> SearchPrefs {
        match load_json(self.store.as_ref(), SHOWS_SEARCH_PREFS_KEY) {
            Ok(Some(value)) => SearchPrefs::from_value(&value),
            Ok(None) => SearchPrefs::default(),
            Err(e) => {
                warn!(error = %e, "Unable to load search preferences, using defaults");
                SearchPrefs::default()
            }
        }
    }

    pub fn persist(&self, prefs: &SearchPrefs) {
        if let Err(e) = save_json(self.store.as_ref(), SHOWS_SEARCH_PREFS_KEY, &prefs.clamped()) {
            warn!(error = %e, "Unable to store search preferences");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let prefs = PreferenceStore::new(store.clone());
        assert_eq!(prefs.load(), SearchPrefs::default());

        prefs.persist(&SearchPrefs::new(25, 7));
        assert_eq!(prefs.load(), SearchPrefs { radius: 25, days: 7 });
    }

    #[test]
    fn test_persist_clamps() {
        let store = Arc::new(MemoryStore::new());
        let prefs = PreferenceStore::new(store.clone());
        prefs.persist(&SearchPrefs { radius: 900, days: 400 });
        assert_eq!(
            store.get(SHOWS_SEARCH_PREFS_KEY).unwrap().as_deref(),
            Some(r#"{"radius":150,"days":60}"#)
        );
    }

    #[test]
    fn test_corrupt_value_degrades_to_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.set(SHOWS_SEARCH_PREFS_KEY, "radius=5").unwrap();
        assert_eq!(PreferenceStore::new(store).load(), SearchPrefs::default());
    }
}
