use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Local, Utc};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::Notify;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::api::ApiClient;
use crate::auth::{StaticToken, TokenProvider};
use crate::cache::{CacheSnapshot, EventCache, CACHE_TTL};
use crate::filter::View;
use crate::geo::{FixedGeolocator, Geolocator, LocationError};
use crate::library::{RemoteDocument, RemoteDocumentStore};
use crate::models::{Event, Location, SearchPrefs};
use crate::storage::{load_json, MemoryStore, SHOWS_SAVED_EVENTS_KEY, SHOWS_SEARCH_PREFS_KEY};

fn here() -> Location {
    Location::new(30.2672, -97.7431)
}

fn show(id: &str, days_ahead: i64, genres: &[&str]) -> Value {
    json!({
        "id": id,
        "name": { "text": format!("Show {}", id) },
        "start": { "utc": (Utc::now() + ChronoDuration::days(days_ahead)).to_rfc3339() },
        "venue": { "name": "Mohawk", "address": { "city": "Austin", "region": "TX" } },
        "distance": 4.2,
        "genres": genres
    })
}

fn shows_body(events: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "events": events }))
}

async fn shows_server(events: Vec<Value>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/shows"))
        .respond_with(shows_body(events))
        .mount(&server)
        .await;
    server
}

fn located() -> Arc<dyn Geolocator> {
    Arc::new(FixedGeolocator::new(here()))
}

fn build(
    settings: DiscoverySettings,
    store: &Arc<MemoryStore>,
    geolocator: Arc<dyn Geolocator>,
    tokens: Arc<dyn TokenProvider>,
) -> Discovery {
    Discovery::new(settings, store.clone(), ApiClient::new().unwrap(), geolocator, tokens)
}

fn discovery_for(server: &MockServer, store: &Arc<MemoryStore>, geolocator: Arc<dyn Geolocator>) -> Discovery {
    let settings = DiscoverySettings {
        base_url: server.uri(),
        ..Default::default()
    };
    build(settings, store, geolocator, Arc::new(StaticToken::none()))
}

fn seed_cache(store: &Arc<MemoryStore>, events: Vec<Value>, prefs: SearchPrefs, age: ChronoDuration) {
    let snapshot = CacheSnapshot::new(Event::list_from_values(events), Utc::now() - age, Some(here()), prefs);
    EventCache::new(store.clone(), CACHE_TTL).save(&snapshot);
}

fn ids(events: &[VisibleEvent]) -> Vec<&str> {
    events.iter().map(|e| e.identity.as_str()).collect()
}

struct Denied;

impl Geolocator for Denied {
    fn current_position(&self) -> BoxFuture<'_, Result<Location, LocationError>> {
        Box::pin(async { Err(LocationError::PermissionDenied) })
    }
}

struct Gated {
    gate: Arc<Notify>,
}

impl Geolocator for Gated {
    fn current_position(&self) -> BoxFuture<'_, Result<Location, LocationError>> {
        Box::pin(async move {
            self.gate.notified().await;
            Ok(here())
        })
    }
}

#[derive(Default)]
struct RemoteRecorder {
    document: Option<Value>,
    writes: Mutex<Vec<RemoteDocument>>,
}

impl RemoteDocumentStore for RemoteRecorder {
    fn read(&self) -> BoxFuture<'_, Result<Option<Value>>> {
        let document = self.document.clone();
        Box::pin(async move { Ok(document) })
    }

    fn merge_write(&self, document: RemoteDocument) -> BoxFuture<'_, Result<()>> {
        self.writes.lock().unwrap().push(document);
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test]
async fn test_init_fetches_when_nothing_cached() {
    let server = shows_server(vec![show("a", 1, &["Rock"]), show("b", 2, &[])]).await;
    let store = Arc::new(MemoryStore::new());
    let discovery = discovery_for(&server, &store, located());

    let outcome = discovery.init().await;
    assert!(matches!(outcome, DiscoveryOutcome::Fetched { count: 2 }));

    let view = discovery.render();
    assert_eq!(view.source, Some(EventSource::Remote));
    assert_eq!(ids(&view.events), vec!["a", "b"]);
    assert_eq!(view.events[0].genres, vec!["Rock".to_string()]);

    let cached = EventCache::new(store.clone(), CACHE_TTL).load().unwrap();
    assert_eq!(cached.events.len(), 2);
    assert_eq!(cached.location, Some(here()));
    assert_eq!(
        load_json(store.as_ref(), SHOWS_SEARCH_PREFS_KEY).unwrap(),
        Some(json!({ "radius": 100, "days": 30 }))
    );

    assert!(discovery.init().await.is_skipped());
}

#[tokio::test]
async fn test_init_serves_fresh_cache_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(shows_body(Vec::new()))
        .expect(0)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, vec![show("a", 1, &[])], SearchPrefs::new(50, 14), ChronoDuration::hours(1));

    let discovery = discovery_for(&server, &store, located());
    let outcome = discovery.init().await;

    assert!(matches!(outcome, DiscoveryOutcome::Cached { count: 1 }));
    assert_eq!(discovery.prefs(), SearchPrefs::new(50, 14));
    let status = discovery.status().unwrap();
    assert!(status.message.starts_with("Showing 1 cached event."));
    assert_eq!(discovery.render().source, Some(EventSource::Cache));
}

#[tokio::test]
async fn test_init_refetches_stale_cache_with_cached_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/shows"))
        .and(query_param("radius", "50"))
        .and(query_param("days", "14"))
        .respond_with(shows_body(vec![show("fresh", 1, &[])]))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, vec![show("old", 1, &[])], SearchPrefs::new(50, 14), ChronoDuration::hours(9));

    let discovery = discovery_for(&server, &store, located());
    let outcome = discovery.init().await;

    assert!(matches!(outcome, DiscoveryOutcome::Fetched { count: 1 }));
    assert_eq!(ids(&discovery.render().events), vec!["fresh"]);
}

#[tokio::test]
async fn test_preference_changes_within_cache_coverage_stay_offline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(shows_body(Vec::new()))
        .expect(0)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    seed_cache(
        &store,
        vec![show("near", 1, &[]), show("later", 40, &[])],
        SearchPrefs::new(150, 60),
        ChronoDuration::minutes(5),
    );

    let discovery = discovery_for(&server, &store, located());
    discovery.init().await;
    assert_eq!(discovery.render().events.len(), 2);

    assert!(matches!(discovery.set_radius(50).await, DiscoveryOutcome::Cached { .. }));
    assert!(matches!(discovery.set_radius(125).await, DiscoveryOutcome::Cached { .. }));
    assert!(matches!(discovery.set_radius(125).await, DiscoveryOutcome::Unchanged));

    let through = Local::now().date_naive() + ChronoDuration::days(7);
    assert!(matches!(discovery.set_days_through(through).await, DiscoveryOutcome::Cached { .. }));
    assert_eq!(discovery.prefs(), SearchPrefs::new(125, 7));
    assert_eq!(ids(&discovery.render().events), vec!["near"]);
}

#[tokio::test]
async fn test_expanding_past_cache_coverage_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("radius", "100"))
        .and(query_param("days", "14"))
        .respond_with(shows_body(vec![show("wider", 1, &[])]))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, vec![show("a", 1, &[])], SearchPrefs::new(50, 14), ChronoDuration::minutes(5));

    let discovery = discovery_for(&server, &store, located());
    assert!(matches!(discovery.init().await, DiscoveryOutcome::Cached { .. }));
    assert!(matches!(discovery.set_radius(100).await, DiscoveryOutcome::Fetched { count: 1 }));
    assert_eq!(
        load_json(store.as_ref(), SHOWS_SEARCH_PREFS_KEY).unwrap(),
        Some(json!({ "radius": 100, "days": 14 }))
    );
}

#[tokio::test]
async fn test_preference_change_never_serves_empty_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/shows"))
        .respond_with(shows_body(Vec::new()))
        .expect(2)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());

    let discovery = discovery_for(&server, &store, located());
    assert!(matches!(discovery.init().await, DiscoveryOutcome::Fetched { count: 0 }));
    assert!(matches!(discovery.set_radius(50).await, DiscoveryOutcome::Fetched { count: 0 }));
}

#[tokio::test]
async fn test_concurrent_discovery_is_skipped() {
    let server = shows_server(vec![show("a", 1, &[])]).await;
    let store = Arc::new(MemoryStore::new());
    let gate = Arc::new(Notify::new());
    let discovery = discovery_for(&server, &store, Arc::new(Gated { gate: gate.clone() }));

    let (first, second) = tokio::join!(discovery.refresh(), async {
        tokio::task::yield_now().await;
        let outcome = discovery.refresh().await;
        gate.notify_one();
        outcome
    });

    assert!(matches!(first, DiscoveryOutcome::Fetched { count: 1 }));
    assert!(second.is_skipped());

    gate.notify_one();
    assert!(matches!(discovery.refresh().await, DiscoveryOutcome::Fetched { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_fetch_failure_clears_working_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, vec![show("a", 1, &[])], SearchPrefs::default(), ChronoDuration::hours(10));

    let discovery = discovery_for(&server, &store, located());
    let outcome = discovery.init().await;

    assert!(matches!(outcome, DiscoveryOutcome::Failed(DiscoveryError::Network(_))));
    let view = discovery.render();
    assert!(view.events.is_empty());
    let status = view.status.unwrap();
    assert!(status.is_error());
    assert!(status.message.starts_with("Failed to fetch shows"));

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_location_denied_never_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(shows_body(Vec::new()))
        .expect(0)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    let discovery = discovery_for(&server, &store, Arc::new(Denied));

    let outcome = discovery.refresh().await;
    assert!(matches!(
        outcome,
        DiscoveryOutcome::Failed(DiscoveryError::Location(LocationError::PermissionDenied))
    ));
    assert_eq!(
        discovery.status().unwrap().message,
        "Location access was denied. Enable location sharing and try again."
    );
}

#[tokio::test]
async fn test_empty_result_status() {
    let server = shows_server(Vec::new()).await;
    let store = Arc::new(MemoryStore::new());
    let discovery = discovery_for(&server, &store, located());

    assert!(matches!(discovery.refresh().await, DiscoveryOutcome::Fetched { count: 0 }));
    assert_eq!(discovery.status().unwrap().message, NO_EVENTS_MESSAGE);
    assert_eq!(discovery.render().notice.as_deref(), Some("No events found."));
}

#[tokio::test]
async fn test_token_sent_to_remote_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(shows_body(Vec::new()))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryStore::new());
    let settings = DiscoverySettings {
        base_url: server.uri(),
        ..Default::default()
    };
    let discovery = build(settings, &store, located(), Arc::new(StaticToken::new("tok")));

    assert!(matches!(discovery.refresh().await, DiscoveryOutcome::Fetched { .. }));
}

#[tokio::test]
async fn test_no_token_for_same_origin_dev_server() {
    let server = shows_server(Vec::new()).await;
    let store = Arc::new(MemoryStore::new());
    let settings = DiscoverySettings {
        base_url: server.uri(),
        origin: Some(server.uri()),
        ..Default::default()
    };
    let discovery = build(settings, &store, located(), Arc::new(StaticToken::new("tok")));

    assert!(matches!(discovery.refresh().await, DiscoveryOutcome::Fetched { .. }));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/api/shows");
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_save_hide_and_views() {
    let server = shows_server(vec![show("a", 1, &[]), show("b", 2, &[]), show("c", 3, &[])]).await;
    let store = Arc::new(MemoryStore::new());
    let discovery = discovery_for(&server, &store, located());
    discovery.init().await;

    assert_eq!(discovery.toggle_saved("a"), Some(true));
    assert_eq!(discovery.toggle_saved("nope"), None);
    let view = discovery.render();
    assert_eq!(ids(&view.events), vec!["b", "c"]);
    assert_eq!(ids(&view.saved_section), vec!["a"]);
    assert!(view.saved_section[0].saved);

    assert!(discovery.hide_event("a"));
    let view = discovery.render();
    assert_eq!(ids(&view.events), vec!["b", "c"]);
    assert!(view.saved_section.is_empty());

    discovery.set_view(View::Saved);
    let view = discovery.render();
    assert!(view.events.is_empty());
    assert_eq!(view.notice.as_deref(), Some("No saved events yet."));

    assert_eq!(discovery.toggle_saved("c"), Some(true));
    let view = discovery.render();
    assert_eq!(ids(&view.events), vec!["c"]);
    assert_eq!(view.notice.as_deref(), Some("Showing 1 saved event."));
    assert!(view.calendar.len() >= 3);
}

#[tokio::test]
async fn test_refresh_updates_saved_copy_and_keeps_saved_at() {
    let server = MockServer::start().await;
    let mut old = show("a", 2, &[]);
    old["name"]["text"] = json!("Old Name");
    let mut new = show("a", 2, &[]);
    new["name"]["text"] = json!("New Name");
    Mock::given(method("GET"))
        .respond_with(shows_body(vec![old]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(shows_body(vec![new]))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let discovery = discovery_for(&server, &store, located());
    discovery.init().await;
    discovery.toggle_saved("a");
    let before = load_json(store.as_ref(), SHOWS_SAVED_EVENTS_KEY).unwrap().unwrap();

    assert!(matches!(discovery.refresh().await, DiscoveryOutcome::Fetched { count: 1 }));
    let after = load_json(store.as_ref(), SHOWS_SAVED_EVENTS_KEY).unwrap().unwrap();
    assert_eq!(after[0]["savedAt"], before[0]["savedAt"]);
    assert_eq!(after[0]["event"]["name"]["text"], json!("New Name"));
}

#[tokio::test]
async fn test_genre_controls() {
    let server = shows_server(vec![
        show("a", 1, &["Rock"]),
        show("b", 2, &["Jazz"]),
        show("c", 3, &[]),
    ])
    .await;
    let store = Arc::new(MemoryStore::new());
    let discovery = discovery_for(&server, &store, located());
    discovery.init().await;

    discovery.toggle_genre("Rock");
    let view = discovery.render();
    assert_eq!(ids(&view.events), vec!["b"]);
    let rock = view.genres.iter().find(|g| g.genre == "Rock").unwrap();
    assert!(!rock.selected);

    discovery.select_no_genres();
    let view = discovery.render();
    assert!(view.events.is_empty());
    assert_eq!(view.notice.as_deref(), Some("Select at least one tag to see matching shows."));

    discovery.select_all_genres();
    assert_eq!(discovery.render().events.len(), 3);

    discovery.select_genres(&["Rock", "Rock"]);
    assert_eq!(ids(&discovery.render().events), vec!["a"]);
    discovery.select_genres(&["Jazz", "Rock"]);
    assert_eq!(discovery.render().events.len(), 3);

    assert!(discovery.hide_genre("jazz"));
    assert!(!discovery.hide_genre("Jazz"));
    let view = discovery.render();
    assert_eq!(view.hidden_genres, vec!["jazz".to_string()]);
    let labels: Vec<&str> = view.genres.iter().map(|g| g.genre.as_str()).collect();
    assert_eq!(labels, vec!["Rock"]);
    assert_eq!(view.events.len(), 3);

    assert!(discovery.restore_genre("Jazz"));
    assert_eq!(discovery.render().genres.len(), 2);
}

#[tokio::test]
async fn test_remote_document_sync_and_mirror() {
    let server = shows_server(vec![show("a", 1, &[]), show("b", 2, &[])]).await;
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(RemoteRecorder {
        document: Some(json!({
            "savedEvents": [{ "id": "r", "event": show("r", 5, &[]), "savedAt": 1 }],
            "hiddenEventIds": ["b"]
        })),
        ..Default::default()
    });
    let discovery = discovery_for(&server, &store, located()).with_remote(remote.clone());
    discovery.init().await;

    assert_eq!(ids(&discovery.render().events), vec!["a"]);
    assert_eq!(
        load_json(store.as_ref(), SHOWS_SAVED_EVENTS_KEY).unwrap().unwrap()[0]["id"],
        json!("r")
    );

    discovery.set_view(View::Saved);
    assert_eq!(ids(&discovery.render().events), vec!["r"]);

    assert_eq!(discovery.toggle_saved("a"), Some(true));
    discovery.close().await;

    let writes = remote.writes.lock().unwrap();
    let last = writes.last().unwrap();
    let saved: Vec<&str> = last.saved_events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(saved, vec!["r", "a"]);
    assert_eq!(last.hidden_event_ids, vec!["b".to_string()]);
}
