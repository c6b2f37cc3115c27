use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::context::DiscoveryContext;
use super::status::{
    DiscoveryError, DiscoveryOutcome, EventSource, Status, CHECKING_MESSAGE, NO_EVENTS_MESSAGE,
};
use super::view::RenderedView;
use crate::api::ApiClient;
use crate::auth::TokenProvider;
use crate::cache::{describe_cached, CacheSnapshot, EventCache, CACHE_TTL};
use crate::config::Config;
use crate::endpoint::{absolute_endpoint, resolve, EndpointOverrides};
use crate::filter::{CalendarDay, GenreSelection, View};
use crate::geo::{locate, Geolocator, GEOLOCATION_TIMEOUT};
use crate::library::{EventLibrary, MirrorQueue, RemoteDocumentStore};
use crate::models::{clamp_days, clamp_radius, days_from_date, Event, Location, SearchPrefs};
use crate::storage::{KeyValueStore, PreferenceStore};

/// Where and how discovery fetches.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub base_url: String,
    pub overrides: EndpointOverrides,
    pub origin: Option<String>,
    pub cache_ttl: Duration,
    pub geolocation_timeout: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            overrides: EndpointOverrides::default(),
            origin: None,
            cache_ttl: CACHE_TTL,
            geolocation_timeout: GEOLOCATION_TIMEOUT,
        }
    }
}

impl DiscoverySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            overrides: config.endpoint_overrides(),
            origin: config.origin.clone(),
            cache_ttl: config.cache_ttl(),
            geolocation_timeout: config.geolocation_timeout(),
        }
    }
}

/// Parameters of one discovery trigger.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverRequest {
    /// Skip the cache even when it could answer.
    pub force: bool,
    /// Replace the current preferences first.
    pub prefs: Option<SearchPrefs>,
}

impl DiscoverRequest {
    pub fn forced() -> Self {
        Self { force: true, prefs: None }
    }
}

/// Marks a discovery as running; cleared when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn try_begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives discovery: cache or network, then reconciliation with saved and
/// hidden state, and the view state the frontend renders from.
///
/// All methods take `&self`. State sits behind a mutex that is never held
/// across an await; at most one discovery runs at a time and concurrent
/// triggers return [`DiscoveryOutcome::Skipped`].
pub struct Discovery {
    settings: DiscoverySettings,
    store: Arc<dyn KeyValueStore>,
    cache: EventCache,
    prefs_store: PreferenceStore,
    client: ApiClient,
    geolocator: Arc<dyn Geolocator>,
    tokens: Arc<dyn TokenProvider>,
    remote: Option<Arc<dyn RemoteDocumentStore>>,
    mirror_task: Option<JoinHandle<()>>,
    state: Mutex<DiscoveryContext>,
    in_flight: AtomicBool,
    initialized: AtomicBool,
    token_warned: AtomicBool,
}

impl Discovery {
    pub fn new(
        settings: DiscoverySettings,
        store: Arc<dyn KeyValueStore>,
        client: ApiClient,
        geolocator: Arc<dyn Geolocator>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let library = EventLibrary::new(store.clone(), MirrorQueue::disabled());
        Self {
            cache: EventCache::new(store.clone(), settings.cache_ttl),
            prefs_store: PreferenceStore::new(store.clone()),
            settings,
            store,
            client,
            geolocator,
            tokens,
            remote: None,
            mirror_task: None,
            state: Mutex::new(DiscoveryContext::new(library)),
            in_flight: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            token_warned: AtomicBool::new(false),
        }
    }

    /// Mirror saved and hidden state to `remote`. Must be called from within
    /// a tokio runtime, before `init`.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteDocumentStore>) -> Self {
        let (queue, handle) = MirrorQueue::spawn(remote.clone());
        let ctx = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        ctx.library = EventLibrary::new(self.store.clone(), queue);
        self.remote = Some(remote);
        self.mirror_task = Some(handle);
        self
    }

    fn lock(&self) -> MutexGuard<'_, DiscoveryContext> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load local state, pull the remote document, adopt the cached window
    /// and fetch unless the cache already answers. Runs once.
    pub async fn init(&self) -> DiscoveryOutcome {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return DiscoveryOutcome::Skipped;
        }

        self.lock().library.load(Utc::now().timestamp_millis());
        self.sync_from_remote().await;

        let mut prefs = self.prefs_store.load();
        let now = Utc::now();
        let snapshot = self.cache.load().filter(|s| !s.events.is_empty());
        let Some(snapshot) = snapshot else {
            self.lock().prefs = prefs;
            return self.discover(DiscoverRequest::default()).await;
        };

        if let Some(radius) = snapshot.radius_miles.filter(|r| *r != 0.0) {
            prefs.radius = clamp_radius(radius as i64);
        }
        if let Some(days) = snapshot.days.filter(|d| *d != 0.0) {
            prefs.days = clamp_days(days as i64);
        }
        self.prefs_store.persist(&prefs);
        let usable = self.cache.is_usable(&snapshot, &prefs, now);
        debug!(count = snapshot.events.len(), usable, "Adopting cached events");
        {
            let mut ctx = self.lock();
            ctx.prefs = prefs;
        }
        let outcome = self.adopt_cached(snapshot, true);
        if usable {
            return outcome;
        }
        self.discover(DiscoverRequest::default()).await
    }

    async fn sync_from_remote(&self) {
        let Some(remote) = self.remote.as_ref() else {
            return;
        };
        match remote.read().await {
            Ok(Some(document)) => {
                let mut ctx = self.lock();
                ctx.library.apply_remote(&document, Utc::now().timestamp_millis());
                info!(saved = ctx.library.saved_count(), "Saved shows loaded from remote document");
            }
            Ok(None) => debug!("No remote document yet"),
            Err(e) => warn!(error = %e, "Unable to load saved shows from remote document"),
        }
    }

    /// Run one discovery cycle.
    pub async fn discover(&self, request: DiscoverRequest) -> DiscoveryOutcome {
        let Some(_flight) = InFlight::try_begin(&self.in_flight) else {
            debug!("Discovery already in progress, skipping");
            return DiscoveryOutcome::Skipped;
        };

        let prefs = {
            let mut ctx = self.lock();
            if let Some(next) = request.prefs {
                ctx.prefs = next.clamped();
            }
            ctx.prefs
        };
        self.prefs_store.persist(&prefs);

        if !request.force {
            if let Some(snapshot) = self.cache.load() {
                if !snapshot.events.is_empty() && self.cache.is_usable(&snapshot, &prefs, Utc::now()) {
                    return self.adopt_cached(snapshot, true);
                }
            }
        }

        self.lock().status = Some(Status::info(CHECKING_MESSAGE));
        match self.fetch(&prefs).await {
            Ok((events, location)) => self.adopt_fetched(events, location, prefs),
            Err(e) => {
                warn!(error = %e, "Unable to load live events");
                let mut ctx = self.lock();
                ctx.events.clear();
                ctx.source = None;
                ctx.status = Some(Status::error(e.user_message()));
                DiscoveryOutcome::Failed(e)
            }
        }
    }

    /// Forced discovery, ignoring the cache.
    pub async fn refresh(&self) -> DiscoveryOutcome {
        self.discover(DiscoverRequest::forced()).await
    }

    async fn fetch(&self, prefs: &SearchPrefs) -> Result<(Vec<Event>, Location), DiscoveryError> {
        let location = locate(self.geolocator.as_ref(), self.settings.geolocation_timeout).await?;

        let origin = self.settings.origin.as_deref();
        let resolved = resolve(&self.settings.base_url, &self.settings.overrides, origin);
        let endpoint = absolute_endpoint(&resolved.endpoint, origin);
        let token = if resolved.is_remote {
            self.bearer_token().await
        } else {
            None
        };
        debug!(endpoint = %endpoint, remote = resolved.is_remote, "Fetching shows");

        let events = self
            .client
            .fetch_events(&endpoint, &location, prefs, token.as_deref())
            .await?;
        Ok((events, location))
    }

    async fn bearer_token(&self) -> Option<String> {
        match self.tokens.bearer_token().await {
            Ok(token) => token,
            Err(e) => {
                if !self.token_warned.swap(true, Ordering::Relaxed) {
                    warn!(error = %e, "Token unavailable for remote shows request");
                }
                None
            }
        }
    }

    fn adopt_fetched(&self, events: Vec<Event>, location: Location, prefs: SearchPrefs) -> DiscoveryOutcome {
        let now = Utc::now();
        let count = events.len();
        let snapshot = CacheSnapshot::new(events, now, Some(location), prefs);
        self.cache.save(&snapshot);

        let mut ctx = self.lock();
        ctx.library.refresh_from(&snapshot.events, now.timestamp_millis());
        ctx.events = snapshot.events;
        ctx.genres = GenreSelection::All;
        ctx.source = Some(EventSource::Remote);
        ctx.fetched_at = snapshot.fetched_at;
        ctx.location = Some(location);
        ctx.status = Some(if count == 0 {
            Status::info(NO_EVENTS_MESSAGE)
        } else {
            let plural = if count == 1 { "" } else { "s" };
            Status::success(format!("Found {} show{} nearby.", count, plural))
        });
        info!(count, "Shows fetched");
        DiscoveryOutcome::Fetched { count }
    }

    fn adopt_cached(&self, snapshot: CacheSnapshot, reset_genres: bool) -> DiscoveryOutcome {
        let count = snapshot.events.len();
        let mut ctx = self.lock();
        ctx.status = Some(Status::info(describe_cached(count, snapshot.fetched_at)));
        ctx.events = snapshot.events;
        ctx.source = Some(EventSource::Cache);
        ctx.fetched_at = snapshot.fetched_at;
        ctx.location = snapshot.location;
        if reset_genres {
            ctx.genres = GenreSelection::All;
        }
        DiscoveryOutcome::Cached { count }
    }

    pub async fn set_radius(&self, radius: i64) -> DiscoveryOutcome {
        let next = SearchPrefs {
            radius: clamp_radius(radius),
            ..self.prefs()
        };
        self.apply_prefs(next).await
    }

    pub async fn set_days(&self, days: i64) -> DiscoveryOutcome {
        let next = SearchPrefs {
            days: clamp_days(days),
            ..self.prefs()
        };
        self.apply_prefs(next).await
    }

    /// Look ahead through `date` (inclusive), counted from today.
    pub async fn set_days_through(&self, date: NaiveDate) -> DiscoveryOutcome {
        let days = days_from_date(date, Local::now().date_naive());
        self.set_days(days as i64).await
    }

    /// Persist new preferences, then answer from the cache when it is fresh
    /// and covers them, otherwise fetch.
    async fn apply_prefs(&self, next: SearchPrefs) -> DiscoveryOutcome {
        {
            let mut ctx = self.lock();
            if ctx.prefs == next {
                return DiscoveryOutcome::Unchanged;
            }
            ctx.prefs = next;
        }
        self.prefs_store.persist(&next);

        match self.cache.load() {
            Some(snapshot)
                if !snapshot.events.is_empty() && self.cache.is_usable(&snapshot, &next, Utc::now()) =>
            {
                debug!(radius = next.radius, days = next.days, "Cached events cover new preferences");
                self.adopt_cached(snapshot, false)
            }
            _ => {
                self.discover(DiscoverRequest {
                    force: true,
                    prefs: Some(next),
                })
                .await
            }
        }
    }

    pub fn prefs(&self) -> SearchPrefs {
        self.lock().prefs
    }

    pub fn status(&self) -> Option<Status> {
        self.lock().status.clone()
    }

    pub fn view(&self) -> View {
        self.lock().view
    }

    pub fn set_view(&self, view: View) {
        self.lock().view = view;
    }

    pub fn set_calendar_day(&self, day: Option<CalendarDay>) {
        self.lock().calendar_day = day;
    }

    pub fn select_all_genres(&self) {
        self.lock().genres = GenreSelection::All;
    }

    pub fn select_no_genres(&self) {
        self.lock().genres = GenreSelection::none();
    }

    /// Narrow the all-events view to exactly `genres`.
    pub fn select_genres<S: AsRef<str>>(&self, genres: &[S]) {
        let mut ctx = self.lock();
        let available = ctx.available_genres(&Local::now());
        ctx.genres = GenreSelection::only(genres.iter().map(|g| g.as_ref()), &available);
    }

    pub fn toggle_genre(&self, genre: &str) {
        let mut ctx = self.lock();
        let available = ctx.available_genres(&Local::now());
        ctx.genres.toggle(genre, &available);
    }

    /// Hide a genre everywhere. Returns false when it was already hidden.
    pub fn hide_genre(&self, genre: &str) -> bool {
        let mut ctx = self.lock();
        let Some(key) = ctx.library.hide_genre(genre) else {
            return false;
        };
        ctx.genres.forget(&key);
        true
    }

    pub fn restore_genre(&self, genre: &str) -> bool {
        self.lock().library.restore_genre(genre)
    }

    /// Save or unsave the event with `identity`. Returns whether it is saved
    /// afterwards, or `None` when no such event is known.
    pub fn toggle_saved(&self, identity: &str) -> Option<bool> {
        let now_ms = Utc::now().timestamp_millis();
        let mut ctx = self.lock();
        if let Some(event) = ctx.events.iter().find(|e| e.identity() == identity).cloned() {
            return Some(ctx.library.toggle_saved(&event, now_ms));
        }
        if ctx.library.unsave(identity, now_ms) {
            return Some(false);
        }
        None
    }

    pub fn hide_event(&self, identity: &str) -> bool {
        let now_ms = Utc::now().timestamp_millis();
        self.lock().library.hide_event(identity, now_ms)
    }

    /// What the current view shows right now.
    pub fn render(&self) -> RenderedView {
        RenderedView::build(&self.lock(), &Local::now())
    }

    /// Stop the mirror writer after it has flushed queued updates.
    pub async fn close(self) {
        let Discovery { state, mirror_task, .. } = self;
        drop(state);
        if let Some(handle) = mirror_task {
            if let Err(e) = handle.await {
                warn!(error = %e, "Remote mirror writer ended abnormally");
            }
        }
    }
}
