//! gigcache core library.
//!
//! Discovery cache and filter engine for nearby live events:
//! - `endpoint`: picks the shows endpoint from configuration and origin
//! - `cache`: the last fetched snapshot and its freshness/coverage rules
//! - `filter`: the staged pipeline from fetched events to the visible list
//! - `library`: saved and hidden state, mirrored to a remote document
//! - `discovery`: the single-flight orchestrator tying it together
//!
//! Collaborators the engine only consumes (position, bearer tokens, the
//! remote document, key-value storage) are traits in `geo`, `auth`,
//! `library` and `storage`.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod filter;
pub mod geo;
pub mod library;
pub mod models;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheSnapshot, EventCache};
pub use config::Config;
pub use discovery::{
    DiscoverRequest, Discovery, DiscoveryError, DiscoveryOutcome, DiscoverySettings, RenderedView,
    Status, StatusTone,
};
pub use endpoint::{resolve, EndpointOverrides, ResolvedEndpoint};
pub use filter::{CalendarDay, GenreSelection, View};
pub use geo::{FixedGeolocator, Geolocator, LocationError};
pub use models::{Event, Location, SearchPrefs};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
