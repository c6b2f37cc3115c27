//! Local caching of the last fetched event set.
//!
//! A `CacheSnapshot` records the events together with when, where and for
//! which radius/day window they were fetched. A snapshot can answer a new
//! request without touching the network only when it is both fresh (younger
//! than the TTL, 8 hours by default) and covering (its window contains the
//! requested one).

pub mod snapshot;

pub use snapshot::{describe_cached, format_age, CacheSnapshot, EventCache, CACHE_TTL};
