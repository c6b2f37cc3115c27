//! Discovery orchestration.
//!
//! `Discovery` ties the pieces together: it geolocates, resolves the
//! endpoint, fetches or serves from cache, reconciles saved events with the
//! fresh payloads, and keeps the view state (`View`, genre selection,
//! calendar day) that `render()` turns into a `RenderedView`.

pub mod context;
pub mod orchestrator;
pub mod status;
pub mod view;

pub use context::DiscoveryContext;
pub use orchestrator::{DiscoverRequest, Discovery, DiscoverySettings};
pub use status::{
    DiscoveryError, DiscoveryOutcome, EventSource, Status, StatusTone, CHECKING_MESSAGE,
    NO_EVENTS_MESSAGE,
};
pub use view::{RenderedView, VisibleEvent};

#[cfg(test)]
mod tests;
