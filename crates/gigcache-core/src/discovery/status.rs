use std::fmt;

use thiserror::Error;

use crate::api::ApiError;
use crate::geo::LocationError;

/// Shown while a fetch is under way.
pub const CHECKING_MESSAGE: &str = "Checking for new shows in your area...";

/// Shown when a fetch succeeds with nothing in it.
pub const NO_EVENTS_MESSAGE: &str = "No events to review. Expand filters to see more events.";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Network(#[from] ApiError),
}

impl DiscoveryError {
    /// Text for the status line.
    pub fn user_message(&self) -> String {
        match self {
            DiscoveryError::Location(e) => e.to_string(),
            DiscoveryError::Network(e) => e.user_message(),
        }
    }
}

/// Result of one discovery trigger.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    /// Fresh events came from the network.
    Fetched { count: usize },
    /// The cached snapshot answered the request.
    Cached { count: usize },
    /// Preferences did not change; nothing to do.
    Unchanged,
    /// Another discovery was already running.
    Skipped,
    Failed(DiscoveryError),
}

impl DiscoveryOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, DiscoveryOutcome::Skipped)
    }

    pub fn event_count(&self) -> Option<usize> {
        match self {
            DiscoveryOutcome::Fetched { count } | DiscoveryOutcome::Cached { count } => Some(*count),
            _ => None,
        }
    }
}

/// Where the working event set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Remote,
    Cache,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Remote => write!(f, "remote"),
            EventSource::Cache => write!(f, "cache"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Info,
    Success,
    Error,
}

/// One line of user-facing status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub tone: StatusTone,
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Self { message: message.into(), tone: StatusTone::Info }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { message: message.into(), tone: StatusTone::Success }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { message: message.into(), tone: StatusTone::Error }
    }

    pub fn is_error(&self) -> bool {
        self.tone == StatusTone::Error
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
