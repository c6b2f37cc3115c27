//! Geolocation collaborator contract.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::models::Location;

/// How long a position request may take before it counts as failed.
pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Geolocation is not available on this device.")]
    Unsupported,

    #[error("Location access was denied. Enable location sharing and try again.")]
    PermissionDenied,

    #[error("Unable to determine your location.")]
    Timeout,

    #[error("Unable to determine your location.")]
    Unavailable(String),
}

/// One-shot, high-accuracy position source.
pub trait Geolocator: Send + Sync {
    fn current_position(&self) -> BoxFuture<'_, Result<Location, LocationError>>;
}

/// Ask `geolocator` for a position, giving up after `limit`.
pub async fn locate(geolocator: &dyn Geolocator, limit: Duration) -> Result<Location, LocationError> {
    match tokio::time::timeout(limit, geolocator.current_position()).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

/// Always answers with a configured coordinate, or reports that no position
/// source exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedGeolocator {
    location: Option<Location>,
}

impl FixedGeolocator {
    pub fn new(location: Location) -> Self {
        Self { location: Some(location) }
    }

    pub fn unconfigured() -> Self {
        Self { location: None }
    }
}

impl Geolocator for FixedGeolocator {
    fn current_position(&self) -> BoxFuture<'_, Result<Location, LocationError>> {
        let location = self.location;
        Box::pin(async move { location.ok_or(LocationError::Unsupported) })
    }
}
