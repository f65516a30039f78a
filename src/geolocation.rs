//! Position acquisition for proximity search

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::models::Coordinates;

/// Upper bound on a single position request
pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("Location access was denied. Please allow location access and try again.")]
    PermissionDenied,
    #[error("Location is unavailable. Please check your internet connection and try again.")]
    PositionUnavailable,
    #[error("Location request timed out. Please try again.")]
    Timeout,
    #[error("Please check your browser permissions or try searching by zip code instead.")]
    Unsupported,
}

impl GeolocationError {
    /// Map a W3C `GeolocationPositionError.code`
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => GeolocationError::PermissionDenied,
            2 => GeolocationError::PositionUnavailable,
            3 => GeolocationError::Timeout,
            _ => GeolocationError::Unsupported,
        }
    }

    pub fn user_message(&self) -> String {
        format!("Unable to get your location. {}", self)
    }
}

/// Source of the user's current position
pub trait Geolocator {
    fn current_position(&self) -> impl Future<Output = Result<Coordinates, GeolocationError>> + Send;
}

/// Always reports the same position
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator(pub Coordinates);

impl Geolocator for FixedLocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

/// No positioning capability
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLocator;

impl Geolocator for UnavailableLocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Ask `locator` for a position, giving up after `timeout`.
///
/// There is no retry; the caller decides whether to ask again.
pub async fn locate<G: Geolocator>(locator: &G, timeout: Duration) -> Result<Coordinates, GeolocationError> {
    match tokio::time::timeout(timeout, locator.current_position()).await {
        Ok(Ok(position)) => Ok(position),
        Ok(Err(e)) => {
            warn!("Geolocation failed: {:?}", e);
            Err(e)
        }
        Err(_) => {
            warn!("Geolocation timed out after {:?}", timeout);
            Err(GeolocationError::Timeout)
        }
    }
}
