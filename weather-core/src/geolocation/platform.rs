use async_trait::async_trait;

use crate::model::Coordinates;

use super::{GeolocationError, LocationPlatform, PermissionState, PositionOptions};

/// Coordinates known up front, e.g. from the command line. Always granted.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coords: Coordinates,
}

impl FixedLocation {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl LocationPlatform for FixedLocation {
    async fn query_permission(&self) -> Option<PermissionState> {
        Some(PermissionState::Granted)
    }

    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Ok(self.coords)
    }
}

/// A device without any location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationPlatform for NoLocation {
    async fn query_permission(&self) -> Option<PermissionState> {
        None
    }

    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}
