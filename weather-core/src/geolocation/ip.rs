//! Approximate device location from the public IP address.
//! Defaults to ip-api.com - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::model::Coordinates;

use super::{GeolocationError, LocationPlatform, PermissionState, PositionOptions};

const USER_AGENT: &str = concat!("weather-cli/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IpLocator {
    http: Client,
    url: String,
}

impl IpLocator {
    pub fn new(url: impl Into<String>) -> Result<Self, GeolocationError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|_| GeolocationError::Unsupported)?;

        Ok(Self { http, url: url.into() })
    }

    pub async fn locate(&self, timeout: Duration) -> Result<Coordinates, GeolocationError> {
        let response = self
            .http
            .get(&self.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                debug!("IP lookup request failed: {}", e);
                if e.is_timeout() {
                    GeolocationError::Timeout
                } else {
                    GeolocationError::PositionUnavailable
                }
            })?;

        if !response.status().is_success() {
            debug!("IP lookup returned status {}", response.status());
            return Err(GeolocationError::PositionUnavailable);
        }

        let body: IpApiResponse = response.json().await.map_err(|e| {
            debug!("IP lookup parse error: {}", e);
            if e.is_timeout() {
                GeolocationError::Timeout
            } else {
                GeolocationError::PositionUnavailable
            }
        })?;

        if body.status != "success" {
            debug!("IP lookup failed: {}", body.message.unwrap_or_default());
            return Err(GeolocationError::PositionUnavailable);
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => {
                Coordinates::new(lat, lon).map_err(|_| GeolocationError::PositionUnavailable)
            }
            _ => Err(GeolocationError::PositionUnavailable),
        }
    }
}

/// No permission model of its own: callers that need consent wrap it.
#[async_trait]
impl LocationPlatform for IpLocator {
    async fn query_permission(&self) -> Option<PermissionState> {
        None
    }

    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        self.locate(options.timeout).await
    }
}
