use crate::{
    Config,
    model::{CurrentWeatherData, ForecastData, LocationQuery, TemperatureUnit},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Failure of a single provider request. None of these are retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// 404 for a city-name lookup.
    #[error("City \"{city}\" not found")]
    NotFound { city: String },

    /// Any other non-2xx answer; `message` is the provider's `message` field when present.
    #[error("Weather provider returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to connect to weather service: {0}")]
    Transport(String),

    #[error("Failed to parse weather provider response: {0}")]
    Parse(String),
}

/// Remote source of current conditions and the 5-day/3-hour forecast.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(
        &self,
        query: &LocationQuery,
        unit: TemperatureUnit,
    ) -> Result<CurrentWeatherData, ProviderError>;

    async fn forecast(
        &self,
        query: &LocationQuery,
        unit: TemperatureUnit,
    ) -> Result<ForecastData, ProviderError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key()?;

    let provider = OpenWeatherProvider::with_base_url(
        api_key,
        config.base_url.clone(),
        config.request_timeout(),
    )?;

    Ok(Arc::new(provider))
}
