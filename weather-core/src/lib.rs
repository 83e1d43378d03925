//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client behind the `WeatherProvider` trait
//! - The daily-forecast reducer
//! - Typed preferences over a key/value store
//! - Location permission tracking and device coordinates
//! - `Settings` for user-initiated preference changes
//! - `WeatherSession`, which ties the above together
//!
//! It is used by `weather-cli`, but can also be reused by other front-ends.

pub mod config;
pub mod forecast;
pub mod geolocation;
pub mod model;
pub mod notify;
pub mod prefs;
pub mod provider;
pub mod session;
pub mod settings;

pub use config::{Config, GeolocationConfig};
pub use forecast::{daily_forecast, daily_forecast_in, hourly_forecast};
pub use geolocation::{
    GeolocationAcquirer, GeolocationError, LocationPlatform, PermissionState, PositionOptions,
};
pub use model::{
    Coordinates, CurrentWeatherData, ForecastData, ForecastItem, LocationQuery, TemperatureUnit,
    Theme,
};
pub use notify::{Notification, Notifier};
pub use prefs::{FileStore, KeyValueStore, MemoryStore, Preferences};
pub use provider::{ProviderError, WeatherProvider, provider_from_config};
pub use session::{SessionError, SessionView, WeatherSession};
pub use settings::Settings;
