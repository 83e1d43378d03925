//! The single source of truth for what weather is currently displayed.
//!
//! Overlapping searches are allowed and the last one to resolve wins; there
//! is no cancellation or sequencing between them.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    forecast,
    geolocation::{GeolocationAcquirer, GeolocationError, PermissionState},
    model::{
        CurrentWeatherData, ForecastData, ForecastItem, LocationQuery, TemperatureUnit, Theme,
    },
    notify::{Notification, Notifier},
    prefs::{DEFAULT_CITY, Preferences},
    provider::{ProviderError, WeatherProvider},
    settings::Settings,
};

pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a city name";
pub const CONNECTION_MESSAGE: &str =
    "Failed to connect to weather service. Please try again later.";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("{}", EMPTY_QUERY_MESSAGE)]
    EmptyQuery,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Location(#[from] GeolocationError),
}

/// Copy of the session state handed to renderers.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub current: Option<CurrentWeatherData>,
    pub forecast: Option<ForecastData>,
    pub is_loading: bool,
    pub unit: TemperatureUnit,
    pub last_searched_city: String,
    pub default_location: String,
    pub theme: Theme,
}

impl SessionView {
    /// One reading per day, at most five days.
    pub fn daily_forecast(&self) -> Vec<ForecastItem> {
        self.forecast
            .as_ref()
            .map(|f| forecast::five_day_forecast(&f.items))
            .unwrap_or_default()
    }

    /// The next 24 hours.
    pub fn hourly_forecast(&self) -> &[ForecastItem] {
        self.forecast
            .as_ref()
            .map(|f| forecast::hourly_forecast(&f.items))
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    view: SessionView,
    /// Query behind the displayed snapshots, re-run on refresh.
    last_query: Option<LocationQuery>,
}

#[derive(Debug)]
pub struct WeatherSession {
    provider: Arc<dyn WeatherProvider>,
    location: Arc<GeolocationAcquirer>,
    prefs: Preferences,
    settings: Settings,
    notifier: Arc<dyn Notifier>,
    permission: watch::Receiver<PermissionState>,
    state: Mutex<SessionState>,
}

/// Clears the loading flag when the request settles, whichever way it ends.
struct LoadingGuard<'a> {
    session: &'a WeatherSession,
}

impl<'a> LoadingGuard<'a> {
    fn start(session: &'a WeatherSession) -> Self {
        session.lock().view.is_loading = true;
        Self { session }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().view.is_loading = false;
    }
}

impl WeatherSession {
    /// Build a session with preferences read from `prefs`.
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        location: Arc<GeolocationAcquirer>,
        prefs: Preferences,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let view = SessionView {
            unit: prefs.temperature_unit(),
            last_searched_city: prefs.last_searched_city(),
            default_location: prefs.default_location(),
            theme: prefs.theme(),
            ..SessionView::default()
        };

        Self {
            permission: location.subscribe(),
            settings: Settings::new(prefs.clone(), notifier.clone()),
            provider,
            location,
            prefs,
            notifier,
            state: Mutex::new(SessionState { view, last_query: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // The state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> SessionView {
        self.lock().view.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().view.is_loading
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.lock().view.unit
    }

    pub fn location_permission(&self) -> PermissionState {
        *self.permission.borrow()
    }

    /// Initial load: the default location, or the built-in city when unset.
    pub async fn start(&self) -> Result<(), SessionError> {
        let default = self.lock().view.default_location.clone();
        let city = if default.trim().is_empty() { DEFAULT_CITY.to_string() } else { default };
        self.search_city(&city).await
    }

    pub async fn search_city(&self, name: &str) -> Result<(), SessionError> {
        let city = name.trim();
        if city.is_empty() {
            self.notifier.notify(Notification::error(EMPTY_QUERY_MESSAGE));
            return Err(SessionError::EmptyQuery);
        }

        let _loading = LoadingGuard::start(self);
        self.fetch_and_commit(LocationQuery::City(city.to_string())).await
    }

    /// Weather for the device's position. Location failures are already
    /// reported by the acquirer and are only passed through here.
    pub async fn get_location_weather(&self) -> Result<(), SessionError> {
        let _loading = LoadingGuard::start(self);

        let coords = self.location.current_coordinates().await?;
        self.fetch_and_commit(LocationQuery::Coords(coords)).await
    }

    /// Store the unit preference. Returns whether it changed.
    /// Displayed data keeps its old unit until [`Self::refresh`].
    pub fn set_temperature_unit(&self, unit: TemperatureUnit) -> bool {
        let changed = {
            let mut state = self.lock();
            let changed = state.view.unit != unit;
            state.view.unit = unit;
            changed
        };

        if changed {
            self.settings.set_temperature_unit(unit);
        }
        changed
    }

    /// Re-run the query behind the displayed snapshot under the active unit.
    /// Does nothing when nothing is displayed.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let query = {
            let state = self.lock();
            if state.view.current.is_none() {
                return Ok(());
            }
            state.last_query.clone()
        };

        match query {
            Some(query) => {
                let _loading = LoadingGuard::start(self);
                self.fetch_and_commit(query).await
            }
            None => Ok(()),
        }
    }

    /// Change the unit and refetch what is on screen under it.
    pub async fn apply_temperature_unit(&self, unit: TemperatureUnit) -> Result<(), SessionError> {
        if self.set_temperature_unit(unit) {
            self.refresh().await
        } else {
            Ok(())
        }
    }

    /// Persist only; the next `start` picks it up.
    pub fn set_default_location(&self, name: &str) -> Result<(), SessionError> {
        let city = self.settings.set_default_location(name)?;
        self.lock().view.default_location = city;
        Ok(())
    }

    pub fn theme(&self) -> Theme {
        self.lock().view.theme
    }

    pub fn set_theme(&self, theme: Theme) {
        self.lock().view.theme = theme;
        self.settings.set_theme(theme);
    }

    pub fn toggle_theme(&self) -> Theme {
        let next = self.theme().toggle();
        self.set_theme(next);
        next
    }

    async fn fetch_and_commit(&self, query: LocationQuery) -> Result<(), SessionError> {
        let unit = self.temperature_unit();

        match self.fetch(&query, unit).await {
            Ok((current, forecast)) => {
                self.commit(query, current, forecast);
                Ok(())
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Weather fetch failed");
                self.notifier.notify(provider_notification(&e));
                Err(e.into())
            }
        }
    }

    async fn fetch(
        &self,
        query: &LocationQuery,
        unit: TemperatureUnit,
    ) -> Result<(CurrentWeatherData, ForecastData), ProviderError> {
        let current = self.provider.current(query, unit).await?;
        let forecast = self.provider.forecast(query, unit).await?;
        Ok((current, forecast))
    }

    fn commit(&self, query: LocationQuery, current: CurrentWeatherData, forecast: ForecastData) {
        let city = match &query {
            LocationQuery::City(name) => name.clone(),
            LocationQuery::Coords(_) => current.location_name.clone(),
        };

        {
            let mut state = self.lock();
            state.view.current = Some(current);
            state.view.forecast = Some(forecast);
            state.view.last_searched_city = city.clone();
            state.last_query = Some(query);
        }

        self.prefs.set_last_searched_city(&city);
        info!(city = %city, "Weather updated");
    }
}

/// One message per failed fetch; "not found" is kept apart from other failures.
pub fn provider_notification(error: &ProviderError) -> Notification {
    match error {
        ProviderError::NotFound { city } => {
            Notification::error(format!("City \"{city}\" not found. Please check the spelling."))
        }
        ProviderError::Api { message, .. } if !message.trim().is_empty() => {
            Notification::error(format!("Error: {message}"))
        }
        ProviderError::Api { .. } => Notification::error("Error: Failed to fetch weather data"),
        ProviderError::Transport(_) => Notification::error(CONNECTION_MESSAGE),
        ProviderError::Parse(_) => {
            Notification::error("Failed to fetch weather data. Please try again later.")
        }
    }
}
