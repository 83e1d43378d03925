//! User-initiated preference changes: validation, persistence and feedback.
//!
//! Front-ends that only change settings use this directly; [`WeatherSession`]
//! routes its own setters through it so both paths behave the same.
//!
//! [`WeatherSession`]: crate::session::WeatherSession

use std::sync::Arc;
use tracing::info;

use crate::{
    model::{TemperatureUnit, Theme},
    notify::{Notification, Notifier},
    prefs::Preferences,
    session::{EMPTY_QUERY_MESSAGE, SessionError},
};

#[derive(Debug, Clone)]
pub struct Settings {
    prefs: Preferences,
    notifier: Arc<dyn Notifier>,
}

impl Settings {
    pub fn new(prefs: Preferences, notifier: Arc<dyn Notifier>) -> Self {
        Self { prefs, notifier }
    }

    /// Persist the unit. Returns whether it differs from the stored one.
    pub fn set_temperature_unit(&self, unit: TemperatureUnit) -> bool {
        let changed = self.prefs.temperature_unit() != unit;
        if changed {
            self.prefs.set_temperature_unit(unit);
            info!(unit = %unit, "Temperature unit changed");
        }
        changed
    }

    /// Persist a trimmed default location. Blank names are rejected with one
    /// notification and nothing is written.
    pub fn set_default_location(&self, name: &str) -> Result<String, SessionError> {
        let city = name.trim();
        if city.is_empty() {
            self.notifier.notify(Notification::error(EMPTY_QUERY_MESSAGE));
            return Err(SessionError::EmptyQuery);
        }

        self.prefs.set_default_location(city);
        Ok(city.to_string())
    }

    pub fn theme(&self) -> Theme {
        self.prefs.theme()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.prefs.set_theme(theme);
    }

    pub fn toggle_theme(&self) -> Theme {
        let next = self.theme().toggle();
        self.set_theme(next);
        next
    }
}
