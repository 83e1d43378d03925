use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use inquire::Password;
use std::{process::ExitCode, sync::Arc};
use tracing::debug;
use weather_core::{
    Config, Coordinates, FileStore, GeolocationAcquirer, LocationPlatform, Notification, Notifier,
    Preferences, Settings, TemperatureUnit, Theme, WeatherSession, forecast::DAILY_FORECAST_DAYS,
    geolocation::{FixedLocation, IpLocator},
    provider_from_config,
};

use crate::{
    location::TerminalLocation,
    output::{self, ConsoleNotifier},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where to get weather for.
#[derive(Debug, clap::Args)]
pub struct Target {
    /// City name; defaults to your saved default location.
    pub city: Option<String>,

    /// Use your current location.
    #[arg(long, conflicts_with_all = ["city", "lat", "lon"])]
    pub here: bool,

    /// Latitude of an explicit position.
    #[arg(long, requires = "lon", allow_hyphen_values = true, conflicts_with = "city")]
    pub lat: Option<f64>,

    /// Longitude of an explicit position.
    #[arg(long, requires = "lat", allow_hyphen_values = true, conflicts_with = "city")]
    pub lon: Option<f64>,

    /// Switch the temperature unit before loading; the choice is saved.
    #[arg(long, value_enum)]
    pub units: Option<UnitArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UnitArg {
    Metric,
    Imperial,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Metric => TemperatureUnit::Metric,
            UnitArg::Imperial => TemperatureUnit::Imperial,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Toggle,
    Light,
    Dark,
}

impl ThemeArg {
    /// The theme to set, or `None` to flip the current one.
    fn fixed(self) -> Option<Theme> {
        match self {
            ThemeArg::Toggle => None,
            ThemeArg::Light => Some(Theme::Light),
            ThemeArg::Dark => Some(Theme::Dark),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LocationAction {
    /// Show whether location access is enabled.
    Status,
    /// Ask for location access now.
    Enable,
    /// Turn location access off.
    Disable,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure {
        /// Key to store; prompted for when omitted.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Show current conditions plus hourly and daily forecast.
    Show {
        #[command(flatten)]
        target: Target,
    },

    /// Show the daily forecast only.
    Forecast {
        #[command(flatten)]
        target: Target,

        /// Number of days, at most 5.
        #[arg(long, default_value_t = DAILY_FORECAST_DAYS)]
        days: usize,
    },

    /// Set the temperature unit.
    Unit {
        #[arg(value_enum)]
        unit: UnitArg,
    },

    /// Set the location loaded when no city is given.
    Default { city: String },

    /// Set or toggle the display theme.
    Theme {
        #[arg(value_enum, default_value_t = ThemeArg::Toggle)]
        mode: ThemeArg,
    },

    /// Print saved preferences.
    Prefs,

    /// Manage location access.
    Location {
        #[arg(value_enum, default_value_t = LocationAction::Status)]
        action: LocationAction,
    },
}

/// Composition root: everything a command may need, built once.
struct App {
    config: Config,
    prefs: Preferences,
    settings: Settings,
    notifier: Arc<ConsoleNotifier>,
}

impl App {
    fn load() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let prefs_path = Config::preferences_file_path()?;
        debug!(path = %prefs_path.display(), "Opening preferences");

        let prefs = Preferences::new(Arc::new(FileStore::open(prefs_path)));
        let notifier = Arc::new(ConsoleNotifier);

        Ok(Self {
            config,
            settings: Settings::new(prefs.clone(), notifier.clone()),
            prefs,
            notifier,
        })
    }

    fn acquirer(&self, platform: Arc<dyn LocationPlatform>) -> Arc<GeolocationAcquirer> {
        let acquirer = Arc::new(GeolocationAcquirer::new(
            platform,
            self.prefs.clone(),
            self.notifier.clone(),
            &self.config.geolocation,
        ));
        acquirer.spawn_permission_sync();
        acquirer
    }

    fn terminal_acquirer(&self) -> anyhow::Result<Arc<GeolocationAcquirer>> {
        let locator = IpLocator::new(self.config.geolocation.lookup_url.clone())
            .context("Failed to create location lookup client")?;
        Ok(self.acquirer(Arc::new(TerminalLocation::new(locator, self.prefs.clone()))))
    }

    fn session(&self, target: &Target) -> anyhow::Result<WeatherSession> {
        let provider = provider_from_config(&self.config)?;

        let location = match (target.lat, target.lon) {
            (Some(lat), Some(lon)) => {
                self.acquirer(Arc::new(FixedLocation::new(Coordinates::new(lat, lon)?)))
            }
            _ => self.terminal_acquirer()?,
        };

        Ok(WeatherSession::new(provider, location, self.prefs.clone(), self.notifier.clone()))
    }

    fn notify_success(&self, message: impl Into<String>) {
        self.notifier.notify(Notification::success(message));
    }

    async fn load_target(&self, target: &Target) -> anyhow::Result<Option<WeatherSession>> {
        let session = self.session(target)?;
        if let Some(unit) = target.units {
            session.set_temperature_unit(unit.into());
        }

        let result = if target.here || target.lat.is_some() {
            session.get_location_weather().await
        } else if let Some(city) = &target.city {
            session.search_city(city).await
        } else {
            session.start().await
        };

        // Failures were already reported through the notifier.
        Ok(result.ok().map(|_| session))
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let app = App::load()?;

        match self.command {
            Command::Configure { api_key } => {
                let api_key = match api_key {
                    Some(key) => key,
                    None => Password::new("OpenWeather API key:")
                        .without_confirmation()
                        .prompt()
                        .context("Failed to read API key")?,
                };

                let mut config = app.config;
                config.set_api_key(api_key.trim().to_string());
                config.save()?;
                println!("Saved API key to {}", Config::config_file_path()?.display());
            }
            Command::Show { target } => {
                let Some(session) = app.load_target(&target).await? else {
                    return Ok(ExitCode::FAILURE);
                };
                output::print_view(&session.view(), DAILY_FORECAST_DAYS);
            }
            Command::Forecast { target, days } => {
                let Some(session) = app.load_target(&target).await? else {
                    return Ok(ExitCode::FAILURE);
                };
                let view = session.view();
                if let Some(forecast) = &view.forecast {
                    let mut daily = view.daily_forecast();
                    daily.truncate(days.min(DAILY_FORECAST_DAYS));
                    println!("{}, {}", forecast.city, forecast.country);
                    output::print_daily(&daily, forecast.unit.symbol());
                }
            }
            Command::Unit { unit } => {
                let unit = TemperatureUnit::from(unit);
                app.settings.set_temperature_unit(unit);
                app.notify_success(format!("Temperature unit set to {unit} ({})", unit.symbol()));
            }
            Command::Default { city } => {
                // Blank names were already reported through the notifier.
                let Ok(city) = app.settings.set_default_location(&city) else {
                    return Ok(ExitCode::FAILURE);
                };
                app.notify_success(format!("Default location set to {city}"));
            }
            Command::Theme { mode } => {
                let theme = match mode.fixed() {
                    Some(theme) => {
                        app.settings.set_theme(theme);
                        theme
                    }
                    None => app.settings.toggle_theme(),
                };
                app.notify_success(format!("Theme set to {theme}"));
            }
            Command::Prefs => output::print_preferences(&app.prefs),
            Command::Location { action } => match action {
                LocationAction::Status => {
                    let acquirer = app.terminal_acquirer()?;
                    let enabled = acquirer.check_permission().await;
                    println!(
                        "Location access is {} (permission: {})",
                        if enabled { "enabled" } else { "disabled" },
                        acquirer.state()
                    );
                }
                LocationAction::Enable => {
                    let acquirer = app.terminal_acquirer()?;
                    if !acquirer.request_permission().await {
                        return Ok(ExitCode::FAILURE);
                    }
                    app.notify_success("Location access enabled");
                }
                LocationAction::Disable => {
                    app.prefs.set_location_consent(Some(false));
                    app.prefs.set_location_enabled(false);
                    app.notifier.notify(Notification::info("Location access disabled"));
                }
            },
        }

        Ok(ExitCode::SUCCESS)
    }
}
