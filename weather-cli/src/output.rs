//! Human-friendly rendering of session views and notifications.

use chrono::{DateTime, Local, Utc};
use weather_core::{
    CurrentWeatherData, ForecastItem, Preferences, SessionView,
    model::capitalize_first,
    notify::{Level, Notification, Notifier},
};

/// Prints notifications to stderr so stdout stays clean for the report.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        let prefix = match notification.level {
            Level::Info => "info",
            Level::Success => "ok",
            Level::Error => "error",
        };
        eprintln!("{prefix}: {}", notification.message);
        if let Some(action) = notification.action {
            eprintln!("  hint: {action}");
        }
    }
}

fn format_date(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%A, %b %-d").to_string()
}

fn format_weekday(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%A").to_string()
}

fn format_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%-I:%M %p").to_string()
}

pub fn print_current(current: &CurrentWeatherData) {
    let unit = current.unit.symbol();
    let wind = current.unit.wind_speed_unit();

    println!("{}, {}", current.location_name, current.country);
    println!("{}", format_date(current.observed_at));
    println!();
    println!(
        "  {:.0}{unit}  {}",
        current.temperature.current,
        capitalize_first(&current.condition.description)
    );
    println!(
        "  Feels like {:.0}{unit}   H {:.0}{unit}  L {:.0}{unit}",
        current.temperature.feels_like, current.temperature.max, current.temperature.min
    );
    println!("  Humidity    {}%", current.humidity_pct);
    println!("  Wind        {:.1} {wind}", current.wind_speed);
    println!("  Pressure    {:.0} hPa", current.pressure_hpa);
    if let Some(visibility) = current.visibility_m {
        println!("  Visibility  {:.1} km", f64::from(visibility) / 1000.0);
    }
    println!("  Sunrise     {}", format_time(current.sunrise));
    println!("  Sunset      {}", format_time(current.sunset));
}

pub fn print_hourly(items: &[ForecastItem], unit_symbol: &str) {
    println!("Hourly Forecast");
    for item in items {
        println!(
            "  {:>8}  {:>4.0}{unit_symbol}  {:>3.0}%  {}",
            format_time(item.dt),
            item.temperature.current,
            item.precipitation_probability * 100.0,
            item.condition.description
        );
    }
}

pub fn print_daily(items: &[ForecastItem], unit_symbol: &str) {
    println!("{}-Day Forecast", items.len());
    for item in items {
        println!(
            "  {:<10} {:>4.0}{unit_symbol} / {:>4.0}{unit_symbol}  {}",
            format_weekday(item.dt),
            item.temperature.max,
            item.temperature.min,
            capitalize_first(&item.condition.description)
        );
    }
}

/// Full dashboard: current conditions, next 24 hours, and up to `days` days.
pub fn print_view(view: &SessionView, days: usize) {
    let Some(current) = &view.current else {
        println!("No weather to show yet. Try `weather show <city>`.");
        return;
    };

    print_current(current);

    if let Some(forecast) = &view.forecast {
        let symbol = forecast.unit.symbol();
        println!();
        print_hourly(view.hourly_forecast(), symbol);
        println!();
        let mut daily = view.daily_forecast();
        daily.truncate(days);
        print_daily(&daily, symbol);
    }
}

pub fn print_preferences(prefs: &Preferences) {
    let unit = prefs.temperature_unit();
    println!("Temperature unit   {} ({})", unit, unit.symbol());
    println!("Default location   {}", prefs.default_location());
    println!("Last searched      {}", prefs.last_searched_city());
    println!(
        "Location access    {}",
        if prefs.location_enabled() { "enabled" } else { "disabled" }
    );
    println!("Theme              {}", prefs.theme());
}
