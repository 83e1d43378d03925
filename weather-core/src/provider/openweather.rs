use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::model::{
    CurrentWeatherData, ForecastData, ForecastItem, LocationQuery, TemperatureUnit, Temperatures,
    WeatherCondition,
};

use super::{ProviderError, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    /// `timeout` of `None` leaves the transport's default behavior in place.
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &LocationQuery,
        unit: TemperatureUnit,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut params: Vec<(&str, String)> = match query {
            LocationQuery::City(name) => vec![("q", name.clone())],
            LocationQuery::Coords(coords) => vec![
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
            ],
        };
        params.push(("appid", self.api_key.clone()));
        params.push(("units", unit.as_str().to_string()));

        debug!(url = %url, query = %query, units = %unit, "Requesting OpenWeather");

        let res = self.http.get(&url).query(&params).send().await.map_err(|e| {
            warn!(error = %e, "OpenWeather request failed to send");
            ProviderError::Transport(e.to_string())
        })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status, &body, query));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(body = %truncate_body(&body), "Unexpected OpenWeather {endpoint} payload");
            ProviderError::Parse(e.to_string())
        })
    }
}

fn classify_failure(status: StatusCode, body: &str, query: &LocationQuery) -> ProviderError {
    if status == StatusCode::NOT_FOUND {
        if let LocationQuery::City(name) = query {
            return ProviderError::NotFound { city: name.clone() };
        }
    }

    let message = serde_json::from_str::<OwError>(body)
        .ok()
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| truncate_body(body));

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct OwError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    #[serde(default)]
    pressure: f64,
    humidity: u8,
}

impl From<&OwMain> for Temperatures {
    fn from(main: &OwMain) -> Self {
        Temperatures {
            current: main.temp,
            feels_like: main.feels_like,
            min: main.temp_min,
            max: main.temp_max,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u32,
    description: String,
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    sys: OwSys,
    visibility: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

fn first_condition(weather: &[OwWeather]) -> WeatherCondition {
    weather
        .first()
        .map(|w| WeatherCondition {
            code: w.id,
            description: w.description.clone(),
            icon: w.icon.clone(),
        })
        .unwrap_or_else(|| WeatherCondition {
            code: 0,
            description: "Unknown".to_string(),
            icon: String::new(),
        })
}

fn timestamp(ts: i64) -> Result<DateTime<Utc>, ProviderError> {
    unix_to_utc(ts).ok_or_else(|| ProviderError::Parse(format!("Invalid timestamp {ts}")))
}

impl OwCurrentResponse {
    fn into_snapshot(self, unit: TemperatureUnit) -> Result<CurrentWeatherData, ProviderError> {
        Ok(CurrentWeatherData {
            observed_at: timestamp(self.dt)?,
            sunrise: timestamp(self.sys.sunrise)?,
            sunset: timestamp(self.sys.sunset)?,
            temperature: Temperatures::from(&self.main),
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure,
            visibility_m: self.visibility,
            wind_speed: self.wind.speed,
            condition: first_condition(&self.weather),
            location_name: self.name,
            country: self.sys.country,
            unit,
        })
    }
}

impl OwForecastResponse {
    fn into_snapshot(self, unit: TemperatureUnit) -> Result<ForecastData, ProviderError> {
        let items = self
            .list
            .iter()
            .map(|entry| {
                Ok(ForecastItem {
                    dt: timestamp(entry.dt)?,
                    temperature: Temperatures::from(&entry.main),
                    precipitation_probability: entry.pop,
                    condition: first_condition(&entry.weather),
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        Ok(ForecastData {
            city: self.city.name,
            country: self.city.country,
            items,
            unit,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip_all, fields(query = %query, unit = %unit))]
    async fn current(
        &self,
        query: &LocationQuery,
        unit: TemperatureUnit,
    ) -> Result<CurrentWeatherData, ProviderError> {
        let parsed: OwCurrentResponse = self.get_json("weather", query, unit).await?;
        parsed.into_snapshot(unit)
    }

    #[instrument(skip_all, fields(query = %query, unit = %unit))]
    async fn forecast(
        &self,
        query: &LocationQuery,
        unit: TemperatureUnit,
    ) -> Result<ForecastData, ProviderError> {
        let parsed: OwForecastResponse = self.get_json("forecast", query, unit).await?;
        parsed.into_snapshot(unit)
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}
