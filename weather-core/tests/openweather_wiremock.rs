//! Integration tests for the OpenWeather client and the session using wiremock
//!
//! These tests run the real HTTP client against a mock server to check query
//! parameters, error classification and how the session reacts to failures.

use std::sync::Arc;

use weather_core::{
    GeolocationAcquirer, GeolocationConfig, LocationQuery, Preferences, ProviderError,
    SessionError, TemperatureUnit, WeatherProvider, WeatherSession,
    geolocation::NoLocation,
    model::Coordinates,
    notify::MemoryNotifier,
    provider::openweather::OpenWeatherProvider,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

const API_KEY: &str = "test-key";

fn current_body(name: &str, temp: f64) -> serde_json::Value {
    serde_json::json!({
        "coord": { "lon": 2.3488, "lat": 48.8534 },
        "weather": [
            { "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }
        ],
        "base": "stations",
        "main": {
            "temp": temp,
            "feels_like": temp - 0.5,
            "temp_min": temp - 2.0,
            "temp_max": temp + 2.0,
            "pressure": 1015,
            "humidity": 40
        },
        "visibility": 10000,
        "wind": { "speed": 3.6, "deg": 220 },
        "clouds": { "all": 0 },
        "dt": 1717243200,
        "sys": { "country": "FR", "sunrise": 1717214000, "sunset": 1717272000 },
        "timezone": 7200,
        "id": 2988507,
        "name": name,
        "cod": 200
    })
}

fn forecast_body(name: &str) -> serde_json::Value {
    let list: Vec<serde_json::Value> = (0..40)
        .map(|i| {
            serde_json::json!({
                "dt": 1717200000 + i * 10800,
                "main": {
                    "temp": 18.0 + i as f64 * 0.1,
                    "feels_like": 17.5,
                    "temp_min": 16.0,
                    "temp_max": 20.0,
                    "pressure": 1012,
                    "humidity": 55
                },
                "weather": [
                    { "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }
                ],
                "wind": { "speed": 4.1, "deg": 180 },
                "pop": 0.35,
                "dt_txt": "2024-06-01 00:00:00"
            })
        })
        .collect();

    serde_json::json!({
        "cod": "200",
        "message": 0,
        "cnt": 40,
        "list": list,
        "city": { "id": 2988507, "name": name, "country": "FR", "timezone": 7200 }
    })
}

fn create_provider(mock_server: &MockServer) -> OpenWeatherProvider {
    #[allow(clippy::expect_used)]
    OpenWeatherProvider::with_base_url(API_KEY.to_string(), mock_server.uri(), None)
        .expect("Failed to create provider")
}

struct Setup {
    session: WeatherSession,
    notifier: Arc<MemoryNotifier>,
    prefs: Preferences,
}

fn create_session(mock_server: &MockServer) -> Setup {
    let notifier = Arc::new(MemoryNotifier::new());
    let prefs = Preferences::in_memory();
    let location = Arc::new(GeolocationAcquirer::new(
        Arc::new(NoLocation),
        prefs.clone(),
        notifier.clone(),
        &GeolocationConfig::default(),
    ));
    let session = WeatherSession::new(
        Arc::new(create_provider(mock_server)),
        location,
        prefs.clone(),
        notifier.clone(),
    );
    Setup { session, notifier, prefs }
}

async fn mount_city(mock_server: &MockServer, city: &str, unit: &str, temp: f64) {
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", city))
        .and(query_param("units", unit))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body(city, temp)))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("q", city))
        .and(query_param("units", unit))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(city)))
        .mount(mock_server)
        .await;
}

// ============================================================================
// Provider
// ============================================================================

#[tokio::test]
async fn current_by_city_sends_key_and_units() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Paris"))
        .and(query_param("appid", API_KEY))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris", 21.5)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = create_provider(&mock_server);
    let weather = provider
        .current(&LocationQuery::City("Paris".into()), TemperatureUnit::Metric)
        .await
        .expect("current weather");

    assert_eq!(weather.location_name, "Paris");
    assert_eq!(weather.country, "FR");
    assert!((weather.temperature.current - 21.5).abs() < 0.01);
    assert!((weather.temperature.max - 23.5).abs() < 0.01);
    assert_eq!(weather.humidity_pct, 40);
    assert!((weather.pressure_hpa - 1015.0).abs() < 0.01);
    assert_eq!(weather.visibility_m, Some(10000));
    assert_eq!(weather.condition.code, 800);
    assert_eq!(weather.condition.icon, "01d");
    assert_eq!(weather.observed_at.timestamp(), 1717243200);
    assert_eq!(weather.sunrise.timestamp(), 1717214000);
    assert_eq!(weather.unit, TemperatureUnit::Metric);
}

#[tokio::test]
async fn coordinates_are_sent_as_lat_lon() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("lat", "48.85"))
        .and(query_param("lon", "2.35"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body("Paris")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = create_provider(&mock_server);
    let query = LocationQuery::Coords(Coordinates { latitude: 48.85, longitude: 2.35 });
    let forecast = provider
        .forecast(&query, TemperatureUnit::Imperial)
        .await
        .expect("forecast");

    assert_eq!(forecast.city, "Paris");
    assert_eq!(forecast.items.len(), 40);
    assert_eq!(forecast.unit, TemperatureUnit::Imperial);
    assert!((forecast.items[0].precipitation_probability - 0.35).abs() < 0.001);
    assert_eq!(
        forecast.items[1].dt.timestamp() - forecast.items[0].dt.timestamp(),
        3 * 3600
    );
}

#[tokio::test]
async fn city_404_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "cod": "404", "message": "city not found" })),
        )
        .mount(&mock_server)
        .await;

    let provider = create_provider(&mock_server);
    let err = provider
        .current(&LocationQuery::City("Atlantis".into()), TemperatureUnit::Metric)
        .await
        .unwrap_err();

    assert_eq!(err, ProviderError::NotFound { city: "Atlantis".into() });
}

#[tokio::test]
async fn unauthorized_carries_provider_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "cod": 401,
            "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
        })))
        .mount(&mock_server)
        .await;

    let provider = create_provider(&mock_server);
    let err = provider
        .current(&LocationQuery::City("Paris".into()), TemperatureUnit::Metric)
        .await
        .unwrap_err();

    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 401);
            assert!(message.starts_with("Invalid API key"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let provider = create_provider(&mock_server);
    let err = provider
        .current(&LocationQuery::City("Paris".into()), TemperatureUnit::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Parse(_)));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let provider = OpenWeatherProvider::with_base_url(
        API_KEY.to_string(),
        "http://127.0.0.1:1".to_string(),
        Some(std::time::Duration::from_secs(2)),
    )
    .expect("provider");

    let err = provider
        .current(&LocationQuery::City("Paris".into()), TemperatureUnit::Metric)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Transport(_)));
}

// ============================================================================
// Session
// ============================================================================

#[tokio::test]
async fn search_then_not_found_keeps_previous_weather() {
    let mock_server = MockServer::start().await;
    mount_city(&mock_server, "Paris", "metric", 21.5).await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Atlantis"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "cod": "404", "message": "city not found" })),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("q", "Atlantis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body("Atlantis")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let setup = create_session(&mock_server);
    setup.session.search_city("Paris").await.expect("Paris loads");

    let err = setup.session.search_city("Atlantis").await.unwrap_err();

    assert!(matches!(err, SessionError::Provider(ProviderError::NotFound { .. })));
    let view = setup.session.view();
    assert_eq!(view.current.expect("still displayed").location_name, "Paris");
    assert_eq!(view.forecast.expect("still displayed").city, "Paris");
    assert!(!view.is_loading);
    assert_eq!(setup.prefs.last_searched_city(), "Paris");

    let errors = setup.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("\"Atlantis\" not found"));
}

#[tokio::test]
async fn unit_change_refetches_once_under_new_unit() {
    let mock_server = MockServer::start().await;
    mount_city(&mock_server, "Paris", "metric", 21.5).await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Paris"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris", 70.7)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("q", "Paris"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body("Paris")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let setup = create_session(&mock_server);
    setup.session.search_city("Paris").await.expect("Paris loads");

    setup
        .session
        .apply_temperature_unit(TemperatureUnit::Imperial)
        .await
        .expect("refetch succeeds");

    let view = setup.session.view();
    let current = view.current.expect("displayed");
    assert_eq!(current.unit, TemperatureUnit::Imperial);
    assert!((current.temperature.current - 70.7).abs() < 0.01);
    assert_eq!(view.last_searched_city, "Paris");
    assert_eq!(setup.prefs.temperature_unit(), TemperatureUnit::Imperial);
}

#[tokio::test]
async fn server_error_after_current_keeps_previous_and_clears_loading() {
    let mock_server = MockServer::start().await;
    mount_city(&mock_server, "Paris", "metric", 21.5).await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "London"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body("London", 15.0)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("q", "London"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({ "cod": 500, "message": "Internal error" })),
        )
        .mount(&mock_server)
        .await;

    let setup = create_session(&mock_server);
    setup.session.search_city("Paris").await.expect("Paris loads");

    assert!(setup.session.search_city("London").await.is_err());

    let view = setup.session.view();
    assert!(!view.is_loading);
    assert_eq!(view.current.expect("displayed").location_name, "Paris");
    let errors = setup.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Error: Internal error");
}
