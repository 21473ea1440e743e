//! Integration tests for the OpenWeatherMap fetcher and the cache on top of
//! it, against a wiremock provider.

use homepage::clock::SystemClock;
use homepage::settings::Units;
use homepage::{FetchError, OpenWeatherMapFetcher, Settings, WeatherCache, WeatherFetcher};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEATHER_PATH: &str = "/data/2.5/weather";

fn current_weather(temp: f64, main: &str) -> serde_json::Value {
    serde_json::json!({
        "coord": {"lon": 21.0, "lat": 52.2},
        "weather": [{"id": 800, "main": main, "description": "clear sky", "icon": "01d"}],
        "main": {"temp": temp, "feels_like": temp - 1.0, "humidity": 70},
        "wind": {"speed": 4.1, "deg": 200},
        "name": "Warsaw"
    })
}

fn fetcher_for(server: &MockServer) -> OpenWeatherMapFetcher {
    OpenWeatherMapFetcher::with_base_url(format!("{}{}", server.uri(), WEATHER_PATH)).unwrap()
}

fn warsaw() -> Settings {
    Settings::new("X", 52.2, 21.0)
}

#[tokio::test]
async fn test_fetch_success_maps_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .and(query_param("lat", "52.2"))
        .and(query_param("lon", "21"))
        .and(query_param("units", "imperial"))
        .and(query_param("appid", "X"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather(50.0, "Clear")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let settings = Settings {
        units: Units::Imperial,
        ..warsaw()
    };
    let snapshot = fetcher_for(&mock_server).fetch(&settings).await.unwrap();

    assert!(snapshot.valid);
    assert_eq!(snapshot.temperature, 50.0);
    assert_eq!(snapshot.condition_code, 800);
    assert_eq!(snapshot.condition_text, "Clear");
    assert_eq!(snapshot.humidity, 70);
    assert_eq!(snapshot.wind_speed, 4.1);
    assert_eq!(snapshot.location, "Warsaw");
    assert_eq!(snapshot.units, Units::Imperial);
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    let cases: [(u16, FetchError); 3] = [
        (401, FetchError::Unauthorized),
        (429, FetchError::RateLimited),
        (404, FetchError::NotFound),
    ];

    for (status, expected) in cases {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "cod": status,
                "message": "provider says no"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = fetcher_for(&mock_server).fetch(&warsaw()).await.unwrap_err();
        assert_eq!(err, expected);
    }
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = fetcher_for(&mock_server).fetch(&warsaw()).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn test_unparseable_body_is_malformed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let err = fetcher_for(&mock_server).fetch(&warsaw()).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unexpected_shape_is_malformed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {"temperature": 10.0}
        })))
        .mount(&mock_server)
        .await;

    let err = fetcher_for(&mock_server).fetch(&warsaw()).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(current_weather(10.0, "Clear"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let settings = Settings {
        request_timeout_secs: 1,
        ..warsaw()
    };
    let err = fetcher_for(&mock_server).fetch(&settings).await.unwrap_err();
    assert_eq!(err, FetchError::Timeout);
}

#[tokio::test]
async fn test_unreachable_provider_is_transport() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let fetcher =
        OpenWeatherMapFetcher::with_base_url(format!("http://127.0.0.1:{}{}", port, WEATHER_PATH))
            .unwrap();

    let err = fetcher.fetch(&warsaw()).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn test_bad_settings_never_reach_the_network() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather(10.0, "Clear")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let bad = [
        Settings::new("", 52.2, 21.0),
        Settings::new("X", 91.0, 21.0),
        Settings::new("X", -90.5, 21.0),
        Settings::new("X", 52.2, 181.0),
        Settings {
            longitude: None,
            ..warsaw()
        },
    ];

    for settings in bad {
        let err = fetcher.fetch(&settings).await.unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
    }
}

#[tokio::test]
async fn test_cache_without_key_stays_unavailable_and_offline() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather(10.0, "Clear")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let settings = Settings {
        api_key: String::new(),
        ..warsaw()
    };
    let cache = Arc::new(WeatherCache::new(
        Arc::new(fetcher_for(&mock_server)),
        Arc::new(SystemClock),
        settings,
    ));

    for _ in 0..5 {
        assert!(!cache.get().await.valid);
    }
}

#[tokio::test]
async fn test_cache_serves_repeat_reads_from_memory() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather(10.0, "Clear")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = Arc::new(WeatherCache::new(
        Arc::new(fetcher_for(&mock_server)),
        Arc::new(SystemClock),
        warsaw(),
    ));

    let first = cache.get().await;
    assert!(first.valid);
    assert_eq!(first.condition_text, "Clear");

    for _ in 0..5 {
        assert_eq!(cache.get().await, first);
    }
}
