use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FetchError;
use crate::settings::{Settings, Units};

pub const OPENWEATHERMAP_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// A point-in-time weather reading. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub condition_code: i64,
    pub condition_text: String,
    pub description: String,
    pub icon: String,
    pub humidity: u8,
    pub wind_speed: f64,
    pub location: String,
    pub units: Units,
    pub captured_at: DateTime<Utc>,
    pub valid: bool,
}

impl WeatherSnapshot {
    /// The "weather unavailable" placeholder served when no reading exists.
    pub fn unavailable(at: DateTime<Utc>) -> Self {
        Self {
            temperature: 0.0,
            condition_code: 0,
            condition_text: "Unavailable".to_string(),
            description: "Weather unavailable".to_string(),
            icon: String::new(),
            humidity: 0,
            wind_speed: 0.0,
            location: String::new(),
            units: Units::Metric,
            captured_at: at,
            valid: false,
        }
    }

    pub fn icon_url(&self) -> Option<String> {
        if self.icon.is_empty() {
            None
        } else {
            Some(format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon))
        }
    }
}

#[async_trait::async_trait]
pub trait WeatherFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Performs exactly one provider request, or none when `settings` are
    /// unusable. Never retries.
    async fn fetch(&self, settings: &Settings) -> Result<WeatherSnapshot, FetchError>;
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    weather: Vec<Condition>,
    main: MainReadings,
    wind: Wind,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    id: i64,
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
}

pub struct OpenWeatherMapFetcher {
    client: Client,
    base_url: String,
}

impl OpenWeatherMapFetcher {
    pub fn new() -> Result<Self> {
        Self::with_base_url(OPENWEATHERMAP_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("homepage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn classify_status(status: StatusCode, body: &str) -> FetchError {
        let message = serde_json::from_str::<ProviderErrorBody>(body)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_default();
        debug!("OpenWeatherMap answered {}: {}", status, message);

        match status {
            StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
            StatusCode::NOT_FOUND => FetchError::NotFound,
            _ if message.is_empty() => FetchError::Transport(format!("unexpected status {}", status)),
            _ => FetchError::Transport(format!("unexpected status {}: {}", status, message)),
        }
    }

    /// `captured_at` is provisional; `WeatherCache` restamps it from its own
    /// clock when the snapshot is installed.
    fn process_weather_data(body: &str, units: Units) -> Result<WeatherSnapshot, FetchError> {
        let current: CurrentConditions = serde_json::from_str(body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        let condition = current
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MalformedResponse("empty weather array".to_string()))?;

        Ok(WeatherSnapshot {
            temperature: current.main.temp,
            condition_code: condition.id,
            condition_text: condition.main,
            description: condition.description,
            icon: condition.icon,
            humidity: current.main.humidity,
            wind_speed: current.wind.speed,
            location: current.name.unwrap_or_default(),
            units,
            captured_at: Utc::now(),
            valid: true,
        })
    }
}

#[async_trait::async_trait]
impl WeatherFetcher for OpenWeatherMapFetcher {
    fn name(&self) -> &str {
        "OpenWeatherMap"
    }

    async fn fetch(&self, settings: &Settings) -> Result<WeatherSnapshot, FetchError> {
        let (api_key, lat, lon) = settings.validate()?;

        info!("🌤️  Fetching from OpenWeatherMap for {}, {}", lat, lon);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", settings.units.as_query().to_string()),
                ("appid", api_key.to_string()),
            ])
            .timeout(settings.request_timeout())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Self::process_weather_data(&body, settings.units)
        } else {
            Err(Self::classify_status(status, &body))
        }
    }
}
