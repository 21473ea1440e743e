//! The home-page settings file.
//!
//! A TOML file with a `[settings]` table plus `[apps]`, `[links]` and
//! `[socials]` tables mapping display names to targets. Values are read
//! leniently: a bad or missing entry never fails the load, it either falls
//! back to a default or leaves the weather settings unusable so fetches
//! fail with a configuration error.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::error::FetchError;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TITLE: &str = "Home";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    pub fn speed_suffix(&self) -> &'static str {
        match self {
            Self::Metric => "m/s",
            Self::Imperial => "mph",
        }
    }
}

/// When a failed refresh may be attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Wait a full refresh interval after the failed attempt.
    #[default]
    NextCycle,
    /// Retry on the next read.
    Immediate,
}

/// Everything the weather layer needs. Read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub units: Units,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            latitude: None,
            longitude: None,
            units: Units::Metric,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_policy: RetryPolicy::NextCycle,
        }
    }
}

impl Settings {
    pub fn new(api_key: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            api_key: api_key.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }

    pub fn refresh_interval(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.refresh_interval_secs.min(u32::MAX as u64) as i64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks the key and coordinates, returning them ready for a request.
    pub fn validate(&self) -> Result<(&str, f64, f64), FetchError> {
        let api_key = self.api_key.trim();
        if api_key.is_empty() {
            return Err(FetchError::Configuration("no API key provided".to_string()));
        }

        let latitude = self
            .latitude
            .filter(|lat| lat.is_finite() && (-90.0..=90.0).contains(lat))
            .ok_or_else(|| FetchError::Configuration("latitude missing or out of range".to_string()))?;

        let longitude = self
            .longitude
            .filter(|lon| lon.is_finite() && (-180.0..=180.0).contains(lon))
            .ok_or_else(|| {
                FetchError::Configuration("longitude missing or out of range".to_string())
            })?;

        Ok((api_key, latitude, longitude))
    }

    pub fn is_configured(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Non-weather content of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageSettings {
    pub title: String,
    pub apps: BTreeMap<String, String>,
    pub links: BTreeMap<String, String>,
    pub socials: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsFile {
    pub weather: Settings,
    pub page: PageSettings,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            weather: Settings::default(),
            page: PageSettings {
                title: DEFAULT_TITLE.to_string(),
                ..PageSettings::default()
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSettingsFile {
    #[serde(default)]
    settings: toml::Table,
    #[serde(default)]
    apps: toml::Table,
    #[serde(default)]
    links: toml::Table,
    #[serde(default)]
    socials: toml::Table,
}

impl SettingsFile {
    /// Loads the file at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            warn!("⚠️  Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, SettingsError> {
        let raw: RawSettingsFile = toml::from_str(contents)?;
        let table = &raw.settings;

        let weather = Settings {
            api_key: string(table, "weather_api_key").unwrap_or_default(),
            latitude: float(table, "latitude"),
            longitude: float(table, "longitude"),
            units: match string(table, "units").map(|units| units.to_lowercase()) {
                None => Units::Metric,
                Some(units) if units == "metric" => Units::Metric,
                Some(units) if units == "imperial" => Units::Imperial,
                Some(units) => {
                    warn!("⚠️  Unknown units '{}', using metric", units);
                    Units::Metric
                }
            },
            refresh_interval_secs: positive(
                table,
                "refresh_interval_seconds",
                DEFAULT_REFRESH_INTERVAL_SECS,
            ),
            request_timeout_secs: positive(
                table,
                "request_timeout_seconds",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            retry_policy: match string(table, "retry_policy").as_deref() {
                None | Some("next_cycle") => RetryPolicy::NextCycle,
                Some("immediate") => RetryPolicy::Immediate,
                Some(other) => {
                    warn!("⚠️  Unknown retry_policy '{}', using next_cycle", other);
                    RetryPolicy::NextCycle
                }
            },
        };

        if weather.latitude.is_none() || weather.longitude.is_none() {
            warn!("⚠️  Coordinates missing or invalid, weather will be unavailable");
        }

        let page = PageSettings {
            title: string(table, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            apps: entries(&raw.apps),
            links: entries(&raw.links),
            socials: entries(&raw.socials),
        };

        Ok(Self { weather, page })
    }

    /// Replaces the file's API key with one from the environment.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(api_key) = api_key {
            self.weather.api_key = api_key;
        }
        self
    }
}

fn string(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(value) => Some(value.trim().to_string()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

fn float(table: &toml::Table, key: &str) -> Option<f64> {
    let value = match table.get(key)? {
        toml::Value::Float(value) => Some(*value),
        toml::Value::Integer(value) => Some(*value as f64),
        toml::Value::String(value) => value.trim().parse().ok(),
        _ => None,
    };

    if value.is_none() {
        warn!("⚠️  Setting '{}' is not a number", key);
    }
    value.filter(|value| value.is_finite())
}

fn positive(table: &toml::Table, key: &str, default: u64) -> u64 {
    let value = match table.get(key) {
        None => return default,
        Some(toml::Value::Integer(value)) => u64::try_from(*value).ok(),
        Some(toml::Value::String(value)) => value.trim().parse().ok(),
        Some(_) => None,
    };

    match value {
        Some(value) if value > 0 => value,
        _ => {
            warn!("⚠️  Setting '{}' must be a positive integer, using {}", key, default);
            default
        }
    }
}

fn entries(table: &toml::Table) -> BTreeMap<String, String> {
    table
        .iter()
        .filter_map(|(name, value)| match value {
            toml::Value::String(target) => Some((name.clone(), target.clone())),
            _ => {
                warn!("⚠️  Ignoring non-string entry '{}'", name);
                None
            }
        })
        .collect()
}
