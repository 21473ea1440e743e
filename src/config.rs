use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Process-level configuration, read from `.env` and the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub settings_path: PathBuf,
    pub static_dir: PathBuf,
    pub weather_api_key: Option<String>,
    pub weather_api_url: Option<String>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            settings_path: PathBuf::from("homepage.toml"),
            static_dir: PathBuf::from("static"),
            weather_api_key: None,
            weather_api_url: None,
            debug: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let host = env::var("HOST").unwrap_or(defaults.host);

        let port = env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(defaults.port);

        let settings_path = env::var("HOMEPAGE_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or(defaults.settings_path);

        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        let weather_api_key = env::var("WEATHER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let weather_api_url = env::var("WEATHER_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let debug = env::var("DEBUG")
            .ok()
            .and_then(|debug| debug.parse().ok())
            .unwrap_or(false);

        Ok(Self {
            host,
            port,
            settings_path,
            static_dir,
            weather_api_key,
            weather_api_url,
            debug,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
