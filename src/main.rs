use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use homepage::app::{self, AppState};
use homepage::clock::SystemClock;
use homepage::config::Config;
use homepage::settings::SettingsFile;
use homepage::{OpenWeatherMapFetcher, WeatherCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::load()?);

    // Initialize logging
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let settings = app::load_settings(&config).unwrap_or_else(|e| {
        error!("❌ {}; starting with default settings", e);
        SettingsFile::default().with_api_key(config.weather_api_key.clone())
    });

    // Initialize weather provider and cache
    let fetcher = match &config.weather_api_url {
        Some(url) => OpenWeatherMapFetcher::with_base_url(url.clone())?,
        None => OpenWeatherMapFetcher::new()?,
    };
    let cache = Arc::new(WeatherCache::new(
        Arc::new(fetcher),
        Arc::new(SystemClock),
        settings.weather,
    ));

    let state = AppState::new(config.clone(), cache, settings.page);
    let app = app::router(state);

    let addr = config.bind_address();
    info!("🏠 Home page server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
