use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir};
use tracing::{info, warn};

use crate::cache::WeatherCache;
use crate::config::Config;
use crate::settings::{PageSettings, RetryPolicy, SettingsError, SettingsFile, Units};
use crate::templates::HomeTemplate;

#[derive(Clone)]
pub struct AppState {
    cache: Arc<WeatherCache>,
    page: Arc<RwLock<Arc<PageSettings>>>,
    config: Arc<Config>,
}

/// Settings as exposed over HTTP. The API key never leaves the server.
#[derive(Debug, Serialize)]
pub struct PublicSettings {
    pub title: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub units: Units,
    pub refresh_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub retry_policy: RetryPolicy,
    pub weather_configured: bool,
}

impl AppState {
    pub fn new(config: Arc<Config>, cache: Arc<WeatherCache>, page: PageSettings) -> Self {
        Self {
            cache,
            page: Arc::new(RwLock::new(Arc::new(page))),
            config,
        }
    }

    fn page(&self) -> Arc<PageSettings> {
        Arc::clone(&self.page.read())
    }
}

/// Reads the settings file named by `config`, applying the environment's
/// API key if one is set.
pub fn load_settings(config: &Config) -> Result<SettingsFile, SettingsError> {
    SettingsFile::load(&config.settings_path)
        .map(|file| file.with_api_key(config.weather_api_key.clone()))
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/", get(index))
        .route("/api/weather", get(weather_api))
        .route("/api/weather/status", get(weather_status))
        .route("/api/settings", get(api_settings))
        .route("/api/apps", get(api_apps))
        .route("/api/links", get(api_links))
        .route("/api/socials", get(api_socials))
        .route("/run/:app_name", post(run_app))
        .route("/reload_settings", post(reload_settings))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(CorsLayer::very_permissive()),
        )
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let weather = state.cache.get().await;
    Html(HomeTemplate::page(&state.page(), &weather))
}

async fn weather_api(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.get().await)
}

async fn weather_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.status())
}

async fn api_settings(State(state): State<AppState>) -> impl IntoResponse {
    let page = state.page();
    let weather = state.cache.settings();

    Json(PublicSettings {
        title: page.title.clone(),
        latitude: weather.latitude,
        longitude: weather.longitude,
        units: weather.units,
        refresh_interval_seconds: weather.refresh_interval_secs,
        request_timeout_seconds: weather.request_timeout_secs,
        retry_policy: weather.retry_policy,
        weather_configured: weather.is_configured(),
    })
}

async fn api_apps(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.page().apps.clone())
}

async fn api_links(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.page().links.clone())
}

async fn api_socials(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.page().socials.clone())
}

async fn run_app(
    Path(app_name): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let page = state.page();
    let Some(program) = page.apps.get(&app_name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "App not found" })),
        );
    };

    match tokio::process::Command::new(program).spawn() {
        Ok(_) => {
            info!("🚀 Launched {}", app_name);
            (StatusCode::OK, Json(json!({ "status": "ok" })))
        }
        Err(e) => {
            warn!("❌ Failed to launch {}: {}", app_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn reload_settings(State(state): State<AppState>) -> impl IntoResponse {
    match load_settings(&state.config) {
        Ok(file) => {
            *state.page.write() = Arc::new(file.page);
            state.cache.reconfigure(file.weather);
            info!("🔄 Settings reloaded from {}", state.config.settings_path.display());
            (StatusCode::OK, Json(json!({ "status": "reloaded" })))
        }
        Err(e) => {
            warn!("❌ Settings reload failed, keeping current settings: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
