//! Personal browser home page: a grid of links and apps plus a weather
//! panel backed by a single-entry, single-flight weather cache.

pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod settings;
pub mod templates;
pub mod weather;

pub use cache::WeatherCache;
pub use error::FetchError;
pub use settings::Settings;
pub use weather::{OpenWeatherMapFetcher, WeatherFetcher, WeatherSnapshot};
