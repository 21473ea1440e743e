//! Weather fetch failures.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Weather is not configured: {0}")]
    Configuration(String),

    #[error("Provider rejected the API key")]
    Unauthorized,

    #[error("Provider rate limit reached")]
    RateLimited,

    #[error("Provider has no data for this location")]
    NotFound,

    #[error("Weather request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Fieldless mirror of [`FetchError`] for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Configuration,
    Unauthorized,
    RateLimited,
    NotFound,
    Timeout,
    Transport,
    MalformedResponse,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Configuration(_) => FetchErrorKind::Configuration,
            Self::Unauthorized => FetchErrorKind::Unauthorized,
            Self::RateLimited => FetchErrorKind::RateLimited,
            Self::NotFound => FetchErrorKind::NotFound,
            Self::Timeout => FetchErrorKind::Timeout,
            Self::Transport(_) => FetchErrorKind::Transport,
            Self::MalformedResponse(_) => FetchErrorKind::MalformedResponse,
        }
    }

    /// Configuration failures wait for a settings reload; everything else
    /// is retried on the normal refresh schedule.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
