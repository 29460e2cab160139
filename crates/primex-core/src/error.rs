//! Error types for PrimeX Core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    // API errors
    #[error("HTTP error {status} for {url}")]
    HttpStatus { status: reqwest::StatusCode, url: String },

    #[error("API reported failure for {endpoint}")]
    Api { endpoint: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Request timeout: {url}")]
    Timeout { url: String },

    // Resolution errors
    #[error("No streaming sources found for {episode_id}")]
    SourcesUnavailable { episode_id: String },

    #[error("Invalid source URL: {0}")]
    InvalidSourceUrl(String),

    // Playback errors
    #[error("HLS playback is not supported: {0}")]
    EngineUnsupported(String),

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Quality index {index} out of range ({available} sources)")]
    QualityOutOfRange { index: usize, available: usize },

    #[error("Session driver has shut down")]
    DriverClosed,

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Classify a transport error, keeping timeouts distinct
    pub fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout { url: url.to_string() }
        } else {
            Error::Network(err)
        }
    }

    /// Returns true if a fallback or retry may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::HttpStatus { .. }
                | Error::Api { .. }
                | Error::MalformedResponse(_)
                | Error::Timeout { .. }
                | Error::Network(_)
        )
    }

    /// Returns the error code for logs and UI
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::HttpStatus { .. } => "HTTP_STATUS",
            Error::Api { .. } => "API_FAILURE",
            Error::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Error::Timeout { .. } => "TIMEOUT",
            Error::SourcesUnavailable { .. } => "SOURCES_UNAVAILABLE",
            Error::InvalidSourceUrl(_) => "INVALID_SOURCE_URL",
            Error::EngineUnsupported(_) => "ENGINE_UNSUPPORTED",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::QualityOutOfRange { .. } => "QUALITY_OUT_OF_RANGE",
            Error::DriverClosed => "DRIVER_CLOSED",
            Error::Network(_) => "NETWORK",
            Error::Url(_) => "INVALID_URL",
            Error::Json(_) => "JSON",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Config(_) => "CONFIG",
        }
    }
}
