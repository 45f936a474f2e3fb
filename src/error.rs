use std::result::Result as StdResult;
use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum Error {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("API invalid format: {0}")]
    ApiInvalidFormat(String),
    #[error("API connection failed: {0}")]
    ApiConnectionFailed(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Order rejected: {0}")]
    OrderRejected(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Poller error: {0}")]
    PollerError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ApiInvalidFormat(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

impl Error {
    /// True for errors raised locally before anything touched the network.
    pub fn is_local(&self) -> bool {
        matches!(self, Error::ValidationError(_) | Error::ConfigError(_))
    }
}

pub type Result<T> = StdResult<T, Error>;
