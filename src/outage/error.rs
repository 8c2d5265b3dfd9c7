// src/outage/error.rs
use thiserror::Error;

/// Failure of one refresh attempt. Every variant is recoverable: the caller
/// keeps its last good result and tries again on the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timed out waiting for the outage page")]
    Timeout,

    #[error("outage page returned HTTP {0}")]
    HttpStatus(u16),

    #[error("error communicating with the outage page: {0}")]
    Communication(String),

    #[error("failed to parse the outage page: {0}")]
    ParseFailure(String),
}

impl FetchError {
    /// Short machine-readable name, used in API responses and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Communication(_) => "communication",
            FetchError::ParseFailure(_) => "parse_failure",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::Timeout;
        }
        if let Some(status) = e.status() {
            return FetchError::HttpStatus(status.as_u16());
        }
        FetchError::Communication(e.to_string())
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(e: tokio::task::JoinError) -> Self {
        FetchError::ParseFailure(format!("parse worker failed: {e}"))
    }
}
