use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoreError>;

/// Failures talking to the scores backend.
///
/// Everything except [`ScoreError::Aborted`] is a network failure that the
/// board surfaces; aborted requests are dropped silently.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid prediction: {0}")]
    InvalidPrediction(String),

    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    #[error("Request superseded or cancelled")]
    Aborted,
}

impl ScoreError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ScoreError::Aborted)
    }
}
