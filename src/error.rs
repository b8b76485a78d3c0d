use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    /// Rejected locally before any request is issued.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Transport failure, non-success status, or a blocked response.
    #[error("network error: {0}")]
    Network(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid configuration:\n  - {0}")]
    Config(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn network<T: Into<String>>(msg: T) -> Self {
        AppError::Network(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

/// Failures while turning a wire payload into samples or bars.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("malformed realtime payload: {0}")]
    MalformedRealtime(String),
    #[error("invalid quote timestamp `{0}`")]
    InvalidTimestamp(String),
    #[error("malformed historical payload: {0}")]
    MalformedHistorical(String),
    #[error("historical payload missing field `{0}`")]
    MissingField(String),
    #[error("historical record {index} skipped: {reason}")]
    InvalidRecord { index: usize, reason: String },
}
