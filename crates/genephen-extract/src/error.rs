use genephen_common::GenephenError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
    #[error("Malformed extraction payload: {0}")]
    Payload(String),
    #[error("Invalid evidence: {0}")]
    Invalid(#[from] GenephenError),
}

impl From<ExtractionError> for GenephenError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Http(e) => GenephenError::Transport {
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                message: e.to_string(),
            },
            ExtractionError::Serde(e) => GenephenError::Parse(e.to_string()),
            ExtractionError::Payload(msg) => GenephenError::Parse(msg),
            ExtractionError::Invalid(inner) => inner,
            other @ ExtractionError::ApiError { .. } => GenephenError::Other(anyhow::Error::new(other)),
        }
    }
}
