use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenephenError {
    /// Network-level failure (connect, timeout, throttling, server error).
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// A response arrived but its content could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// Expected absence: no full text, no abstract, no decoder.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invariant violation on a data model or database.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("blocked by network policy: {0}")]
    Blocked(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenephenError {
    /// Only transport-level failures are worth another attempt. Throttling
    /// (429) and server errors (5xx) count as transport-level.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenephenError::Transport { .. } => true,
            GenephenError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        GenephenError::Transport { url: url.into(), message: message.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, GenephenError>;
