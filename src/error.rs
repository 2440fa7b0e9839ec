use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("invalid calendar date '{0}'")]
    InvalidDate(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl SyncError {
    /// User-displayable message, suitable for toast-style reporting.
    ///
    /// All remote failures are normalized to this single string; callers
    /// never need to branch on status codes or transport details.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether this error is a programmer-contract violation rather than a
    /// runtime/network condition. Contract errors should surface during
    /// development and must never be retried or silently defaulted.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, SyncError::InvalidDate(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
