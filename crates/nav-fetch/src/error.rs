use thiserror::Error;

/// Fetch failures, split by whether trying again later can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport error, HTTP 5xx/429, or the poll budget ran out while the
    /// report was still being generated.
    #[error("retryable fetch failure: {0}")]
    Retryable(String),

    /// The report job failed upstream, or the body is not a valid report.
    #[error("fatal fetch failure: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Retryable(_))
    }

    pub fn message(&self) -> &str {
        match self {
            FetchError::Retryable(m) | FetchError::Fatal(m) => m,
        }
    }
}
