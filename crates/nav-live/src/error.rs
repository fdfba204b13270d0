use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveError {
    #[error("live session transport error: {0}")]
    Transport(String),

    #[error("live session http status {0}")]
    Status(u16),

    #[error("live session malformed response: {0}")]
    Malformed(String),
}
