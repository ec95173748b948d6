use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("invalid or non-JSON response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type LlmResult<T> = Result<T, LlmError>;
