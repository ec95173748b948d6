use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataStackError {
    #[error("all provider tiers failed for {0}")]
    AllTiersFailed(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("upstream HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

pub type DataResult<T> = Result<T, DataStackError>;
