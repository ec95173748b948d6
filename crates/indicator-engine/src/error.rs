use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine binary not found or failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("engine call timed out after {0}ms")]
    Timeout(u64),

    #[error("engine returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("engine exited with non-zero status: {0}")]
    NonZeroExit(i32),

    #[error("engine reported failure: {0}")]
    EngineFailure(String),

    #[error("request payload exceeds {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("io error talking to engine: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
