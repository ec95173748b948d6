use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("redis connection failed: {0}")]
    Connection(#[from] redis::RedisError),
}

pub type JobQueueResult<T> = Result<T, JobQueueError>;
