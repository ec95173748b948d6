pub mod error;
pub mod queue;
pub mod types;

pub use error::{JobQueueError, JobQueueResult};
pub use queue::{JobQueue, RedisJobQueue};
pub use types::JobHandler;
