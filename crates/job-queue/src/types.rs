use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A worker callback: takes the job's JSON payload, returns a boxed future
/// so `RedisJobQueue::start_worker` stays object-safe while still letting
/// handlers await (fetching market data, writing a cache) inside.
pub type JobHandler = Arc<dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
