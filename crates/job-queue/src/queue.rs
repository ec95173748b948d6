use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::error::JobQueueResult;
use crate::types::JobHandler;

const WORKER_IDLE_BACKOFF: Duration = Duration::from_secs(5);
const WORKER_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Thin typed wrapper around a single Redis-backed list per queue name,
/// matching the `llm-client`/`indicator-engine` split between a trait and
/// its one real out-of-process implementation. Every operation is
/// best-effort: a connection problem is logged and the caller proceeds as
/// if the queue were simply absent, never blocking on Redis coming back.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Pushes one job onto `queue`.
    async fn add_job(&self, queue: &str, payload: serde_json::Value);

    /// Pushes a job onto `queue` now, then again every `every` thereafter,
    /// from a detached task that outlives this call.
    async fn add_repeating_job(&self, queue: &str, payload: serde_json::Value, every: Duration);

    /// Spawns a detached task that pops jobs off `queue` and runs `handler`
    /// on each. Idles between polls when the queue is empty rather than
    /// busy-looping.
    async fn start_worker(&self, queue: &str, handler: JobHandler);
}

/// `redis::aio::ConnectionManager` already reconnects automatically and is
/// cheap to clone (it shares its connection internally), so every spawned
/// task below clones its own handle instead of contending on one lock for
/// the lifetime of the process.
pub struct RedisJobQueue {
    manager: Mutex<ConnectionManager>,
}

impl RedisJobQueue {
    pub async fn connect(redis_url: &str) -> JobQueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self {
            manager: Mutex::new(manager),
        })
    }

    async fn manager_handle(&self) -> ConnectionManager {
        self.manager.lock().await.clone()
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn add_job(&self, queue: &str, payload: serde_json::Value) {
        let mut manager = self.manager_handle().await;
        let result: redis::RedisResult<()> = manager.lpush(queue, payload.to_string()).await;
        if let Err(err) = result {
            tracing::warn!(queue, %err, "job queue add_job failed, continuing without it");
        }
    }

    async fn add_repeating_job(&self, queue: &str, payload: serde_json::Value, every: Duration) {
        let mut manager = self.manager_handle().await;
        let queue = queue.to_string();
        tokio::spawn(async move {
            loop {
                let result: redis::RedisResult<()> = manager.lpush(&queue, payload.to_string()).await;
                if let Err(err) = result {
                    tracing::warn!(queue = %queue, %err, "repeating job enqueue failed, continuing without it");
                }
                tokio::time::sleep(every).await;
            }
        });
    }

    async fn start_worker(&self, queue: &str, handler: JobHandler) {
        let mut manager = self.manager_handle().await;
        let queue = queue.to_string();
        tokio::spawn(async move {
            loop {
                let popped: redis::RedisResult<Option<String>> = manager.rpop(&queue, None).await;
                match popped {
                    Ok(Some(raw)) => match serde_json::from_str::<serde_json::Value>(&raw) {
                        Ok(value) => handler(value).await,
                        Err(err) => tracing::warn!(queue = %queue, %err, "job payload was not valid JSON, dropping"),
                    },
                    Ok(None) => tokio::time::sleep(WORKER_IDLE_BACKOFF).await,
                    Err(err) => {
                        tracing::warn!(queue = %queue, %err, "job worker poll failed, backing off");
                        tokio::time::sleep(WORKER_ERROR_BACKOFF).await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    // Requires a local Redis instance; run with `REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn add_job_is_picked_up_by_a_started_worker() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let queue = RedisJobQueue::connect(&url).await.expect("redis reachable");

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let handler: JobHandler = Arc::new(move |_payload| {
            let seen = Arc::clone(&seen_clone);
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        });

        queue.start_worker("job-queue-test", handler).await;
        queue.add_job("job-queue-test", serde_json::json!({"kind": "test"})).await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(seen.load(Ordering::SeqCst) >= 1);
    }
}
