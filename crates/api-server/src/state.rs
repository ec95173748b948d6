use std::sync::Arc;
use std::time::{Duration, Instant};

use indicator_engine::{IndicatorEngine, ProcessIndicatorEngine};
use job_queue::{JobQueue, RedisJobQueue};
use llm_client::{HttpLlmClient, LlmProvider};
use market_data::{MarketDataConfig, MarketDataStack};
use portfolio_client::{PortfolioClient, SimulatedPortfolioClient};
use scheduler::{Scheduler, SchedulerConfig};
use signal_pipeline::{PipelineDeps, RollingAccuracyTracker, SignalDedup, SignalPipeline};
use state_store::StateStore;
use tokio::sync::Mutex as AsyncMutex;

use crate::store::{AgentStore, BotStore, CycleSink, MessageStore, SignalStore};

/// Pre-market briefing cache. Refreshed every 10 min during market hours,
/// 30 min otherwise; both freshness windows are enforced by the caller
/// re-checking `fetched_at` against whichever window currently applies.
pub struct BriefingCache {
    pub text: String,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
}

/// Everything a handler needs, built once at startup and shared behind
/// `Arc` the way the donor's `AppState` bundles its orchestrator/broker/
/// notification collaborators.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub bots: Arc<BotStore>,
    pub agents: Arc<AgentStore>,
    pub messages: Arc<MessageStore>,
    pub signals: Arc<SignalStore>,
    pub pipeline: Arc<SignalPipeline>,
    pub portfolio: Arc<dyn PortfolioClient>,
    pub data: Arc<MarketDataStack>,
    pub engine: Arc<dyn IndicatorEngine>,
    pub llm: Arc<dyn LlmProvider>,
    pub started_at: Instant,
    pub briefing: Arc<AsyncMutex<Option<BriefingCache>>>,
    pub state_store: Arc<StateStore>,
    pub jobs: Option<Arc<dyn JobQueue>>,
}

fn env_duration_ms(key: &str, default: u64) -> Duration {
    Duration::from_millis(
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppState {
    /// Builds the full production-shaped dependency graph from the
    /// environment knobs §6 defines. Used both by this crate's standalone
    /// binary and by the `paper-trader` process, which injects the same
    /// state into the scheduler's bot/agent loops.
    pub async fn from_env() -> Self {
        let data = Arc::new(MarketDataStack::new(MarketDataConfig::from_env()));

        let engine: Arc<dyn IndicatorEngine> = Arc::new(ProcessIndicatorEngine::new(
            std::env::var("NATIVE_ENGINE_PATH").unwrap_or_else(|_| "./indicator-engine-bin".into()),
            env_duration_ms("ENGINE_TIMEOUT_MS", 30_000),
            env_usize("ENGINE_MAX_INPUT_BYTES", 2 * 1024 * 1024),
            env_usize("ENGINE_MAX_CONCURRENT", 2),
        ));

        let llm: Arc<dyn LlmProvider> = Arc::new(HttpLlmClient::new(
            std::env::var("LLM_API_URL").unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".into()),
            std::env::var("LLM_API_KEY").unwrap_or_default(),
            std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            Duration::from_secs(20),
            env_usize("LLM_CIRCUIT_FAILURE_THRESHOLD", 5) as u32,
            env_duration_ms("LLM_CIRCUIT_COOLDOWN_MS", 60_000),
        ));

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://paper_trader.db".into());
        let state_store = Arc::new(
            StateStore::connect(&database_url)
                .await
                .expect("state store must connect at startup"),
        );

        if let Ok(Some(snapshot)) = state_store.load_circuit_breaker().await {
            llm.restore_circuit(snapshot).await;
        }

        let jobs: Option<Arc<dyn JobQueue>> = match std::env::var("REDIS_URL") {
            Ok(redis_url) => match RedisJobQueue::connect(&redis_url).await {
                Ok(queue) => Some(Arc::new(queue) as Arc<dyn JobQueue>),
                Err(err) => {
                    tracing::warn!(%err, "redis job queue unavailable, continuing without it");
                    None
                }
            },
            Err(_) => None,
        };

        let portfolio: Arc<dyn PortfolioClient> = Arc::new(SimulatedPortfolioClient::default());

        let deps = PipelineDeps {
            engine: Arc::clone(&engine),
            llm: Arc::clone(&llm),
            data: Arc::clone(&data),
            portfolio: Arc::clone(&portfolio),
            rolling_accuracy: Arc::new(RollingAccuracyTracker::new(env_usize("ROLLING_WINDOW", 20))),
            dedup: Arc::new(SignalDedup::default()),
        };
        let pipeline = Arc::new(SignalPipeline::new(deps));

        let bots = Arc::new(BotStore::default());
        let messages = Arc::new(MessageStore::default());
        let signals = Arc::new(SignalStore::default());
        let agents = Arc::new(AgentStore::new(Arc::clone(&signals)));
        let sink = Arc::new(CycleSink {
            signals: Arc::clone(&signals),
            messages: Arc::clone(&messages),
            state_store: Arc::clone(&state_store),
        });

        let scheduler = Scheduler::new(
            Arc::clone(&pipeline),
            Arc::clone(&bots) as _,
            Arc::clone(&agents) as _,
            sink,
            Arc::clone(&portfolio),
            SchedulerConfig::from_env(),
        );

        Self {
            scheduler,
            bots,
            agents,
            messages,
            signals,
            pipeline,
            portfolio,
            data,
            engine,
            llm,
            started_at: Instant::now(),
            briefing: Arc::new(AsyncMutex::new(None)),
            state_store,
            jobs,
        }
    }
}
