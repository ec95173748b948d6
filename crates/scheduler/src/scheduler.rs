use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use portfolio_client::PortfolioClient;
use signal_pipeline::{BotStatus, CycleSubject, SignalPipeline};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::repository::{AgentRepository, BotRepository, SignalSink};

const AGENT_INITIAL_DELAY: Duration = Duration::from_secs(20);
const MARKET_SCAN_INITIAL_DELAY: Duration = Duration::from_secs(30);
const STAGGER_UNIT: Duration = Duration::from_secs(30);
const STAGGER_BASE: Duration = Duration::from_secs(10);
const MAX_ERROR_LEN: usize = 200;

struct TimerHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TimerHandle {
    fn stop(self) {
        let _ = self.stop.send(true);
        self.join.abort();
    }
}

/// Drives recurring cycles for bots, per-user agents, and the singleton
/// market scan, honoring the global concurrency cap, per-bot stagger, and
/// in-flight dedup. Cheaply cloneable (wraps an `Arc<Inner>`) the way the
/// donor's long-lived singletons (orchestrator, risk manager) are shared
/// across the axum router and its background tasks.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    pipeline: Arc<SignalPipeline>,
    bots: Arc<dyn BotRepository>,
    agents: Arc<dyn AgentRepository>,
    sink: Arc<dyn SignalSink>,
    portfolio: Arc<dyn PortfolioClient>,
    max_concurrent_bots: usize,
    tick_interval_ms: AtomicU64,
    market_scan_interval_ms: AtomicU64,
    bot_timers: DashMap<Uuid, TimerHandle>,
    bot_order: AsyncMutex<VecDeque<Uuid>>,
    bot_in_flight: DashSet<Uuid>,
    agent_timers: DashMap<String, TimerHandle>,
    market_scan: AsyncMutex<Option<TimerHandle>>,
    market_scan_running: DashSet<()>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<SignalPipeline>,
        bots: Arc<dyn BotRepository>,
        agents: Arc<dyn AgentRepository>,
        sink: Arc<dyn SignalSink>,
        portfolio: Arc<dyn PortfolioClient>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                bots,
                agents,
                sink,
                portfolio,
                max_concurrent_bots: config.max_concurrent_bots,
                tick_interval_ms: AtomicU64::new(config.tick_interval.as_millis() as u64),
                market_scan_interval_ms: AtomicU64::new(config.market_scan_interval.as_millis() as u64),
                bot_timers: DashMap::new(),
                bot_order: AsyncMutex::new(VecDeque::new()),
                bot_in_flight: DashSet::new(),
                agent_timers: DashMap::new(),
                market_scan: AsyncMutex::new(None),
                market_scan_running: DashSet::new(),
            }),
        }
    }

    /// Registers `bot_id` as running. No-op if already registered. At
    /// capacity, the oldest registration is stopped first. Schedules the
    /// first cycle after `rank * 30s + 10s` (rank = live count just before
    /// this bot is inserted), then a recurring timer at the current tick
    /// interval.
    pub async fn start_bot(&self, bot_id: Uuid, user_id: String) {
        if self.inner.bot_timers.contains_key(&bot_id) {
            return;
        }

        let rank = {
            let mut order = self.inner.bot_order.lock().await;
            if order.len() >= self.inner.max_concurrent_bots {
                if let Some(oldest) = order.pop_front() {
                    drop(order);
                    self.stop_bot(oldest).await;
                    order = self.inner.bot_order.lock().await;
                }
            }
            let rank = order.len();
            order.push_back(bot_id);
            rank
        };

        let stagger = STAGGER_BASE + STAGGER_UNIT * rank as u32;
        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            tokio::time::sleep(stagger).await;
            bot_loop(inner, bot_id, user_id, stop_rx).await;
        });

        self.inner
            .bot_timers
            .insert(bot_id, TimerHandle { stop: stop_tx, join });
    }

    /// Cancels the bot's timer and drops it from the in-flight set. Does
    /// not interrupt a cycle already running — that cycle runs to
    /// completion on its own detached task.
    pub async fn stop_bot(&self, bot_id: Uuid) {
        if let Some((_, handle)) = self.inner.bot_timers.remove(&bot_id) {
            handle.stop();
        }
        self.inner.bot_in_flight.remove(&bot_id);
        let mut order = self.inner.bot_order.lock().await;
        order.retain(|id| *id != bot_id);
    }

    pub async fn start_agent(&self, user_id: String) {
        if self.inner.agent_timers.contains_key(&user_id) {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let signal_interval = Duration::from_millis(
            std::env::var("SIGNAL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300_000),
        );
        let uid = user_id.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(AGENT_INITIAL_DELAY).await;
            agent_loop(inner, uid, signal_interval, stop_rx).await;
        });

        self.inner
            .agent_timers
            .insert(user_id, TimerHandle { stop: stop_tx, join });
    }

    pub fn stop_agent(&self, user_id: &str) {
        if let Some((_, handle)) = self.inner.agent_timers.remove(user_id) {
            handle.stop();
        }
    }

    /// Singleton per process. A second call while one is already scheduled
    /// is a no-op; the caller observes whatever the running scan last
    /// completed.
    pub async fn start_market_scan(&self) {
        let mut slot = self.inner.market_scan.lock().await;
        if slot.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            tokio::time::sleep(MARKET_SCAN_INITIAL_DELAY).await;
            market_scan_loop(inner, stop_rx).await;
        });

        *slot = Some(TimerHandle { stop: stop_tx, join });
    }

    pub async fn stop_all(&self) {
        for entry in self.inner.bot_timers.iter() {
            let _ = entry.value().stop.send(true);
            entry.value().join.abort();
        }
        self.inner.bot_timers.clear();
        self.inner.bot_in_flight.clear();
        self.inner.bot_order.lock().await.clear();

        for entry in self.inner.agent_timers.iter() {
            let _ = entry.value().stop.send(true);
            entry.value().join.abort();
        }
        self.inner.agent_timers.clear();

        if let Some(handle) = self.inner.market_scan.lock().await.take() {
            handle.stop();
        }
    }

    /// Rebinds every live bot timer to the new cadence without losing
    /// dedup state (in-flight set and registration order are untouched).
    pub fn set_tick_interval(&self, millis: u64) {
        self.inner.tick_interval_ms.store(millis, Ordering::Relaxed);
    }

    pub fn set_market_scan_interval(&self, millis: u64) {
        self.inner
            .market_scan_interval_ms
            .store(millis, Ordering::Relaxed);
    }

    pub fn is_bot_running(&self, bot_id: Uuid) -> bool {
        self.inner.bot_timers.contains_key(&bot_id)
    }

    pub fn running_bot_count(&self) -> usize {
        self.inner.bot_timers.len()
    }
}

/// Truncates a `Display`able error to the ≤200-char budget `lastAction`
/// carries, so one verbose error can't crowd out the bot's status history.
fn truncate_error(message: impl std::fmt::Display) -> String {
    let full = message.to_string();
    if full.len() <= MAX_ERROR_LEN {
        full
    } else {
        full.chars().take(MAX_ERROR_LEN).collect()
    }
}

async fn bot_loop(
    inner: Arc<Inner>,
    bot_id: Uuid,
    user_id: String,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let interval = Duration::from_millis(inner.tick_interval_ms.load(Ordering::Relaxed));
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    return;
                }
            }
        }
        if *stop_rx.borrow() {
            return;
        }

        // Non-reentrancy: a prior cycle still running skips this fire
        // silently rather than queueing.
        if !inner.bot_in_flight.insert(bot_id) {
            continue;
        }
        let cycle_result = run_bot_cycle(&inner, bot_id, &user_id).await;
        inner.bot_in_flight.remove(&bot_id);

        match cycle_result {
            CycleOutcome::Continue => {}
            CycleOutcome::SelfCancel => {
                inner.bot_timers.remove(&bot_id);
                let mut order = inner.bot_order.lock().await;
                order.retain(|id| *id != bot_id);
                return;
            }
        }
    }
}

enum CycleOutcome {
    Continue,
    SelfCancel,
}

async fn run_bot_cycle(inner: &Arc<Inner>, bot_id: Uuid, _user_id: &str) -> CycleOutcome {
    let bot = match inner.bots.get_bot(bot_id).await {
        Some(bot) if bot.status == BotStatus::Running => bot,
        Some(_) => {
            tracing::info!(%bot_id, "bot no longer running, cancelling its timer");
            return CycleOutcome::SelfCancel;
        }
        None => {
            tracing::warn!(%bot_id, "bot missing from store, cancelling its timer");
            return CycleOutcome::SelfCancel;
        }
    };

    let pipeline = Arc::clone(&inner.pipeline);
    let handle = tokio::spawn(async move { pipeline.run_cycle(CycleSubject::Bot(bot)).await });

    match handle.await {
        Ok(report) => {
            if let Some(last) = report.messages.last() {
                inner
                    .bots
                    .set_last_action(bot_id, truncate_error(&last.content))
                    .await;
            }
            let auto_paused = report.auto_paused;
            let duration_ms = report.telemetry.duration_ms;
            inner
                .sink
                .record(Some(bot_id), duration_ms, report.signals, report.messages)
                .await;
            if auto_paused {
                tracing::warn!(%bot_id, "strategy auto-paused, cancelling its timer");
                inner.bots.set_status(bot_id, BotStatus::Idle).await;
                return CycleOutcome::SelfCancel;
            }
        }
        Err(join_error) => {
            tracing::error!(%bot_id, %join_error, "bot cycle panicked");
            inner
                .bots
                .set_last_action(bot_id, truncate_error(format!("cycle error: {join_error}")))
                .await;
        }
    }
    CycleOutcome::Continue
}

async fn agent_loop(
    inner: Arc<Inner>,
    user_id: String,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    return;
                }
            }
        }
        if *stop_rx.borrow() {
            return;
        }

        let config = match inner.agents.get_config(&user_id).await {
            Some(config) if config.is_active => config,
            _ => continue,
        };

        let today_signal_count = inner.agents.count_signals_today(&user_id).await;
        if today_signal_count >= config.max_daily_trades {
            continue;
        }

        let open_position_symbols = inner
            .portfolio
            .list_positions()
            .await
            .map(|positions| positions.into_iter().map(|p| p.symbol).collect())
            .unwrap_or_default();

        let subject = CycleSubject::Agent {
            user_id: user_id.clone(),
            config,
            open_position_symbols,
        };
        let pipeline = Arc::clone(&inner.pipeline);
        if let Ok(report) = tokio::spawn(async move { pipeline.run_cycle(subject).await }).await {
            let duration_ms = report.telemetry.duration_ms;
            inner
                .sink
                .record(None, duration_ms, report.signals, report.messages)
                .await;
        }
    }
}

async fn market_scan_loop(inner: Arc<Inner>, mut stop_rx: watch::Receiver<bool>) {
    loop {
        let interval = Duration::from_millis(inner.market_scan_interval_ms.load(Ordering::Relaxed));
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    return;
                }
            }
        }
        if *stop_rx.borrow() {
            return;
        }

        // Singleton dedup: an overlapping fire (scan still running past
        // its own interval) is skipped; the next caller sees the last
        // completed report via whatever read path exposes it.
        if !inner.market_scan_running.insert(()) {
            continue;
        }
        let pipeline = Arc::clone(&inner.pipeline);
        if let Ok(report) =
            tokio::spawn(async move { pipeline.run_cycle(CycleSubject::MarketScan).await }).await
        {
            let duration_ms = report.telemetry.duration_ms;
            inner
                .sink
                .record(None, duration_ms, report.signals, report.messages)
                .await;
        }
        inner.market_scan_running.remove(&());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use dashmap::DashMap;
    use indicator_engine::{ScanResponse, StubIndicatorEngine};
    use llm_client::StubLlmClient;
    use market_data::{MarketDataConfig, MarketDataStack};
    use portfolio_client::SimulatedPortfolioClient;
    use signal_pipeline::{
        AgentConfig, Bot, BotMessage, PipelineDeps, Role, RollingAccuracyTracker, SignalDedup,
    };

    use super::*;

    struct TestBots(DashMap<Uuid, Bot>);

    #[async_trait]
    impl BotRepository for TestBots {
        async fn get_bot(&self, bot_id: Uuid) -> Option<Bot> {
            self.0.get(&bot_id).map(|b| b.clone())
        }
        async fn set_status(&self, bot_id: Uuid, status: BotStatus) {
            if let Some(mut bot) = self.0.get_mut(&bot_id) {
                bot.status = status;
            }
        }
        async fn set_last_action(&self, bot_id: Uuid, message: String) {
            if let Some(mut bot) = self.0.get_mut(&bot_id) {
                bot.last_action = Some(message);
            }
        }
    }

    struct NoAgents;
    #[async_trait]
    impl AgentRepository for NoAgents {
        async fn get_config(&self, _user_id: &str) -> Option<AgentConfig> {
            None
        }
        async fn count_signals_today(&self, _user_id: &str) -> u32 {
            0
        }
    }

    struct DiscardSink;
    #[async_trait]
    impl SignalSink for DiscardSink {
        async fn record(
            &self,
            _bot_id: Option<Uuid>,
            _duration_ms: u64,
            _signals: Vec<signal_pipeline::Signal>,
            _messages: Vec<BotMessage>,
        ) {
        }
    }

    fn test_bot(name: &str) -> Bot {
        Bot {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            name: name.to_string(),
            role: Role::Scanner,
            status: BotStatus::Running,
            assigned_symbols: vec!["RELIANCE".to_string()],
            assigned_strategy: "momentum".to_string(),
            max_capital: 100_000.0,
            used_capital: 0.0,
            total_trades: 0,
            total_pnl: 0.0,
            win_rate: 0.0,
            last_action: None,
            last_action_at: None,
        }
    }

    fn test_scheduler(bots: Arc<TestBots>, config: SchedulerConfig) -> Scheduler {
        let deps = PipelineDeps {
            engine: Arc::new(StubIndicatorEngine::new(true, ScanResponse::default())),
            llm: Arc::new(StubLlmClient::approve_all()),
            data: Arc::new(MarketDataStack::new(MarketDataConfig::from_env())),
            portfolio: Arc::new(SimulatedPortfolioClient::default()),
            rolling_accuracy: Arc::new(RollingAccuracyTracker::default()),
            dedup: Arc::new(SignalDedup::default()),
        };
        let pipeline = Arc::new(SignalPipeline::new(deps));
        Scheduler::new(
            pipeline,
            bots,
            Arc::new(NoAgents),
            Arc::new(DiscardSink),
            Arc::new(SimulatedPortfolioClient::default()),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_start_evicts_the_oldest_and_caps_at_three() {
        let store = Arc::new(TestBots(DashMap::new()));
        let bots = [
            test_bot("a"),
            test_bot("b"),
            test_bot("c"),
            test_bot("d"),
        ];
        for bot in &bots {
            store.0.insert(bot.id, bot.clone());
        }

        let scheduler = test_scheduler(
            Arc::clone(&store),
            SchedulerConfig {
                tick_interval: Duration::from_secs(180),
                signal_interval: Duration::from_secs(300),
                market_scan_interval: Duration::from_secs(600),
                max_concurrent_bots: 3,
            },
        );

        for bot in &bots {
            scheduler.start_bot(bot.id, "user-1".to_string()).await;
        }
        tokio::task::yield_now().await;

        assert_eq!(scheduler.running_bot_count(), 3);
        assert!(!scheduler.is_bot_running(bots[0].id));
        assert!(scheduler.is_bot_running(bots[1].id));
        assert!(scheduler.is_bot_running(bots[2].id));
        assert!(scheduler.is_bot_running(bots[3].id));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_bot_cancels_the_timer() {
        let store = Arc::new(TestBots(DashMap::new()));
        let bot = test_bot("solo");
        store.0.insert(bot.id, bot.clone());

        let scheduler = test_scheduler(Arc::clone(&store), SchedulerConfig::default());
        scheduler.start_bot(bot.id, "user-1".to_string()).await;
        assert!(scheduler.is_bot_running(bot.id));

        scheduler.stop_bot(bot.id).await;
        assert!(!scheduler.is_bot_running(bot.id));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_bot_self_cancels_on_first_cycle() {
        let store = Arc::new(TestBots(DashMap::new()));
        let scheduler = test_scheduler(
            Arc::clone(&store),
            SchedulerConfig {
                tick_interval: Duration::from_millis(10),
                signal_interval: Duration::from_secs(300),
                market_scan_interval: Duration::from_secs(600),
                max_concurrent_bots: 3,
            },
        );
        let ghost_id = Uuid::new_v4();
        scheduler.start_bot(ghost_id, "user-1".to_string()).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;

        assert!(!scheduler.is_bot_running(ghost_id));
    }

    struct CappedAgents {
        config: AgentConfig,
        today_count: u32,
    }

    #[async_trait]
    impl AgentRepository for CappedAgents {
        async fn get_config(&self, _user_id: &str) -> Option<AgentConfig> {
            Some(self.config.clone())
        }
        async fn count_signals_today(&self, _user_id: &str) -> u32 {
            self.today_count
        }
    }

    struct CountingSink(Arc<std::sync::atomic::AtomicUsize>);
    #[async_trait]
    impl SignalSink for CountingSink {
        async fn record(
            &self,
            _bot_id: Option<Uuid>,
            _duration_ms: u64,
            _signals: Vec<signal_pipeline::Signal>,
            _messages: Vec<BotMessage>,
        ) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn agent_cycle_yields_nothing_once_daily_cap_is_reached() {
        let deps = PipelineDeps {
            engine: Arc::new(StubIndicatorEngine::new(true, ScanResponse::default())),
            llm: Arc::new(StubLlmClient::approve_all()),
            data: Arc::new(MarketDataStack::new(MarketDataConfig::from_env())),
            portfolio: Arc::new(SimulatedPortfolioClient::default()),
            rolling_accuracy: Arc::new(RollingAccuracyTracker::default()),
            dedup: Arc::new(SignalDedup::default()),
        };
        let pipeline = Arc::new(SignalPipeline::new(deps));
        let cycles_run = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let agents = Arc::new(CappedAgents {
            config: AgentConfig {
                mode: signal_pipeline::AgentMode::Autonomous,
                is_active: true,
                min_signal_score: 0.5,
                max_daily_trades: 3,
            },
            today_count: 3,
        });

        let scheduler = Scheduler::new(
            pipeline,
            Arc::new(TestBots(DashMap::new())),
            agents,
            Arc::new(CountingSink(Arc::clone(&cycles_run))),
            Arc::new(SimulatedPortfolioClient::default()),
            SchedulerConfig {
                tick_interval: Duration::from_secs(180),
                signal_interval: Duration::from_millis(10),
                market_scan_interval: Duration::from_secs(600),
                max_concurrent_bots: 3,
            },
        );

        scheduler.start_agent("user-1".to_string()).await;
        tokio::time::advance(AGENT_INITIAL_DELAY + Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        assert_eq!(cycles_run.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
