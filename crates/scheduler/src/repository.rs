use async_trait::async_trait;
use signal_pipeline::{AgentConfig, Bot, BotMessage, BotStatus, Signal};
use uuid::Uuid;

/// The bot table's mutable surface the scheduler needs: reload on every
/// tick (another caller may have stopped or reconfigured the bot since the
/// last cycle), and the two fields a cycle is allowed to write outside the
/// signal/message tables themselves.
#[async_trait]
pub trait BotRepository: Send + Sync {
    async fn get_bot(&self, bot_id: Uuid) -> Option<Bot>;
    async fn set_status(&self, bot_id: Uuid, status: BotStatus);
    async fn set_last_action(&self, bot_id: Uuid, message: String);
}

/// One row per user; `None` means the user has never configured the agent
/// loop and a `StartAgent` call should self-cancel on first tick.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn get_config(&self, user_id: &str) -> Option<AgentConfig>;

    /// Signals already persisted for this user since the start of the
    /// current trading day, used to enforce `maxDailyTrades`.
    async fn count_signals_today(&self, user_id: &str) -> u32;
}

/// Where a completed cycle's output lands. Every cycle subject (bot, agent,
/// market scan) funnels its `CycleReport`'s signals and messages through the
/// same sink, so the HTTP-facing signal/message stores stay current without
/// the scheduler itself knowing their storage shape. `bot_id`/`duration_ms`
/// ride alongside so a sink backed by local persistence can record the
/// per-bot cycle heartbeat without the scheduler knowing its table shape
/// either.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn record(
        &self,
        bot_id: Option<Uuid>,
        duration_ms: u64,
        signals: Vec<Signal>,
        messages: Vec<BotMessage>,
    );
}
