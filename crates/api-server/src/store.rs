use std::collections::VecDeque;
use std::sync::Mutex;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use scheduler::{AgentRepository, BotRepository, SignalSink};
use signal_pipeline::{AgentConfig, Bot, BotMessage, BotStatus, Signal, SignalStatus};
use state_store::StateStore;
use uuid::Uuid;

const MAX_MESSAGES: usize = 500;
const MAX_SIGNALS: usize = 1000;

/// Process-lifetime bot table; wiped on restart. Only the cycle heartbeat
/// and circuit breaker state survive a restart, via `StateStore` — the bot
/// configs themselves are re-read from whatever created them (the API
/// caller) rather than reloaded from disk.
#[derive(Default)]
pub struct BotStore {
    bots: DashMap<Uuid, Bot>,
}

impl BotStore {
    pub fn insert(&self, bot: Bot) -> Bot {
        self.bots.insert(bot.id, bot.clone());
        bot
    }

    pub fn remove(&self, bot_id: Uuid) -> Option<Bot> {
        self.bots.remove(&bot_id).map(|(_, bot)| bot)
    }

    pub fn update(&self, bot_id: Uuid, f: impl FnOnce(&mut Bot)) -> Option<Bot> {
        let mut entry = self.bots.get_mut(&bot_id)?;
        f(&mut entry);
        Some(entry.clone())
    }

    pub fn get(&self, bot_id: Uuid) -> Option<Bot> {
        self.bots.get(&bot_id).map(|b| b.clone())
    }

    pub fn list(&self) -> Vec<Bot> {
        self.bots.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl BotRepository for BotStore {
    async fn get_bot(&self, bot_id: Uuid) -> Option<Bot> {
        self.get(bot_id)
    }

    async fn set_status(&self, bot_id: Uuid, status: BotStatus) {
        self.update(bot_id, |bot| bot.status = status);
    }

    async fn set_last_action(&self, bot_id: Uuid, message: String) {
        self.update(bot_id, |bot| {
            bot.last_action = Some(message);
            bot.last_action_at = Some(Utc::now());
        });
    }
}

/// One row per user; absent means the agent loop has never been
/// configured for that user. Holds a handle to the signal store so the
/// scheduler can enforce `maxDailyTrades` without widening `AgentRepository`
/// to know about signal storage itself.
#[derive(Default)]
pub struct AgentStore {
    configs: DashMap<String, AgentConfig>,
    signals: Option<Arc<SignalStore>>,
}

impl AgentStore {
    pub fn new(signals: Arc<SignalStore>) -> Self {
        Self {
            configs: DashMap::new(),
            signals: Some(signals),
        }
    }

    pub fn set(&self, user_id: impl Into<String>, config: AgentConfig) {
        self.configs.insert(user_id.into(), config);
    }

    pub fn get(&self, user_id: &str) -> Option<AgentConfig> {
        self.configs.get(user_id).map(|c| c.clone())
    }
}

#[async_trait]
impl AgentRepository for AgentStore {
    async fn get_config(&self, user_id: &str) -> Option<AgentConfig> {
        self.get(user_id)
    }

    async fn count_signals_today(&self, user_id: &str) -> u32 {
        self.signals
            .as_ref()
            .map(|signals| signals.count_today(user_id, None) as u32)
            .unwrap_or(0)
    }
}

/// Newest-first, capped ring of bot messages, mirroring the `/bots/messages`
/// "recent, paged, newest first" contract.
#[derive(Default)]
pub struct MessageStore {
    messages: Mutex<VecDeque<BotMessage>>,
}

impl MessageStore {
    pub fn push_many(&self, incoming: Vec<BotMessage>) {
        let mut messages = self.messages.lock().expect("message store mutex poisoned");
        for message in incoming {
            messages.push_front(message);
        }
        while messages.len() > MAX_MESSAGES {
            messages.pop_back();
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<BotMessage> {
        let messages = self.messages.lock().expect("message store mutex poisoned");
        messages.iter().take(limit).cloned().collect()
    }
}

/// Newest-first, capped ring of persisted signals, standing in for the
/// signals table the spec describes (unique index on `(userId, symbol,
/// signalType, status)` is approximated by `SignalDedup` upstream; this
/// store only needs to answer reads and execute/reject transitions).
#[derive(Default)]
pub struct SignalStore {
    signals: Mutex<VecDeque<Signal>>,
}

impl SignalStore {
    pub fn push_many(&self, incoming: Vec<Signal>) {
        let mut signals = self.signals.lock().expect("signal store mutex poisoned");
        for signal in incoming {
            signals.push_front(signal);
        }
        while signals.len() > MAX_SIGNALS {
            signals.pop_back();
        }
    }

    pub fn list(&self, status: Option<SignalStatus>, limit: usize) -> Vec<Signal> {
        let signals = self.signals.lock().expect("signal store mutex poisoned");
        signals
            .iter()
            .filter(|s| status.map(|want| s.status == want).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Signal> {
        let signals = self.signals.lock().expect("signal store mutex poisoned");
        signals.iter().find(|s| s.id == id).cloned()
    }

    /// Applies `f` to the signal if present and returns the updated copy.
    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut Signal)) -> Option<Signal> {
        let mut signals = self.signals.lock().expect("signal store mutex poisoned");
        let signal = signals.iter_mut().find(|s| s.id == id)?;
        f(signal);
        Some(signal.clone())
    }

    pub fn count_today(&self, user_id: &str, status: Option<SignalStatus>) -> usize {
        let today = Utc::now().date_naive();
        let signals = self.signals.lock().expect("signal store mutex poisoned");
        signals
            .iter()
            .filter(|s| s.user_id == user_id && s.created_at.date_naive() == today)
            .filter(|s| status.map(|want| s.status == want).unwrap_or(true))
            .count()
    }
}

/// Fans every completed cycle's output into the signal and message stores,
/// so `/agent/signals` and `/bots/messages` stay current without the
/// scheduler needing to know either store's shape. Also writes the
/// `bot_cycle_state`/`signal_audit` rows through `StateStore`, so a restart
/// can show when a bot last ran without replaying the whole cycle history.
pub struct CycleSink {
    pub signals: Arc<SignalStore>,
    pub messages: Arc<MessageStore>,
    pub state_store: Arc<StateStore>,
}

#[async_trait]
impl SignalSink for CycleSink {
    async fn record(
        &self,
        bot_id: Option<Uuid>,
        duration_ms: u64,
        signals: Vec<Signal>,
        messages: Vec<BotMessage>,
    ) {
        if let Some(bot_id) = bot_id {
            self.state_store.record_bot_cycle(bot_id, duration_ms).await;
        }
        for signal in &signals {
            self.state_store.record_signal_audit(signal).await;
        }
        if !signals.is_empty() {
            self.signals.push_many(signals);
        }
        if !messages.is_empty() {
            self.messages.push_many(messages);
        }
    }
}
