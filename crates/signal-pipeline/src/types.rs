use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    Idle,
    Running,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub role: Role,
    pub status: BotStatus,
    pub assigned_symbols: Vec<String>,
    pub assigned_strategy: String,
    pub max_capital: f64,
    pub used_capital: f64,
    pub total_trades: u32,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub last_action: Option<String>,
    pub last_action_at: Option<DateTime<Utc>>,
}

impl Bot {
    /// `RELIANCE,TCS,INFY,HDFCBANK,ITC` when `assignedSymbols` is empty.
    pub fn symbols_or_default(&self) -> Vec<String> {
        if self.assigned_symbols.is_empty() {
            default_bot_symbols()
        } else {
            self.assigned_symbols.clone()
        }
    }
}

pub fn default_bot_symbols() -> Vec<String> {
    ["RELIANCE", "TCS", "INFY", "HDFCBANK", "ITC"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_agent_watchlist() -> Vec<String> {
    ["NIFTY 50", "RELIANCE", "TCS", "HDFCBANK", "GOLD", "USDINR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentMode {
    Advisory,
    Autonomous,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub mode: AgentMode,
    pub is_active: bool,
    pub min_signal_score: f64,
    pub max_daily_trades: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Pending,
    Executed,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeTag {
    Win,
    Loss,
    Breakeven,
}

/// The nine-slot G1..G9 score vector every persisted signal carries.
/// `source` is `"llm"` when the model supplied its own scores, `"derived"`
/// when the pipeline computed them deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateScores {
    pub g1_trend: u8,
    pub g2_momentum: u8,
    pub g3_volatility: u8,
    pub g4_volume: u8,
    pub g5_options_flow: u8,
    pub g6_global_macro: u8,
    pub g7_fii_dii: u8,
    pub g8_sentiment: u8,
    pub g9_risk: u8,
    pub source: String,
    #[serde(default)]
    pub indicators: Option<serde_json::Value>,
    #[serde(default)]
    pub votes: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub signal_type: SignalType,
    pub composite_score: f64,
    pub gate_scores: GateScores,
    pub rationale: String,
    pub status: SignalStatus,
    pub strategy_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub outcome_tag: Option<OutcomeTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Info,
    Signal,
    Alert,
    TradeRequest,
    Approval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotMessage {
    pub from_bot_id: Option<Uuid>,
    pub user_id: String,
    pub message_type: MessageType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl BotMessage {
    pub fn new(
        from_bot_id: Option<Uuid>,
        user_id: impl Into<String>,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            from_bot_id,
            user_id: user_id.into(),
            message_type,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// What triggered this cycle: a user bot, a per-user agent loop, or the
/// singleton market scan. Each selects its own symbol universe (stage 2).
#[derive(Debug, Clone)]
pub enum CycleSubject {
    Bot(Bot),
    Agent {
        user_id: String,
        config: AgentConfig,
        open_position_symbols: Vec<String>,
    },
    MarketScan,
}

impl CycleSubject {
    pub fn user_id(&self) -> &str {
        match self {
            CycleSubject::Bot(bot) => &bot.user_id,
            CycleSubject::Agent { user_id, .. } => user_id,
            CycleSubject::MarketScan => "system",
        }
    }

    pub fn bot_id(&self) -> Option<Uuid> {
        match self {
            CycleSubject::Bot(bot) => Some(bot.id),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            CycleSubject::Bot(bot) => Some(bot.role),
            _ => None,
        }
    }
}

/// Structured per-cycle summary logged via `tracing::info!`, distinct from
/// the single user-facing `BotMessage` the cycle also writes.
#[derive(Debug, Clone, Default)]
pub struct CycleTelemetry {
    pub symbols_scanned: usize,
    pub signals_generated: usize,
    pub signals_executed: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub signals: Vec<Signal>,
    pub messages: Vec<BotMessage>,
    pub telemetry: CycleTelemetry,
    pub auto_paused: bool,
}
