use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LlmDirection {
    Buy,
    Sell,
}

/// A single-shot approval ask for one native-engine signal: "approve this
/// signal given indicator values, yes/no, one-line reason".
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub symbol: String,
    pub direction: LlmDirection,
    pub confidence: f64,
    pub indicators: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    pub reason: String,
    /// Gate scores the model chose to supply itself; preferred over the
    /// deterministic derivation when present (pipeline stage 7).
    #[serde(default)]
    pub gate_scores: Option<HashMap<String, i32>>,
}

/// Context handed to the LLM fallback path when the native engine is absent
/// or returned nothing: quotes + recent history + open positions, plus
/// options-chain context for F&O-facing roles.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackContext {
    pub quotes: HashMap<String, f64>,
    pub recent_history: HashMap<String, Vec<f64>>,
    pub open_positions: Vec<String>,
    pub options_context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProposedSignal {
    pub symbol: String,
    /// "BUY" | "SELL" | "HOLD" — HOLD is filtered out by the caller, never
    /// persisted.
    pub action: String,
    pub confidence: f64,
    #[serde(default)]
    pub gate_scores: Option<HashMap<String, i32>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FallbackResponse {
    pub signals: Vec<ProposedSignal>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitStatus {
    pub circuit_open: bool,
}

/// Wall-clock-durable view of the breaker's internal state, so a restart
/// can resume an open breaker's cooldown instead of spuriously re-closing
/// it. `opened_at` is `DateTime<Utc>` rather than the breaker's internal
/// `Instant` — the only part of this state that actually needs to survive
/// a process boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub is_open: bool,
}
