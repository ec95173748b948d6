use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One bar of candle data as handed to the native engine. Mirrors
/// `market_data::Candle` but decoupled so this crate has no dependency on
/// the data stack — the engine only ever sees plain numbers over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineCandle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggressiveness {
    High,
    Medium,
    Low,
}

impl Aggressiveness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggressiveness::High => "high",
            Aggressiveness::Medium => "medium",
            Aggressiveness::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolCandles {
    pub symbol: String,
    pub candles: Vec<EngineCandle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub symbols: Vec<SymbolCandles>,
    pub aggressiveness: Aggressiveness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineIndicators {
    pub ema_9: Option<f64>,
    pub ema_21: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub supertrend: Option<f64>,
    pub vwap: Option<f64>,
    pub adx: Option<f64>,
    pub atr: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineVotes {
    pub ema_cross: Option<f64>,
    pub macd: Option<f64>,
    pub supertrend: Option<f64>,
    pub bollinger: Option<f64>,
    pub volume: Option<f64>,
    #[serde(flatten)]
    pub extra: HashMap<String, f64>,
}

impl EngineVotes {
    /// Fraction of the named votes that are positive (> 0), used by gate G8
    /// (Sentiment). Unknown/absent votes are not counted either way.
    pub fn positive_fraction(&self) -> f64 {
        let values: Vec<f64> = [
            self.ema_cross,
            self.macd,
            self.supertrend,
            self.bollinger,
            self.volume,
        ]
        .into_iter()
        .flatten()
        .chain(self.extra.values().copied())
        .collect();

        if values.is_empty() {
            return 0.5;
        }
        let positive = values.iter().filter(|v| **v > 0.0).count();
        positive as f64 / values.len() as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSignal {
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub target: f64,
    #[serde(default)]
    pub indicators: EngineIndicators,
    #[serde(default)]
    pub votes: EngineVotes,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScanResponse {
    pub signals: Vec<EngineSignal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRequest {
    pub returns: Vec<f64>,
    pub initial_capital: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub var_95: f64,
    pub max_drawdown_percent: f64,
    pub volatility: f64,
}

/// Single JSON object written to the child's stdin: `{command, data}`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineRequest<'a> {
    pub command: &'a str,
    pub data: serde_json::Value,
}

/// Response read back from the child's stdout: `{success, data, error?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineResponseEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}
