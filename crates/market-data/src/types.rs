use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exchange a symbol trades on. Resolved from the routing alphabet in
/// `exchange::resolve_exchange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nse,
    Bse,
    Mcx,
    Cds,
}

impl Exchange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE",
            Exchange::Bse => "BSE",
            Exchange::Mcx => "MCX",
            Exchange::Cds => "CDS",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single OHLCV bar.
///
/// Invariant: within a series, timestamps are strictly increasing and of the
/// declared interval width. The stack does not itself enforce this across
/// calls — callers that assemble a series from provider output must.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest-known quote. A quote is valid only when `ltp > 0`; the stack never
/// caches an invalid quote.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Quote {
    pub symbol: String,
    pub exchange: Option<Exchange>,
    pub ltp: f64,
    pub change: f64,
    pub change_percent: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub bid: f64,
    pub bid_qty: i64,
    pub ask: f64,
    pub ask_qty: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn is_valid(&self) -> bool {
        self.ltp > 0.0
    }

    pub fn zero(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Default::default()
        }
    }
}

/// Candle interval. `mapInterval` from the spec is idempotent on this
/// vocabulary: parsing an already-canonical string returns the same
/// interval, and formatting round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Day1,
    Week1,
    Month1,
}

impl Interval {
    /// Canonical wire representation, e.g. "5m", "1d".
    pub fn canonical(&self) -> &'static str {
        match self {
            Interval::Min1 => "1m",
            Interval::Min5 => "5m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1wk",
            Interval::Month1 => "1mo",
        }
    }

    /// Parses both canonical forms and the aliases the public provider uses
    /// (`60m` for 1h, `daily`/`day` for 1d, `weekly` for 1wk, `monthly` for 1mo).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "1m" | "1min" => Some(Interval::Min1),
            "5m" | "5min" => Some(Interval::Min5),
            "15m" | "15min" => Some(Interval::Min15),
            "30m" | "30min" => Some(Interval::Min30),
            "1h" | "60m" | "hourly" => Some(Interval::Hour1),
            "1d" | "day" | "daily" => Some(Interval::Day1),
            "1wk" | "week" | "weekly" => Some(Interval::Week1),
            "1mo" | "month" | "monthly" => Some(Interval::Month1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopMovers {
    pub gainers: Vec<MoverEntry>,
    pub losers: Vec<MoverEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoverEntry {
    pub symbol: String,
    pub ltp: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexQuote {
    pub name: String,
    pub value: f64,
    pub change: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VixQuote {
    pub value: f64,
    pub change: f64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub symbol: String,
    pub name: String,
    pub exchange: Exchange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionStrike {
    pub strike: f64,
    pub call_oi: f64,
    pub call_volume: f64,
    pub call_iv: f64,
    pub call_ltp: f64,
    pub put_oi: f64,
    pub put_volume: f64,
    pub put_iv: f64,
    pub put_ltp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsChain {
    pub symbol: String,
    pub strikes: Vec<OptionStrike>,
    pub pcr: f64,
    pub max_pain: f64,
    pub total_call_oi: f64,
    pub total_put_oi: f64,
}
