use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Filled,
    Rejected,
}

/// Contract the core relies on when placing an order: just enough to
/// update the signal's execution state, never a full position snapshot.
/// `closed_trade` carries the realised portion whenever this order netted
/// against an existing opposite-side position (a full close, or a partial
/// reduction) — the caller needs that P&L for rolling-accuracy tracking,
/// even though this isn't the dedicated `close_position` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub status: OrderStatus,
    pub avg_fill_price: f64,
    #[serde(default)]
    pub closed_trade: Option<Trade>,
}

/// Position listing shape per the external portfolio collaborator's
/// contracted surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub qty: f64,
    pub avg_entry_price: f64,
    pub unrealized_pnl: f64,
    pub strategy_tag: String,
    pub status: String,
}

/// A completed close: always returned by `close_position`, and by
/// `submit_order` whenever a SELL netted against an existing LONG
/// position. A BUY never nets against a SHORT this way -- `submit_order`
/// fails clean instead, so a BUY is never reported as closing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: PositionSide,
    pub qty: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub net_pnl: f64,
    pub closed_at: DateTime<Utc>,
}

/// Portfolio-level risk snapshot consumed by the agent-only risk gate
/// (stage 8): dropped silently when unavailable rather than blocking the
/// pipeline on a collaborator outage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortfolioRisk {
    pub max_drawdown_percent: f64,
}
