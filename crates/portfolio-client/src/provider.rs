use async_trait::async_trait;

use crate::error::PortfolioResult;
use crate::types::{OrderResult, OrderSide, PortfolioRisk, Position, Trade};

/// The external portfolio ledger's contracted operation surface. The core
/// never touches NAV/position/trade storage directly — it only calls
/// through this trait, matching the donor's `BrokerClient` split between a
/// real HTTP-backed client and a paper/simulated stand-in.
#[async_trait]
pub trait PortfolioClient: Send + Sync {
    /// Places qty at `fill_price` for `symbol`. Opens, adds to, or reduces
    /// a position in the direction implied by `side`. A BUY while short
    /// reduces the short; a SELL while long reduces the long; a SELL with
    /// nothing open starts a new short. When this order nets against an
    /// existing opposite-side position, the realised portion is returned
    /// via `OrderResult::closed_trade` — callers that need rolling-accuracy
    /// tracking on every close, not just explicit `close_position` calls,
    /// read it from there.
    async fn submit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: f64,
        fill_price: f64,
        strategy_tag: &str,
    ) -> PortfolioResult<OrderResult>;

    /// Fully unwinds whatever position is open for `symbol` at
    /// `fill_price` and returns the realised trade. Fails with
    /// `NoOpenPosition` if nothing is open.
    async fn close_position(&self, symbol: &str, fill_price: f64) -> PortfolioResult<Trade>;

    async fn list_positions(&self) -> PortfolioResult<Vec<Position>>;

    async fn get_position(&self, symbol: &str) -> PortfolioResult<Option<Position>>;

    /// `None` when portfolio-level risk isn't computable yet (e.g. no
    /// closed trades), distinct from a computed-but-healthy risk state.
    async fn portfolio_risk(&self) -> PortfolioResult<Option<PortfolioRisk>>;

    async fn nav(&self) -> PortfolioResult<f64>;

    /// Net P&L of the most recent closed trades in `symbol`, newest
    /// first, capped at `limit`. Backs half-Kelly sizing's win-rate /
    /// win-loss-ratio inputs.
    async fn recent_trade_outcomes(&self, symbol: &str, limit: usize) -> PortfolioResult<Vec<f64>>;
}
