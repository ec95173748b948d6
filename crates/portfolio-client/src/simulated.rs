use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::{PortfolioError, PortfolioResult};
use crate::provider::PortfolioClient;
use crate::types::{OrderResult, OrderSide, OrderStatus, PortfolioRisk, Position, PositionSide, Trade};

struct OpenPosition {
    side: PositionSide,
    qty: f64,
    avg_entry_price: f64,
    strategy_tag: String,
}

struct EquityCurve {
    peak: f64,
    current: f64,
}

/// Paper/simulated stand-in for the real portfolio ledger: positions live
/// in a `DashMap` for the lifetime of the process, realised P&L accrues
/// into a running equity curve used for the agent risk gate's drawdown
/// check. Replaces the donor's `broker-trait` + `alpaca-broker` pairing for
/// a venue that never talks to a live broker.
pub struct SimulatedPortfolioClient {
    positions: DashMap<String, OpenPosition>,
    equity: Mutex<EquityCurve>,
    trade_history: DashMap<String, VecDeque<f64>>,
}

const TRADE_HISTORY_CAP: usize = 100;

impl SimulatedPortfolioClient {
    pub fn new(starting_capital: f64) -> Self {
        Self {
            positions: DashMap::new(),
            equity: Mutex::new(EquityCurve {
                peak: starting_capital,
                current: starting_capital,
            }),
            trade_history: DashMap::new(),
        }
    }

    fn apply_realized_pnl(&self, symbol: &str, net_pnl: f64) {
        let mut equity = self.equity.lock().expect("equity mutex poisoned");
        equity.current += net_pnl;
        if equity.current > equity.peak {
            equity.peak = equity.current;
        }
        drop(equity);

        let mut history = self.trade_history.entry(symbol.to_string()).or_default();
        history.push_front(net_pnl);
        while history.len() > TRADE_HISTORY_CAP {
            history.pop_back();
        }
    }
}

#[async_trait]
impl PortfolioClient for SimulatedPortfolioClient {
    async fn submit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: f64,
        fill_price: f64,
        strategy_tag: &str,
    ) -> PortfolioResult<OrderResult> {
        if qty <= 0.0 {
            return Err(PortfolioError::InvalidOrder(format!(
                "quantity must be positive, got {qty}"
            )));
        }

        let opening_side = match side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };

        let existing_side = self.positions.get(symbol).map(|p| p.side);

        match existing_side {
            None => {
                self.positions.insert(
                    symbol.to_string(),
                    OpenPosition {
                        side: opening_side,
                        qty,
                        avg_entry_price: fill_price,
                        strategy_tag: strategy_tag.to_string(),
                    },
                );
            }
            Some(current_side) if current_side == opening_side => {
                let mut position = self.positions.get_mut(symbol).expect("checked above");
                let total_qty = position.qty + qty;
                position.avg_entry_price =
                    (position.avg_entry_price * position.qty + fill_price * qty) / total_qty;
                position.qty = total_qty;
            }
            // SELL against an existing LONG closes it (in full or in part).
            // Stage 10 defines BUY solely as "open long" -- a BUY never
            // nets against a SHORT here; see the arm below.
            Some(PositionSide::Long) => {
                let (closing_qty, entry_price, remainder) = {
                    let mut position = self.positions.get_mut(symbol).expect("checked above");
                    let closing_qty = qty.min(position.qty);
                    let entry_price = position.avg_entry_price;
                    let per_unit_pnl = fill_price - entry_price;
                    self.apply_realized_pnl(symbol, per_unit_pnl * closing_qty);
                    position.qty -= closing_qty;
                    (closing_qty, entry_price, qty - closing_qty)
                };

                let exhausted = self
                    .positions
                    .get(symbol)
                    .map(|p| p.qty <= 0.0)
                    .unwrap_or(true);
                if exhausted {
                    self.positions.remove(symbol);
                    if remainder > 0.0 {
                        self.positions.insert(
                            symbol.to_string(),
                            OpenPosition {
                                side: opening_side,
                                qty: remainder,
                                avg_entry_price: fill_price,
                                strategy_tag: strategy_tag.to_string(),
                            },
                        );
                    }
                }

                let net_pnl = (fill_price - entry_price) * closing_qty;
                return Ok(OrderResult {
                    status: OrderStatus::Filled,
                    avg_fill_price: fill_price,
                    closed_trade: Some(Trade {
                        symbol: symbol.to_string(),
                        side: PositionSide::Long,
                        qty: closing_qty,
                        entry_price,
                        exit_price: fill_price,
                        net_pnl,
                        closed_at: Utc::now(),
                    }),
                });
            }
            // A BUY can never close or net against a SHORT. Paper trading
            // has no naked-long-over-a-short model, so this fails clean;
            // the SHORT must be closed explicitly via `close_position`.
            Some(PositionSide::Short) => {
                return Err(PortfolioError::InvalidOrder(format!(
                    "cannot BUY {symbol}: an existing SHORT position must be closed via close_position first"
                )));
            }
        }

        Ok(OrderResult {
            status: OrderStatus::Filled,
            avg_fill_price: fill_price,
            closed_trade: None,
        })
    }

    async fn close_position(&self, symbol: &str, fill_price: f64) -> PortfolioResult<Trade> {
        let (_, position) = self
            .positions
            .remove(symbol)
            .ok_or_else(|| PortfolioError::NoOpenPosition(symbol.to_string()))?;

        let net_pnl = match position.side {
            PositionSide::Long => (fill_price - position.avg_entry_price) * position.qty,
            PositionSide::Short => (position.avg_entry_price - fill_price) * position.qty,
        };
        self.apply_realized_pnl(symbol, net_pnl);

        Ok(Trade {
            symbol: symbol.to_string(),
            side: position.side,
            qty: position.qty,
            entry_price: position.avg_entry_price,
            exit_price: fill_price,
            net_pnl,
            closed_at: Utc::now(),
        })
    }

    async fn list_positions(&self) -> PortfolioResult<Vec<Position>> {
        Ok(self
            .positions
            .iter()
            .map(|entry| Position {
                symbol: entry.key().clone(),
                side: entry.value().side,
                qty: entry.value().qty,
                avg_entry_price: entry.value().avg_entry_price,
                unrealized_pnl: 0.0,
                strategy_tag: entry.value().strategy_tag.clone(),
                status: "open".to_string(),
            })
            .collect())
    }

    async fn get_position(&self, symbol: &str) -> PortfolioResult<Option<Position>> {
        Ok(self.positions.get(symbol).map(|entry| Position {
            symbol: symbol.to_string(),
            side: entry.side,
            qty: entry.qty,
            avg_entry_price: entry.avg_entry_price,
            unrealized_pnl: 0.0,
            strategy_tag: entry.strategy_tag.clone(),
            status: "open".to_string(),
        }))
    }

    async fn portfolio_risk(&self) -> PortfolioResult<Option<PortfolioRisk>> {
        let equity = self.equity.lock().expect("equity mutex poisoned");
        if equity.peak <= 0.0 {
            return Ok(None);
        }
        let drawdown = ((equity.peak - equity.current) / equity.peak) * 100.0;
        Ok(Some(PortfolioRisk {
            max_drawdown_percent: drawdown.max(0.0),
        }))
    }

    async fn nav(&self) -> PortfolioResult<f64> {
        Ok(self.equity.lock().expect("equity mutex poisoned").current)
    }

    async fn recent_trade_outcomes(&self, symbol: &str, limit: usize) -> PortfolioResult<Vec<f64>> {
        Ok(self
            .trade_history
            .get(symbol)
            .map(|history| history.iter().take(limit).copied().collect())
            .unwrap_or_default())
    }
}

impl Default for SimulatedPortfolioClient {
    fn default() -> Self {
        Self::new(100_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buy_then_sell_realizes_pnl_and_removes_position() {
        let client = SimulatedPortfolioClient::new(100_000.0);
        client
            .submit_order("RELIANCE", OrderSide::Buy, 10.0, 100.0, "scanner")
            .await
            .unwrap();
        assert!(client.get_position("RELIANCE").await.unwrap().is_some());

        client
            .submit_order("RELIANCE", OrderSide::Sell, 10.0, 110.0, "scanner")
            .await
            .unwrap();
        assert!(client.get_position("RELIANCE").await.unwrap().is_none());

        let nav = client.nav().await.unwrap();
        assert!((nav - 100_100.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn sell_with_no_position_opens_a_short() {
        let client = SimulatedPortfolioClient::new(100_000.0);
        client
            .submit_order("TCS", OrderSide::Sell, 5.0, 3500.0, "scanner")
            .await
            .unwrap();

        let position = client.get_position("TCS").await.unwrap().unwrap();
        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.qty, 5.0);
    }

    #[tokio::test]
    async fn buy_against_an_open_short_fails_clean_instead_of_closing_it() {
        let client = SimulatedPortfolioClient::new(100_000.0);
        client
            .submit_order("TCS", OrderSide::Sell, 5.0, 3500.0, "scanner")
            .await
            .unwrap();

        let result = client
            .submit_order("TCS", OrderSide::Buy, 5.0, 3400.0, "scanner")
            .await;
        assert!(matches!(result, Err(PortfolioError::InvalidOrder(_))));

        // The short is untouched -- a BUY never reports it as closed.
        let position = client.get_position("TCS").await.unwrap().unwrap();
        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.qty, 5.0);
    }

    #[tokio::test]
    async fn partial_reduction_reports_the_closed_portion_only() {
        let client = SimulatedPortfolioClient::new(100_000.0);
        client
            .submit_order("INFY", OrderSide::Buy, 10.0, 1500.0, "scanner")
            .await
            .unwrap();

        let result = client
            .submit_order("INFY", OrderSide::Sell, 4.0, 1550.0, "scanner")
            .await
            .unwrap();
        let trade = result.closed_trade.expect("partial reduction still realizes pnl");
        assert_eq!(trade.qty, 4.0);
        assert!((trade.net_pnl - 200.0).abs() < 1e-6);

        let remaining = client.get_position("INFY").await.unwrap().unwrap();
        assert_eq!(remaining.qty, 6.0);
    }

    #[tokio::test]
    async fn close_position_without_one_open_fails_clean() {
        let client = SimulatedPortfolioClient::new(100_000.0);
        let result = client.close_position("INFY", 1500.0).await;
        assert!(matches!(result, Err(PortfolioError::NoOpenPosition(_))));
    }

    #[tokio::test]
    async fn drawdown_reflects_realized_losses() {
        let client = SimulatedPortfolioClient::new(100_000.0);
        client
            .submit_order("NIFTY", OrderSide::Buy, 1.0, 100.0, "executor")
            .await
            .unwrap();
        client.close_position("NIFTY", 90.0).await.unwrap();

        let risk = client.portfolio_risk().await.unwrap().unwrap();
        assert!(risk.max_drawdown_percent > 0.0);
    }
}
