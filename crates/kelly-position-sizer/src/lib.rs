/// A single closed trade, as pulled from the last 30 closed trades for a
/// symbol/user when sizing a new entry.
#[derive(Debug, Clone, Copy)]
pub struct ClosedTradeOutcome {
    pub net_pnl: f64,
}

/// Half-Kelly allocation, clamped to `[0.02, 0.15]`, for the pipeline's
/// execution-stage position sizing. With fewer than 5 closed trades in this
/// symbol for this user, falls back to a flat 5% allocation per the spec.
pub fn half_kelly_allocation(history: &[ClosedTradeOutcome]) -> f64 {
    const MIN_ALLOC: f64 = 0.02;
    const MAX_ALLOC: f64 = 0.15;
    const FALLBACK_ALLOC: f64 = 0.05;

    if history.len() < 5 {
        return FALLBACK_ALLOC;
    }

    let wins: Vec<f64> = history.iter().filter(|t| t.net_pnl > 0.0).map(|t| t.net_pnl).collect();
    let losses: Vec<f64> = history
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .collect();

    let win_rate = wins.len() as f64 / history.len() as f64;

    // No wins in the window: the Kelly formula wants a deeply negative
    // wager here, which clamps to the floor. No losses: it wants the
    // richest allowed wager, which clamps to the ceiling. Either way
    // skip the avg_win/avg_loss ratio, which would otherwise divide by
    // an empty side's average.
    let kelly = if wins.is_empty() {
        f64::NEG_INFINITY
    } else if losses.is_empty() {
        f64::INFINITY
    } else {
        let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
        let avg_loss = losses.iter().sum::<f64>() / losses.len() as f64;
        let wl_ratio = avg_win / avg_loss;
        win_rate - (1.0 - win_rate) / wl_ratio
    };

    (kelly / 2.0).clamp(MIN_ALLOC, MAX_ALLOC)
}

/// Quantity for an order given NAV, allocation fraction, and LTP: always at
/// least one unit.
pub fn quantity_for_allocation(nav: f64, allocation: f64, ltp: f64) -> u64 {
    if ltp <= 0.0 {
        return 1;
    }
    ((nav * allocation / ltp).floor() as i64).max(1) as u64
}

#[cfg(test)]
mod spec_tests {
    use super::*;

    #[test]
    fn fewer_than_five_trades_uses_flat_five_percent() {
        let history = vec![ClosedTradeOutcome { net_pnl: 100.0 }; 3];
        assert_eq!(half_kelly_allocation(&history), 0.05);
    }

    #[test]
    fn allocation_is_always_within_spec_bounds() {
        let mixed = vec![
            ClosedTradeOutcome { net_pnl: 500.0 },
            ClosedTradeOutcome { net_pnl: -50.0 },
            ClosedTradeOutcome { net_pnl: 300.0 },
            ClosedTradeOutcome { net_pnl: -40.0 },
            ClosedTradeOutcome { net_pnl: 200.0 },
            ClosedTradeOutcome { net_pnl: 250.0 },
        ];
        let alloc = half_kelly_allocation(&mixed);
        assert!((0.02..=0.15).contains(&alloc));
    }

    #[test]
    fn all_losses_clamps_to_minimum() {
        let history = vec![ClosedTradeOutcome { net_pnl: -10.0 }; 6];
        assert_eq!(half_kelly_allocation(&history), 0.02);
    }

    #[test]
    fn all_wins_clamps_to_maximum() {
        let history = vec![ClosedTradeOutcome { net_pnl: 10.0 }; 6];
        assert_eq!(half_kelly_allocation(&history), 0.15);
    }

    #[test]
    fn same_history_gives_same_allocation() {
        let history = vec![
            ClosedTradeOutcome { net_pnl: 120.0 },
            ClosedTradeOutcome { net_pnl: -60.0 },
            ClosedTradeOutcome { net_pnl: 80.0 },
            ClosedTradeOutcome { net_pnl: -40.0 },
            ClosedTradeOutcome { net_pnl: 90.0 },
        ];
        assert_eq!(half_kelly_allocation(&history), half_kelly_allocation(&history));
    }
}
