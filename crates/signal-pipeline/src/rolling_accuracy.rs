use std::collections::VecDeque;

use dashmap::DashMap;

use crate::types::OutcomeTag;

const DEFAULT_WINDOW: usize = 20;

/// In-memory, per-strategy-id window of the last W outcomes plus the win
/// ratio over them. Owned by the scheduler; explicitly not persisted —
/// a restart zeroes it.
pub struct RollingAccuracyTracker {
    window: usize,
    strategies: DashMap<String, VecDeque<OutcomeTag>>,
}

impl RollingAccuracyTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            strategies: DashMap::new(),
        }
    }

    pub fn record(&self, strategy_id: &str, outcome: OutcomeTag) {
        let mut entry = self.strategies.entry(strategy_id.to_string()).or_default();
        entry.push_back(outcome);
        while entry.len() > self.window {
            entry.pop_front();
        }
    }

    /// `None` until at least one outcome has been recorded for this
    /// strategy.
    pub fn accuracy(&self, strategy_id: &str) -> Option<f64> {
        let entry = self.strategies.get(strategy_id)?;
        if entry.is_empty() {
            return None;
        }
        let wins = entry.iter().filter(|o| matches!(o, OutcomeTag::Win)).count();
        Some(wins as f64 / entry.len() as f64)
    }

    pub fn window_len(&self, strategy_id: &str) -> usize {
        self.strategies.get(strategy_id).map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for RollingAccuracyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// `|pnl| < 10 => BREAKEVEN`, else sign-based WIN/LOSS.
pub fn classify_outcome(net_pnl: f64) -> OutcomeTag {
    if net_pnl.abs() < 10.0 {
        OutcomeTag::Breakeven
    } else if net_pnl > 0.0 {
        OutcomeTag::Win
    } else {
        OutcomeTag::Loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_caps_at_configured_size() {
        let tracker = RollingAccuracyTracker::new(3);
        for _ in 0..5 {
            tracker.record("momentum", OutcomeTag::Win);
        }
        assert_eq!(tracker.window_len("momentum"), 3);
    }

    #[test]
    fn accuracy_is_none_until_first_outcome() {
        let tracker = RollingAccuracyTracker::default();
        assert_eq!(tracker.accuracy("unknown"), None);
    }

    #[test]
    fn accuracy_reflects_win_ratio_over_the_window() {
        let tracker = RollingAccuracyTracker::new(4);
        tracker.record("scalper", OutcomeTag::Win);
        tracker.record("scalper", OutcomeTag::Win);
        tracker.record("scalper", OutcomeTag::Loss);
        tracker.record("scalper", OutcomeTag::Loss);
        assert_eq!(tracker.accuracy("scalper"), Some(0.5));
    }

    #[test]
    fn classify_outcome_thresholds() {
        assert_eq!(classify_outcome(5.0), OutcomeTag::Breakeven);
        assert_eq!(classify_outcome(-5.0), OutcomeTag::Breakeven);
        assert_eq!(classify_outcome(11.0), OutcomeTag::Win);
        assert_eq!(classify_outcome(-11.0), OutcomeTag::Loss);
    }
}
