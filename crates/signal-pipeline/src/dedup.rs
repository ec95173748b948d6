use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::types::SignalType;

const COALESCE_WINDOW: Duration = Duration::hours(1);

#[derive(Hash, PartialEq, Eq, Clone)]
struct Key {
    user_id: String,
    symbol: String,
    signal_type_tag: &'static str,
}

fn key_for(user_id: &str, symbol: &str, signal_type: SignalType) -> Key {
    Key {
        user_id: user_id.to_string(),
        symbol: symbol.to_string(),
        signal_type_tag: match signal_type {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
        },
    }
}

/// Tracks the most recent PENDING signal written for `(userId, symbol,
/// signalType)` so a cycle that would write an exact duplicate within the
/// coalesce window updates in place instead of persisting a new row.
pub struct SignalDedup {
    recent: DashMap<Key, DateTime<Utc>>,
}

impl SignalDedup {
    pub fn new() -> Self {
        Self {
            recent: DashMap::new(),
        }
    }

    /// Returns `true` when an equivalent PENDING signal was already
    /// recorded inside the coalesce window — the caller should update
    /// rather than insert. Always refreshes the recorded timestamp.
    pub fn should_coalesce(&self, user_id: &str, symbol: &str, signal_type: SignalType) -> bool {
        let key = key_for(user_id, symbol, signal_type);
        let now = Utc::now();
        let coalesce = self
            .recent
            .get(&key)
            .map(|seen_at| now.signed_duration_since(*seen_at) < COALESCE_WINDOW)
            .unwrap_or(false);
        self.recent.insert(key, now);
        coalesce
    }
}

impl Default for SignalDedup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_signal_never_coalesces() {
        let dedup = SignalDedup::new();
        assert!(!dedup.should_coalesce("u1", "RELIANCE", SignalType::Buy));
    }

    #[test]
    fn immediate_repeat_coalesces() {
        let dedup = SignalDedup::new();
        assert!(!dedup.should_coalesce("u1", "RELIANCE", SignalType::Buy));
        assert!(dedup.should_coalesce("u1", "RELIANCE", SignalType::Buy));
    }

    #[test]
    fn different_symbol_does_not_coalesce() {
        let dedup = SignalDedup::new();
        assert!(!dedup.should_coalesce("u1", "RELIANCE", SignalType::Buy));
        assert!(!dedup.should_coalesce("u1", "TCS", SignalType::Buy));
    }

    #[test]
    fn different_signal_type_does_not_coalesce() {
        let dedup = SignalDedup::new();
        assert!(!dedup.should_coalesce("u1", "RELIANCE", SignalType::Buy));
        assert!(!dedup.should_coalesce("u1", "RELIANCE", SignalType::Sell));
    }
}
