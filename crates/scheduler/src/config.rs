use std::time::Duration;

/// Cadence and capacity knobs, mirroring `TICK_INTERVAL_MS` / `SIGNAL_INTERVAL_MS`
/// / `MARKET_SCAN_INTERVAL_MS` / `MAX_CONCURRENT_BOTS`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub signal_interval: Duration,
    pub market_scan_interval: Duration,
    pub max_concurrent_bots: usize,
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let millis = |key: &str, default: u64| -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            tick_interval: Duration::from_millis(millis("TICK_INTERVAL_MS", 180_000)),
            signal_interval: Duration::from_millis(millis("SIGNAL_INTERVAL_MS", 300_000)),
            market_scan_interval: Duration::from_millis(millis("MARKET_SCAN_INTERVAL_MS", 600_000)),
            max_concurrent_bots: std::env::var("MAX_CONCURRENT_BOTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
