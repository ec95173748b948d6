use std::time::Duration;

/// Market-data stack tunables. Mirrors the `CACHE_TTL_*` / `*_MAX_CONCURRENT`
/// / `FETCH_TIMEOUT_MS` environment knobs.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub cache_ttl_quote: Duration,
    pub cache_ttl_history: Duration,
    pub cache_ttl_search: Duration,
    pub cache_ttl_indices: Duration,
    pub cache_ttl_options: Duration,
    pub fetch_timeout: Duration,
    pub provider_a_base_url: String,
    pub exchange_direct_base_url: String,
    pub exchange_direct_homepage_url: String,
    pub broker_api_base_url: String,
}

impl MarketDataConfig {
    pub fn from_env() -> Self {
        let secs = |key: &str, default: u64| -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let url = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Self {
            cache_ttl_quote: Duration::from_secs(secs("CACHE_TTL_QUOTE", 30)),
            cache_ttl_history: Duration::from_secs(secs("CACHE_TTL_HISTORY", 300)),
            cache_ttl_search: Duration::from_secs(secs("CACHE_TTL_SEARCH", 3600)),
            cache_ttl_indices: Duration::from_secs(secs("CACHE_TTL_INDICES", 60)),
            cache_ttl_options: Duration::from_secs(120),
            fetch_timeout: Duration::from_millis(secs("FETCH_TIMEOUT_MS", 10_000)),
            provider_a_base_url: url(
                "PROVIDER_A_BASE_URL",
                "https://chart-provider.example.invalid/v8/finance",
            ),
            exchange_direct_base_url: url(
                "EXCHANGE_DIRECT_BASE_URL",
                "https://www.nseindia.com/api",
            ),
            exchange_direct_homepage_url: url(
                "EXCHANGE_DIRECT_HOMEPAGE_URL",
                "https://www.nseindia.com",
            ),
            broker_api_base_url: url("BROKER_API_BASE_URL", "https://api.broker.example.invalid"),
        }
    }
}
