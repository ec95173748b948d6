use std::time::Duration;

use crate::broker_tier::{BrokerApiTier, BrokerCredentials};
use crate::cache::TtlCache;
use crate::catalogue::Catalogue;
use crate::config::MarketDataConfig;
use crate::exchange::resolve_exchange;
use crate::exchange_direct::ExchangeDirect;
use crate::options::build_options_chain;
use crate::provider_a::ProviderA;
use crate::simulated::simulated_quote;
use crate::types::{Candle, Exchange, IndexQuote, Interval, OptionsChain, Quote, SearchResult, TopMovers, VixQuote};

/// The layered, cached, circuit-broken market-data stack. Every read
/// operation tries tiers top-down and returns the first that yields a
/// valid, non-empty result. Never caches empty or zero-LTP quotes; cache
/// invalidation is TTL-only.
pub struct MarketDataStack {
    config: MarketDataConfig,
    provider_a: ProviderA,
    exchange_direct: ExchangeDirect,
    broker: BrokerApiTier,
    catalogue: Catalogue,
    quote_cache: TtlCache<Quote>,
    history_cache: TtlCache<Vec<Candle>>,
    search_cache: TtlCache<Vec<SearchResult>>,
    indices_cache: TtlCache<Vec<IndexQuote>>,
    options_cache: TtlCache<OptionsChain>,
}

impl MarketDataStack {
    pub fn new(config: MarketDataConfig) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .timeout(config.fetch_timeout)
            .build()
            .expect("reqwest client config is static and always valid");

        let provider_a = ProviderA::new(
            client.clone(),
            config.provider_a_base_url.clone(),
            config.fetch_timeout,
        );
        let exchange_direct = ExchangeDirect::new(
            client.clone(),
            config.exchange_direct_base_url.clone(),
            config.exchange_direct_homepage_url.clone(),
            config.fetch_timeout,
        );
        let broker = BrokerApiTier::new(client, config.broker_api_base_url.clone(), config.fetch_timeout);

        Self {
            quote_cache: TtlCache::new(config.cache_ttl_quote),
            history_cache: TtlCache::new(config.cache_ttl_history),
            search_cache: TtlCache::new(config.cache_ttl_search),
            indices_cache: TtlCache::new(config.cache_ttl_indices),
            options_cache: TtlCache::new(config.cache_ttl_options),
            provider_a,
            exchange_direct,
            broker,
            catalogue: Catalogue::new(),
            config,
        }
    }

    fn quote_cache_key(symbol: &str, exchange: Exchange) -> String {
        format!("{exchange}:{symbol}")
    }

    /// Returns a Quote; returns an all-zero Quote if every tier fails, never
    /// propagates an error. Per the caching discipline, an invalid (ltp<=0)
    /// quote is never written to the cache.
    pub async fn get_quote(&self, symbol: &str, exchange: Exchange, creds: Option<&BrokerCredentials>) -> Quote {
        let key = Self::quote_cache_key(symbol, exchange);
        if let Some(cached) = self.quote_cache.get(&key) {
            return cached;
        }

        if let Ok(quote) = self.provider_a.get_quote(symbol, exchange).await {
            if quote.is_valid() {
                self.quote_cache.put(key, quote.clone());
                return quote;
            }
        }

        if let Ok(quote) = self.exchange_direct.get_quote(symbol, exchange).await {
            if quote.is_valid() {
                self.quote_cache.put(key, quote.clone());
                return quote;
            }
        }

        if let Some(creds) = creds {
            if let Ok(quote) = self.broker.get_quote(symbol, exchange, creds).await {
                if quote.is_valid() {
                    self.quote_cache.put(key, quote.clone());
                    return quote;
                }
            }
        }

        if let Some(quote) = simulated_quote(symbol, exchange, approximate_base_price(symbol)) {
            // Simulated quotes are synthetic by construction; they are not
            // cached so every caller observes the same live generation.
            return quote;
        }

        Quote::zero(symbol)
    }

    pub async fn get_history(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: Interval,
        range_days: i64,
    ) -> Vec<Candle> {
        let key = format!("{exchange}:{symbol}:{}:{range_days}", interval.canonical());
        if let Some(cached) = self.history_cache.get(&key) {
            return cached;
        }

        if let Ok(candles) = self
            .provider_a
            .get_history(symbol, exchange, interval.canonical(), range_days)
            .await
        {
            if !candles.is_empty() {
                self.history_cache.put(key, candles.clone());
                return candles;
            }
        }

        Vec::new()
    }

    pub fn search(&self, query: &str, limit: usize, exchange: Option<Exchange>) -> Vec<SearchResult> {
        let key = format!("{query}:{limit}:{exchange:?}");
        if let Some(cached) = self.search_cache.get(&key) {
            return cached;
        }
        let results = self.catalogue.search(query, limit, exchange);
        self.search_cache.put(key, results.clone());
        results
    }

    pub fn get_top_movers(&self, count: usize, quotes: &[(String, Quote)]) -> TopMovers {
        let mut ranked: Vec<_> = quotes
            .iter()
            .filter(|(_, q)| q.is_valid())
            .map(|(symbol, q)| crate::types::MoverEntry {
                symbol: symbol.clone(),
                ltp: q.ltp,
                change_percent: q.change_percent,
            })
            .collect();

        let mut gainers = ranked.clone();
        gainers.sort_by(|a, b| b.change_percent.partial_cmp(&a.change_percent).unwrap());
        gainers.truncate(count);

        ranked.sort_by(|a, b| a.change_percent.partial_cmp(&b.change_percent).unwrap());
        ranked.truncate(count);

        TopMovers {
            gainers,
            losers: ranked,
        }
    }

    pub async fn get_vix(&self) -> VixQuote {
        let quote = self.get_quote("INDIA VIX", Exchange::Nse, None).await;
        if quote.is_valid() {
            VixQuote {
                value: quote.ltp,
                change: quote.change,
                change_percent: quote.change_percent,
            }
        } else {
            VixQuote::default()
        }
    }

    pub async fn get_indices(&self) -> Vec<IndexQuote> {
        if let Some(cached) = self.indices_cache.get("indices") {
            return cached;
        }

        let mut out = Vec::new();
        for name in ["NIFTY 50", "BANKNIFTY", "SENSEX", "INDIA VIX"] {
            let quote = self.get_quote(name, Exchange::Nse, None).await;
            if quote.is_valid() {
                out.push(IndexQuote {
                    name: name.to_string(),
                    value: quote.ltp,
                    change: quote.change,
                    change_percent: quote.change_percent,
                });
            }
        }

        if !out.is_empty() {
            self.indices_cache.put("indices".to_string(), out.clone());
        }
        out
    }

    /// Strikes around the current LTP with CE/PE OI, volume, IV, plus the
    /// computed `pcr`/`maxPain`/total-OI summary. Cached per symbol at the
    /// configured options-chain TTL.
    pub async fn get_options_chain(&self, symbol: &str) -> OptionsChain {
        if let Some(cached) = self.options_cache.get(symbol) {
            return cached;
        }

        let exchange = resolve_exchange(symbol);
        let quote = self.get_quote(symbol, exchange, None).await;
        let chain = build_options_chain(symbol, quote.ltp);
        if !chain.strikes.is_empty() {
            self.options_cache.put(symbol.to_string(), chain.clone());
        }
        chain
    }

    pub fn resolve_exchange(&self, symbol: &str) -> Exchange {
        resolve_exchange(symbol)
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.config.fetch_timeout
    }
}

/// Rough reference price used only to scale the simulated tier's bounded
/// daily move; not a quote in its own right.
fn approximate_base_price(symbol: &str) -> f64 {
    match symbol.to_ascii_uppercase().as_str() {
        "GOLD" | "GOLDM" => 72000.0,
        "GOLDPETAL" => 7200.0,
        "SILVER" | "SILVERM" => 85000.0,
        "CRUDEOIL" => 6500.0,
        "NATURALGAS" => 250.0,
        "COPPER" => 850.0,
        "USDINR" => 83.5,
        "EURINR" => 90.0,
        "GBPINR" => 105.0,
        "JPYINR" => 0.56,
        _ => 100.0,
    }
}
