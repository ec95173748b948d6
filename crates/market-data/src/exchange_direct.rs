use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};

use crate::error::{DataResult, DataStackError};
use crate::types::{Exchange, Quote};

const COOKIE_TTL: Duration = Duration::from_secs(4 * 60);

struct CookieState {
    value: Option<String>,
    obtained_at: Instant,
}

/// Exchange-direct scrape tier. Requires a session cookie obtained via a
/// homepage GET; cookies expire after ~4 minutes. Concurrent scrapes are
/// capped at 2 in flight; a single cookie refresh is deduplicated by holding
/// the state mutex across the refresh `await` so concurrent callers simply
/// queue behind the first refresher instead of each re-fetching.
pub struct ExchangeDirect {
    client: reqwest::Client,
    base_url: String,
    homepage_url: String,
    cookie: Mutex<CookieState>,
    scrape_permits: Arc<Semaphore>,
    timeout: Duration,
}

impl ExchangeDirect {
    pub fn new(client: reqwest::Client, base_url: String, homepage_url: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            homepage_url,
            cookie: Mutex::new(CookieState {
                value: None,
                obtained_at: Instant::now() - COOKIE_TTL,
            }),
            scrape_permits: Arc::new(Semaphore::new(2)),
            timeout,
        }
    }

    async fn fresh_cookie(&self) -> DataResult<String> {
        let mut state = self.cookie.lock().await;
        if state.value.is_some() && state.obtained_at.elapsed() < COOKIE_TTL {
            return Ok(state.value.clone().unwrap());
        }

        let resp = tokio::time::timeout(self.timeout, self.client.get(&self.homepage_url).send())
            .await
            .map_err(|_| DataStackError::Timeout(self.timeout.as_millis() as u64))??;

        let cookie = resp
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(';').next().unwrap_or(s).to_string())
            .ok_or_else(|| DataStackError::InvalidResponse("no session cookie in homepage response".into()))?;

        state.value = Some(cookie.clone());
        state.obtained_at = Instant::now();
        Ok(cookie)
    }

    pub async fn get_quote(&self, symbol: &str, exchange: Exchange) -> DataResult<Quote> {
        let _permit = self
            .scrape_permits
            .acquire()
            .await
            .expect("scrape semaphore never closed");

        let cookie = self.fresh_cookie().await?;
        let url = format!("{}/quote/{}", self.base_url, symbol);

        let resp = tokio::time::timeout(
            self.timeout,
            self.client
                .get(&url)
                .header(reqwest::header::COOKIE, cookie)
                .send(),
        )
        .await
        .map_err(|_| DataStackError::Timeout(self.timeout.as_millis() as u64))??;

        if !resp.status().is_success() {
            return Err(DataStackError::InvalidResponse(format!(
                "exchange-direct returned {}",
                resp.status()
            )));
        }

        let parsed: ScrapeQuote = resp.json().await?;
        let quote = Quote {
            symbol: symbol.to_string(),
            exchange: Some(exchange),
            ltp: parsed.ltp,
            change: parsed.change,
            change_percent: parsed.change_percent,
            open: parsed.open,
            high: parsed.high,
            low: parsed.low,
            close: parsed.close,
            volume: parsed.volume,
            bid: parsed.bid.unwrap_or(0.0),
            bid_qty: parsed.bid_qty.unwrap_or(0),
            ask: parsed.ask.unwrap_or(0.0),
            ask_qty: parsed.ask_qty.unwrap_or(0),
            timestamp: Some(chrono::Utc::now()),
        };

        if !quote.is_valid() {
            return Err(DataStackError::InvalidResponse(
                "exchange-direct returned ltp<=0".into(),
            ));
        }
        Ok(quote)
    }
}

#[derive(Debug, serde::Deserialize)]
struct ScrapeQuote {
    ltp: f64,
    change: f64,
    #[serde(rename = "changePercent")]
    change_percent: f64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    bid: Option<f64>,
    #[serde(rename = "bidQty")]
    bid_qty: Option<i64>,
    ask: Option<f64>,
    #[serde(rename = "askQty")]
    ask_qty: Option<i64>,
}
