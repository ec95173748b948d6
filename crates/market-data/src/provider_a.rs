use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{DataResult, DataStackError};
use crate::types::{Candle, Exchange, Quote};

/// Index-symbol aliases the public chart provider expects instead of the
/// plain NSE/BSE ticker.
fn index_alias(symbol: &str) -> Option<&'static str> {
    match symbol.to_ascii_uppercase().as_str() {
        "NIFTY 50" | "NIFTY50" => Some("^NSEI"),
        "BANKNIFTY" => Some("^NSEBANK"),
        "SENSEX" => Some("^BSESN"),
        "INDIA VIX" => Some("^INDIAVIX"),
        _ => None,
    }
}

/// Builds the provider-A wire symbol: index aliases first, else the plain
/// symbol with the exchange suffix (`.NS` for NSE, `.BO` for BSE), with `&`
/// percent-encoded since the provider's query string otherwise truncates at it.
fn wire_symbol(symbol: &str, exchange: Exchange) -> String {
    if let Some(alias) = index_alias(symbol) {
        return alias.to_string();
    }
    let suffixed = match exchange {
        Exchange::Nse => format!("{symbol}.NS"),
        Exchange::Bse => format!("{symbol}.BO"),
        Exchange::Mcx | Exchange::Cds => symbol.to_string(),
    };
    suffixed.replace('&', "%26")
}

pub struct ProviderA {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ProviderA {
    pub fn new(client: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    pub async fn get_quote(&self, symbol: &str, exchange: Exchange) -> DataResult<Quote> {
        let wire = wire_symbol(symbol, exchange);
        let url = format!("{}/chart/{}", self.base_url, wire);
        let resp = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| DataStackError::Timeout(self.timeout.as_millis() as u64))??;

        if !resp.status().is_success() {
            return Err(DataStackError::InvalidResponse(format!(
                "provider A returned {}",
                resp.status()
            )));
        }

        let parsed: ChartResponse = resp.json().await?;
        let quote = parsed.into_quote(symbol, exchange)?;
        if !quote.is_valid() {
            return Err(DataStackError::InvalidResponse(
                "provider A returned ltp<=0".into(),
            ));
        }
        Ok(quote)
    }

    pub async fn get_history(
        &self,
        symbol: &str,
        exchange: Exchange,
        interval: &str,
        range_days: i64,
    ) -> DataResult<Vec<Candle>> {
        let wire = wire_symbol(symbol, exchange);
        let url = format!(
            "{}/chart/{}?interval={}&range_days={}",
            self.base_url, wire, interval, range_days
        );
        let resp = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| DataStackError::Timeout(self.timeout.as_millis() as u64))??;

        if !resp.status().is_success() {
            return Err(DataStackError::InvalidResponse(format!(
                "provider A returned {}",
                resp.status()
            )));
        }

        let parsed: ChartResponse = resp.json().await?;
        parsed.into_candles()
    }
}

/// Shape of a typical public chart-API response: parallel `timestamp` and
/// OHLCV arrays under a single `result` entry.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    result: Vec<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "previousClose")]
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuoteArrays>,
}

#[derive(Debug, Deserialize)]
struct ChartQuoteArrays {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

impl ChartResponse {
    fn into_quote(self, symbol: &str, exchange: Exchange) -> DataResult<Quote> {
        let first = self
            .result
            .into_iter()
            .next()
            .ok_or_else(|| DataStackError::InvalidResponse("empty result array".into()))?;

        let ltp = first.meta.regular_market_price.unwrap_or(0.0);
        let close = first.meta.previous_close.unwrap_or(ltp);
        let change = ltp - close;
        let change_percent = if close > 0.0 { change / close * 100.0 } else { 0.0 };

        Ok(Quote {
            symbol: symbol.to_string(),
            exchange: Some(exchange),
            ltp,
            change,
            change_percent,
            open: ltp,
            high: ltp,
            low: ltp,
            close,
            volume: 0.0,
            bid: 0.0,
            bid_qty: 0,
            ask: 0.0,
            ask_qty: 0,
            timestamp: Some(Utc::now()),
        })
    }

    fn into_candles(self) -> DataResult<Vec<Candle>> {
        let first = self
            .result
            .into_iter()
            .next()
            .ok_or_else(|| DataStackError::InvalidResponse("empty result array".into()))?;

        let timestamps = first.timestamp.unwrap_or_default();
        let arrays = first
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataStackError::InvalidResponse("no quote arrays".into()))?;

        let open = arrays.open.unwrap_or_default();
        let high = arrays.high.unwrap_or_default();
        let low = arrays.low.unwrap_or_default();
        let close = arrays.close.unwrap_or_default();
        let volume = arrays.volume.unwrap_or_default();

        let mut candles = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.iter().enumerate() {
            let timestamp: DateTime<Utc> = Utc.timestamp_opt(*ts, 0).single().unwrap_or_else(Utc::now);
            let o = open.get(i).copied().flatten();
            let h = high.get(i).copied().flatten();
            let l = low.get(i).copied().flatten();
            let c = close.get(i).copied().flatten();
            let v = volume.get(i).copied().flatten();
            if let (Some(o), Some(h), Some(l), Some(c)) = (o, h, l, c) {
                candles.push(Candle {
                    timestamp,
                    open: o,
                    high: h,
                    low: l,
                    close: c,
                    volume: v.unwrap_or(0.0),
                });
            }
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_known_indices() {
        assert_eq!(wire_symbol("NIFTY 50", Exchange::Nse), "^NSEI");
        assert_eq!(wire_symbol("BANKNIFTY", Exchange::Nse), "^NSEBANK");
        assert_eq!(wire_symbol("SENSEX", Exchange::Bse), "^BSESN");
    }

    #[test]
    fn suffixes_plain_equities() {
        assert_eq!(wire_symbol("RELIANCE", Exchange::Nse), "RELIANCE.NS");
        assert_eq!(wire_symbol("RELIANCE", Exchange::Bse), "RELIANCE.BO");
    }

    #[test]
    fn escapes_ampersand() {
        assert_eq!(wire_symbol("M&M", Exchange::Nse), "M%26M.NS");
    }
}
