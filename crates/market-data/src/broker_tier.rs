use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::{DataResult, DataStackError};
use crate::types::{Exchange, Quote};

/// Per-user broker credentials, already decrypted by the (out-of-scope)
/// credential store. This tier only ever sees plaintext API key/secret; it
/// never touches the encrypted-at-rest form or the server secret used to
/// derive the decryption key.
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub api_key: String,
    pub api_secret: String,
}

pub struct BrokerApiTier {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl BrokerApiTier {
    pub fn new(client: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// Checksum is SHA-256 of `timestamp + payload + secret`, matching the
    /// broker API's signing scheme.
    fn checksum(timestamp: &str, payload: &str, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(timestamp.as_bytes());
        hasher.update(payload.as_bytes());
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn get_quote(
        &self,
        symbol: &str,
        exchange: Exchange,
        creds: &BrokerCredentials,
    ) -> DataResult<Quote> {
        let timestamp = Utc::now().timestamp().to_string();
        let payload = format!("symbol={symbol}&exchange={exchange}");
        let checksum = Self::checksum(&timestamp, &payload, &creds.api_secret);

        let url = format!("{}/quote", self.base_url);
        let resp = tokio::time::timeout(
            self.timeout,
            self.client
                .get(&url)
                .header("X-Api-Key", &creds.api_key)
                .header("X-Timestamp", &timestamp)
                .header("X-Checksum", &checksum)
                .query(&[("symbol", symbol), ("exchange", exchange.as_str())])
                .send(),
        )
        .await
        .map_err(|_| DataStackError::Timeout(self.timeout.as_millis() as u64))??;

        if !resp.status().is_success() {
            return Err(DataStackError::InvalidResponse(format!(
                "broker API returned {}",
                resp.status()
            )));
        }

        let parsed: BrokerQuote = resp.json().await?;
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
            bid: 0.0,
            bid_qty: 0,
            ask: 0.0,
            ask_qty: 0,
            timestamp: Some(Utc::now()),
        };

        if !quote.is_valid() {
            return Err(DataStackError::InvalidResponse(
                "broker API returned ltp<=0".into(),
            ));
        }
        Ok(quote)
    }
}

#[derive(Debug, serde::Deserialize)]
struct BrokerQuote {
    ltp: f64,
    change: f64,
    #[serde(rename = "changePercent")]
    change_percent: f64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        let a = BrokerApiTier::checksum("1700000000", "symbol=RELIANCE", "secret");
        let b = BrokerApiTier::checksum("1700000000", "symbol=RELIANCE", "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
