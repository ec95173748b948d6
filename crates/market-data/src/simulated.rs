use chrono::{NaiveDate, Utc};

use crate::types::{Exchange, Quote};

/// Deterministic fallback quote for MCX / CDS symbols when every real tier
/// fails. Seeded on `(symbol, date)` so repeated calls on the same day
/// return the same value; bounded daily move matches the asset class.
pub fn simulated_quote(symbol: &str, exchange: Exchange, base_price: f64) -> Option<Quote> {
    if !matches!(exchange, Exchange::Mcx | Exchange::Cds) {
        return None;
    }

    let today: NaiveDate = Utc::now().date_naive();
    let seed = seed_for(symbol, today);

    let max_move_pct = match exchange {
        Exchange::Mcx => 0.015,
        Exchange::Cds => 0.005,
        _ => unreachable!(),
    };

    // Map the seed into [-max_move_pct, max_move_pct].
    let unit = (seed % 2_000_001) as f64 / 1_000_000.0 - 1.0;
    let change_percent = unit * max_move_pct * 100.0;
    let ltp = base_price * (1.0 + change_percent / 100.0);
    let change = ltp - base_price;

    Some(Quote {
        symbol: symbol.to_string(),
        exchange: Some(exchange),
        ltp,
        change,
        change_percent,
        open: base_price,
        high: base_price.max(ltp),
        low: base_price.min(ltp),
        close: base_price,
        volume: 0.0,
        bid: ltp * 0.999,
        bid_qty: 0,
        ask: ltp * 1.001,
        ask_qty: 0,
        timestamp: Some(Utc::now()),
    })
}

/// FNV-1a over `symbol|date`, kept simple and dependency-free since this is
/// not security sensitive, only a reproducible PRNG seed.
fn seed_for(symbol: &str, date: NaiveDate) -> u64 {
    let key = format!("{symbol}|{date}");
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic_for_same_day() {
        let a = simulated_quote("GOLD", Exchange::Mcx, 60000.0).unwrap();
        let b = simulated_quote("GOLD", Exchange::Mcx, 60000.0).unwrap();
        assert_eq!(a.ltp, b.ltp);
    }

    #[test]
    fn bounds_move_by_asset_class() {
        let gold = simulated_quote("GOLD", Exchange::Mcx, 60000.0).unwrap();
        assert!((gold.change_percent).abs() <= 1.5 + 1e-9);

        let usdinr = simulated_quote("USDINR", Exchange::Cds, 83.0).unwrap();
        assert!((usdinr.change_percent).abs() <= 0.5 + 1e-9);
    }

    #[test]
    fn refuses_equities() {
        assert!(simulated_quote("RELIANCE", Exchange::Nse, 2500.0).is_none());
    }
}
