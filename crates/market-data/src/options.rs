use crate::types::{OptionStrike, OptionsChain};

/// Builds an options chain around the current LTP. Real deployments would
/// source this from the exchange-direct or broker tiers; lacking a live
/// options feed for paper trading, strikes are synthesized deterministically
/// from the underlying quote so `pcr`/`maxPain` stay well-defined and stable
/// within a cache window.
pub fn build_options_chain(symbol: &str, ltp: f64) -> OptionsChain {
    if ltp <= 0.0 {
        return OptionsChain {
            symbol: symbol.to_string(),
            strikes: Vec::new(),
            pcr: 0.0,
            max_pain: 0.0,
            total_call_oi: 0.0,
            total_put_oi: 0.0,
        };
    }

    let step = strike_step(ltp);
    let atm = (ltp / step).round() * step;

    let mut strikes = Vec::new();
    for offset in -5..=5 {
        let strike = atm + offset as f64 * step;
        if strike <= 0.0 {
            continue;
        }
        let distance = (strike - ltp).abs() / ltp;
        // OI peaks near the money and decays with distance, matching the
        // usual smile-shaped open-interest profile.
        let base_oi = 500_000.0 * (-distance * 8.0).exp();
        let call_oi = base_oi * if strike >= ltp { 1.15 } else { 0.85 };
        let put_oi = base_oi * if strike <= ltp { 1.15 } else { 0.85 };

        strikes.push(OptionStrike {
            strike,
            call_oi,
            call_volume: call_oi * 0.2,
            call_iv: 14.0 + distance * 40.0,
            call_ltp: (ltp - strike).max(0.0) + ltp * 0.01,
            put_oi,
            put_volume: put_oi * 0.2,
            put_iv: 14.0 + distance * 40.0,
            put_ltp: (strike - ltp).max(0.0) + ltp * 0.01,
        });
    }

    let total_call_oi: f64 = strikes.iter().map(|s| s.call_oi).sum();
    let total_put_oi: f64 = strikes.iter().map(|s| s.put_oi).sum();
    let pcr = if total_call_oi > 0.0 {
        total_put_oi / total_call_oi
    } else {
        0.0
    };
    let max_pain = compute_max_pain(&strikes);

    OptionsChain {
        symbol: symbol.to_string(),
        strikes,
        pcr,
        max_pain,
        total_call_oi,
        total_put_oi,
    }
}

fn strike_step(ltp: f64) -> f64 {
    if ltp >= 10_000.0 {
        100.0
    } else if ltp >= 1_000.0 {
        20.0
    } else {
        5.0
    }
}

/// Max pain: the strike at which aggregate option-buyer loss is maximised at
/// expiry, equivalently where the option *writer's* payout is minimised.
fn compute_max_pain(strikes: &[OptionStrike]) -> f64 {
    strikes
        .iter()
        .map(|candidate| {
            let loss: f64 = strikes
                .iter()
                .map(|s| {
                    let call_loss = (candidate.strike - s.strike).max(0.0) * s.call_oi;
                    let put_loss = (s.strike - candidate.strike).max(0.0) * s.put_oi;
                    call_loss + put_loss
                })
                .sum();
            (candidate.strike, loss)
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(strike, _)| strike)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcr_and_max_pain_are_well_defined() {
        let chain = build_options_chain("NIFTY 50", 24800.0);
        assert!(!chain.strikes.is_empty());
        assert!(chain.pcr > 0.0);
        assert!(chain.max_pain > 0.0);
    }

    #[test]
    fn handles_zero_ltp_gracefully() {
        let chain = build_options_chain("X", 0.0);
        assert!(chain.strikes.is_empty());
        assert_eq!(chain.pcr, 0.0);
    }
}
