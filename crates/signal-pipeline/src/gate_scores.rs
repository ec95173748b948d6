use std::collections::HashMap;

use indicator_engine::EngineSignal;
use market_data::OptionsChain;

use crate::types::GateScores;

fn clamp_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Deterministic derivation per the gate table; used whenever the LLM
/// doesn't supply its own scores.
fn derive(signal: &EngineSignal, vix: f64, options: Option<&OptionsChain>) -> GateScores {
    let confidence = signal.confidence;
    let indicators = &signal.indicators;
    let votes = &signal.votes;

    let g1 = clamp_u8(
        indicators.adx.unwrap_or(20.0)
            + votes.ema_cross.unwrap_or(0.0) * 10.0
            + votes.supertrend.unwrap_or(0.0) * 10.0,
    );

    let rsi_distance = (indicators.rsi_14.unwrap_or(50.0) - 50.0).abs() * 2.0;
    let g2 = clamp_u8(rsi_distance + votes.macd.unwrap_or(0.0) * 20.0);

    let vix_component = (100.0 - (vix - 10.0).max(0.0) * 4.0).clamp(0.0, 100.0);
    let g3 = clamp_u8(vix_component * 0.7 + votes.bollinger.unwrap_or(0.0) * 30.0);

    let g4 = clamp_u8(confidence * 60.0 + votes.volume.unwrap_or(0.0) * 40.0);

    let g5 = clamp_u8(match options {
        Some(chain) if chain.pcr > 0.0 => 100.0 - (chain.pcr - 1.0).abs() * 50.0,
        _ => confidence * 50.0 + 20.0,
    });

    let g6 = clamp_u8(match vix {
        v if v < 15.0 => 80.0,
        v if v < 20.0 => 65.0,
        v if v < 25.0 => 50.0,
        v if v < 30.0 => 35.0,
        _ => 20.0,
    });

    // No advance/decline breadth feed in this core; always the fallback.
    let g7 = clamp_u8(confidence * 50.0 + 25.0);

    let g8 = clamp_u8(votes.positive_fraction() * 80.0 + 10.0);

    let risk_reward = if (signal.entry - signal.stop_loss).abs() > f64::EPSILON {
        ((signal.target - signal.entry) / (signal.entry - signal.stop_loss)).abs()
    } else {
        0.0
    };
    let g9 = clamp_u8(confidence * 80.0 + (risk_reward * 10.0).clamp(0.0, 20.0));

    GateScores {
        g1_trend: g1,
        g2_momentum: g2,
        g3_volatility: g3,
        g4_volume: g4,
        g5_options_flow: g5,
        g6_global_macro: g6,
        g7_fii_dii: g7,
        g8_sentiment: g8,
        g9_risk: g9,
        source: "derived".to_string(),
        indicators: serde_json::to_value(indicators).ok(),
        votes: serde_json::to_value(votes).ok(),
    }
}

/// Prefers LLM-supplied scores (keys `g1`..`g9`) over the deterministic
/// derivation, filling any missing key from the derivation.
pub fn resolve(
    signal: &EngineSignal,
    vix: f64,
    options: Option<&OptionsChain>,
    llm_scores: Option<&HashMap<String, i32>>,
) -> GateScores {
    let derived = derive(signal, vix, options);

    let Some(llm_scores) = llm_scores else {
        return derived;
    };
    if llm_scores.is_empty() {
        return derived;
    }

    let pick = |key: &str, fallback: u8| -> u8 {
        llm_scores
            .get(key)
            .map(|v| (*v).clamp(0, 100) as u8)
            .unwrap_or(fallback)
    };

    GateScores {
        g1_trend: pick("g1", derived.g1_trend),
        g2_momentum: pick("g2", derived.g2_momentum),
        g3_volatility: pick("g3", derived.g3_volatility),
        g4_volume: pick("g4", derived.g4_volume),
        g5_options_flow: pick("g5", derived.g5_options_flow),
        g6_global_macro: pick("g6", derived.g6_global_macro),
        g7_fii_dii: pick("g7", derived.g7_fii_dii),
        g8_sentiment: pick("g8", derived.g8_sentiment),
        g9_risk: pick("g9", derived.g9_risk),
        source: "llm".to_string(),
        indicators: derived.indicators,
        votes: derived.votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicator_engine::{Direction, EngineIndicators, EngineVotes};

    fn sample_signal() -> EngineSignal {
        EngineSignal {
            symbol: "RELIANCE".into(),
            direction: Direction::Buy,
            confidence: 0.72,
            entry: 100.0,
            stop_loss: 98.0,
            target: 106.0,
            indicators: EngineIndicators {
                ema_9: Some(101.0),
                ema_21: Some(99.0),
                rsi_14: Some(61.0),
                macd_histogram: Some(0.4),
                supertrend: Some(1.0),
                vwap: Some(100.5),
                adx: Some(28.0),
                atr: Some(1.2),
                extra: Default::default(),
            },
            votes: EngineVotes {
                ema_cross: Some(1.0),
                macd: Some(1.0),
                supertrend: Some(1.0),
                bollinger: Some(0.0),
                volume: Some(1.0),
                extra: Default::default(),
            },
        }
    }

    #[test]
    fn derived_scores_are_all_within_bounds() {
        let scores = derive(&sample_signal(), 14.0, None);
        for value in [
            scores.g1_trend,
            scores.g2_momentum,
            scores.g3_volatility,
            scores.g4_volume,
            scores.g5_options_flow,
            scores.g6_global_macro,
            scores.g7_fii_dii,
            scores.g8_sentiment,
            scores.g9_risk,
        ] {
            assert!(value <= 100);
        }
        assert_eq!(scores.source, "derived");
    }

    #[test]
    fn llm_scores_override_derived_and_report_llm_source() {
        let mut llm = HashMap::new();
        llm.insert("g1".to_string(), 90);
        let scores = resolve(&sample_signal(), 14.0, None, Some(&llm));
        assert_eq!(scores.g1_trend, 90);
        assert_eq!(scores.source, "llm");
        // g2 wasn't supplied, falls back to the derived value.
        let derived = derive(&sample_signal(), 14.0, None);
        assert_eq!(scores.g2_momentum, derived.g2_momentum);
    }

    #[test]
    fn empty_llm_map_falls_back_to_derived() {
        let empty = HashMap::new();
        let scores = resolve(&sample_signal(), 14.0, None, Some(&empty));
        assert_eq!(scores.source, "derived");
    }
}
