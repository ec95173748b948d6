use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use indicator_engine::{
    Direction as EngineDirection, EngineCandle, IndicatorEngine, ScanRequest, SymbolCandles,
};
use llm_client::{ApprovalRequest, FallbackContext, LlmDirection, LlmProvider};
use market_data::{Candle, Interval, MarketDataStack, OptionsChain};
use portfolio_client::{OrderSide, PortfolioClient, Trade};
use uuid::Uuid;

use crate::dedup::SignalDedup;
use crate::gate_scores;
use crate::rolling_accuracy::{classify_outcome, RollingAccuracyTracker};
use crate::types::{
    default_agent_watchlist, AgentMode, BotMessage, BotStatus, CycleReport, CycleSubject,
    GateScores, MessageType, Signal, SignalStatus, SignalType,
};

const MAX_CANDLE_SYMBOLS: usize = 8;
const MIN_CANDLES: usize = 26;
const MAX_CANDLES_KEPT: usize = 50;
const CANDLE_RANGE_DAYS: i64 = 2;
const LLM_FALLBACK_MIN_CONFIDENCE: f64 = 0.6;
const RISK_GATE_MAX_DRAWDOWN_PERCENT: f64 = 10.0;
const SIGNAL_EXPIRY: ChronoDuration = ChronoDuration::hours(24);

pub struct PipelineDeps {
    pub engine: Arc<dyn IndicatorEngine>,
    pub llm: Arc<dyn LlmProvider>,
    pub data: Arc<MarketDataStack>,
    pub portfolio: Arc<dyn PortfolioClient>,
    pub rolling_accuracy: Arc<RollingAccuracyTracker>,
    pub dedup: Arc<SignalDedup>,
}

pub struct SignalPipeline {
    deps: PipelineDeps,
}

impl SignalPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    pub async fn run_cycle(&self, subject: CycleSubject) -> CycleReport {
        let started_at = Instant::now();
        let role = subject.role();

        // 1. Preconditions.
        if let CycleSubject::Bot(bot) = &subject {
            if bot.status != BotStatus::Running {
                return CycleReport::default();
            }
        }
        let circuit_open = self.deps.llm.is_circuit_open();
        let engine_available = self.deps.engine.is_available().await;
        if circuit_open && !engine_available {
            return CycleReport::default();
        }

        // 2. Symbol selection.
        let symbols = self.select_symbols(&subject).await;

        // 3. Candle fetch.
        let candle_sets = self.fetch_candles(&symbols).await;

        let mut report = CycleReport::default();
        report.telemetry.symbols_scanned = symbols.len();

        if candle_sets.is_empty() {
            self.finish(started_at, &subject, &mut report);
            return report;
        }

        // 4. Native scan.
        let autonomous_agent = matches!(
            &subject,
            CycleSubject::Agent { config, .. } if config.mode == AgentMode::Autonomous
        );
        let aggressiveness = role
            .map(|r| r.aggressiveness(autonomous_agent))
            .unwrap_or(indicator_engine::Aggressiveness::Medium);

        let mut engine_signals = Vec::new();
        if engine_available {
            let request = ScanRequest {
                symbols: candle_sets.clone(),
                aggressiveness,
            };
            match self.deps.engine.scan(request).await {
                Ok(response) => engine_signals = response.signals,
                Err(error) => {
                    tracing::warn!(%error, "native engine scan failed, falling back to LLM");
                }
            }
        }

        let vix = self.deps.data.get_vix().await;
        let vix_value = if vix.value > 0.0 { vix.value } else { 18.0 };

        // Fetched once per cycle (not per candidate) for F&O roles so both
        // the native-signal and LLM-fallback gate derivations see real OI
        // data instead of the confidence-only fallback.
        let fno_role = role.map(|r| r.is_fno()).unwrap_or(false);
        let options_chain: Option<OptionsChain> = if fno_role {
            match symbols.first() {
                Some(first_symbol) => Some(self.deps.data.get_options_chain(first_symbol).await),
                None => None,
            }
        } else {
            None
        };

        let skip_llm_validation = role.map(|r| r.skip_llm_validation()).unwrap_or(false);

        let mut candidates: Vec<Candidate> = Vec::new();

        // 5. LLM validation (per engine signal).
        for engine_signal in &engine_signals {
            let mut confidence = engine_signal.confidence;
            let mut llm_gate_scores = None;

            if !skip_llm_validation && !self.deps.llm.is_circuit_open() {
                let request = ApprovalRequest {
                    symbol: engine_signal.symbol.clone(),
                    direction: match engine_signal.direction {
                        EngineDirection::Buy => LlmDirection::Buy,
                        EngineDirection::Sell => LlmDirection::Sell,
                    },
                    confidence,
                    indicators: serde_json::to_value(&engine_signal.indicators).unwrap_or_default(),
                };
                match self.deps.llm.approve_signal(request).await {
                    Ok(approval) => {
                        if !approval.approved {
                            confidence *= 0.8;
                        }
                        llm_gate_scores = approval.gate_scores;
                    }
                    Err(_) => {
                        // Default to approved when the LLM call fails.
                    }
                }
            }

            candidates.push(Candidate {
                symbol: engine_signal.symbol.clone(),
                signal_type: match engine_signal.direction {
                    EngineDirection::Buy => SignalType::Buy,
                    EngineDirection::Sell => SignalType::Sell,
                },
                confidence,
                rationale: format!(
                    "native engine {:?} confidence={:.2}",
                    engine_signal.direction, confidence
                ),
                gate_scores: gate_scores::resolve(
                    engine_signal,
                    vix_value,
                    options_chain.as_ref(),
                    llm_gate_scores.as_ref(),
                ),
            });
        }

        // 6. LLM fallback path.
        if (!engine_available || engine_signals.is_empty()) && !self.deps.llm.is_circuit_open() {
            let mut quotes = std::collections::HashMap::new();
            let mut recent_history = std::collections::HashMap::new();
            for set in &candle_sets {
                if let Some(last) = set.candles.last() {
                    quotes.insert(set.symbol.clone(), last.close);
                }
                recent_history.insert(
                    set.symbol.clone(),
                    set.candles.iter().map(|c| c.close).collect(),
                );
            }
            let open_positions = self
                .deps
                .portfolio
                .list_positions()
                .await
                .map(|positions| positions.into_iter().map(|p| p.symbol).collect())
                .unwrap_or_default();

            let options_context = options_chain.as_ref().and_then(|chain| serde_json::to_value(chain).ok());

            let context = FallbackContext {
                quotes,
                recent_history,
                open_positions,
                options_context,
            };

            if let Ok(response) = self.deps.llm.propose_signals(context).await {
                for proposed in response.signals {
                    if proposed.confidence < LLM_FALLBACK_MIN_CONFIDENCE {
                        continue;
                    }
                    let signal_type = match proposed.action.to_ascii_uppercase().as_str() {
                        "BUY" => SignalType::Buy,
                        "SELL" => SignalType::Sell,
                        _ => continue,
                    };
                    let fallback_engine_signal = indicator_engine::EngineSignal {
                        symbol: proposed.symbol.clone(),
                        direction: match signal_type {
                            SignalType::Buy => EngineDirection::Buy,
                            SignalType::Sell => EngineDirection::Sell,
                        },
                        confidence: proposed.confidence,
                        entry: 0.0,
                        stop_loss: 0.0,
                        target: 0.0,
                        indicators: Default::default(),
                        votes: Default::default(),
                    };
                    candidates.push(Candidate {
                        symbol: proposed.symbol,
                        signal_type,
                        confidence: proposed.confidence,
                        rationale: "LLM fallback signal (native engine unavailable)".to_string(),
                        gate_scores: gate_scores::resolve(
                            &fallback_engine_signal,
                            vix_value,
                            options_chain.as_ref(),
                            proposed.gate_scores.as_ref(),
                        ),
                    });
                }
            }
        }

        report.telemetry.signals_generated = candidates.len();

        // 7-13: per-candidate gate, dedup, execution, outcome, auto-pause.
        for candidate in candidates {
            self.process_candidate(&subject, candidate, &mut report).await;
        }

        self.finish(started_at, &subject, &mut report);
        report
    }

    async fn select_symbols(&self, subject: &CycleSubject) -> Vec<String> {
        match subject {
            CycleSubject::Bot(bot) => bot.symbols_or_default(),
            CycleSubject::Agent {
                open_position_symbols,
                ..
            } => {
                if open_position_symbols.is_empty() {
                    default_agent_watchlist()
                } else {
                    let mut symbols = open_position_symbols.clone();
                    symbols.sort();
                    symbols.dedup();
                    symbols
                }
            }
            CycleSubject::MarketScan => {
                let mut quotes = Vec::new();
                for symbol in market_data::catalogue::EQUITIES.iter().map(|(s, _)| *s) {
                    let exchange = self.deps.data.resolve_exchange(symbol);
                    let quote = self.deps.data.get_quote(symbol, exchange, None).await;
                    quotes.push((symbol.to_string(), quote));
                }
                let movers = self.deps.data.get_top_movers(10, &quotes);
                let mut symbols: Vec<String> = movers
                    .gainers
                    .into_iter()
                    .chain(movers.losers)
                    .map(|m| m.symbol)
                    .collect();
                symbols.sort();
                symbols.dedup();
                symbols
            }
        }
    }

    async fn fetch_candles(&self, symbols: &[String]) -> Vec<SymbolCandles> {
        let mut out = Vec::new();
        for symbol in symbols.iter().take(MAX_CANDLE_SYMBOLS) {
            let exchange = self.deps.data.resolve_exchange(symbol);
            let candles = self
                .deps
                .data
                .get_history(symbol, exchange, Interval::Min5, CANDLE_RANGE_DAYS)
                .await;
            if candles.len() < MIN_CANDLES {
                continue;
            }
            let kept: Vec<Candle> = candles
                .into_iter()
                .rev()
                .take(MAX_CANDLES_KEPT)
                .rev()
                .collect();
            out.push(SymbolCandles {
                symbol: symbol.clone(),
                candles: kept.into_iter().map(to_engine_candle).collect(),
            });
        }
        out
    }

    async fn process_candidate(
        &self,
        subject: &CycleSubject,
        candidate: Candidate,
        report: &mut CycleReport,
    ) {
        let user_id = subject.user_id().to_string();
        let bot_id = subject.bot_id();
        let strategy_id = match subject {
            CycleSubject::Bot(bot) => bot.assigned_strategy.clone(),
            _ => candidate.symbol.clone(),
        };

        // 8. Risk gate (agent only).
        if matches!(subject, CycleSubject::Agent { .. }) {
            if let Ok(Some(risk)) = self.deps.portfolio.portfolio_risk().await {
                if risk.max_drawdown_percent > RISK_GATE_MAX_DRAWDOWN_PERCENT {
                    return;
                }
            }
        }

        // Duplicate avoidance.
        if self
            .deps
            .dedup
            .should_coalesce(&user_id, &candidate.symbol, candidate.signal_type)
        {
            return;
        }

        // 9. Execution decision.
        let should_auto_execute = match subject {
            CycleSubject::Bot(bot) => {
                bot.role.auto_executes() && candidate.confidence >= bot.role.auto_execute_threshold()
            }
            CycleSubject::Agent { config, .. } => {
                config.mode == AgentMode::Autonomous && candidate.confidence >= 0.65
            }
            CycleSubject::MarketScan => false,
        };

        let qualifies = candidate.confidence >= 0.65;
        if !should_auto_execute && !qualifies {
            return;
        }

        let now = Utc::now();
        let mut signal = Signal {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            symbol: candidate.symbol.clone(),
            signal_type: candidate.signal_type,
            composite_score: candidate.confidence,
            gate_scores: candidate.gate_scores,
            rationale: candidate.rationale.clone(),
            status: SignalStatus::Pending,
            strategy_id: Some(strategy_id.clone()),
            created_at: now,
            executed_at: None,
            expires_at: now + SIGNAL_EXPIRY,
            outcome_tag: None,
        };

        if should_auto_execute {
            self.execute_signal(subject, &mut signal, &candidate, report).await;
        }

        report.messages.push(BotMessage::new(
            bot_id,
            user_id,
            MessageType::Signal,
            format!(
                "{:?} {} confidence={:.2} status={:?}",
                candidate.signal_type, candidate.symbol, candidate.confidence, signal.status
            ),
        ));
        report.signals.push(signal);
    }

    async fn execute_signal(
        &self,
        subject: &CycleSubject,
        signal: &mut Signal,
        candidate: &Candidate,
        report: &mut CycleReport,
    ) {
        let exchange = self.deps.data.resolve_exchange(&candidate.symbol);
        let quote = self.deps.data.get_quote(&candidate.symbol, exchange, None).await;
        if !quote.is_valid() {
            return;
        }

        let outcomes = self
            .deps
            .portfolio
            .recent_trade_outcomes(&candidate.symbol, 30)
            .await
            .unwrap_or_default();
        let history: Vec<kelly_position_sizer::ClosedTradeOutcome> = outcomes
            .into_iter()
            .map(|net_pnl| kelly_position_sizer::ClosedTradeOutcome { net_pnl })
            .collect();
        let allocation = kelly_position_sizer::half_kelly_allocation(&history);
        let nav = self.deps.portfolio.nav().await.unwrap_or(0.0);
        let quantity = kelly_position_sizer::quantity_for_allocation(nav, allocation, quote.ltp);

        let side = match candidate.signal_type {
            SignalType::Buy => OrderSide::Buy,
            SignalType::Sell => OrderSide::Sell,
        };

        let strategy_tag = signal
            .strategy_id
            .clone()
            .unwrap_or_else(|| candidate.symbol.clone());

        match self
            .deps
            .portfolio
            .submit_order(&candidate.symbol, side, quantity as f64, quote.ltp, &strategy_tag)
            .await
        {
            Ok(order) => {
                signal.status = SignalStatus::Executed;
                signal.executed_at = Some(Utc::now());
                report.telemetry.signals_executed += 1;

                // 11/12. Outcome capture + auto-pause, when this order
                // netted against an existing opposite-side position.
                if let Some(trade) = order.closed_trade {
                    self.record_realized_outcome(
                        subject.user_id(),
                        subject.bot_id(),
                        &strategy_tag,
                        trade,
                        report,
                    );
                }
            }
            Err(error) => {
                tracing::warn!(%error, symbol = %candidate.symbol, "order submission failed");
            }
        }
    }

    fn finish(&self, started_at: Instant, subject: &CycleSubject, report: &mut CycleReport) {
        report.telemetry.duration_ms = started_at.elapsed().as_millis() as u64;
        let role_label = subject.role().map(|r| format!("{r:?}"));
        tracing::info!(
            bot_id = ?subject.bot_id(),
            role = ?role_label,
            symbols_scanned = report.telemetry.symbols_scanned,
            signals_generated = report.telemetry.signals_generated,
            signals_executed = report.telemetry.signals_executed,
            duration_ms = report.telemetry.duration_ms,
            "cycle complete"
        );

        // Stage 13: exactly one summary message per cycle, on top of the
        // per-signal messages `process_candidate` already pushed and the
        // alert `record_realized_outcome` pushes on auto-pause.
        let message_type = if report.auto_paused {
            MessageType::Alert
        } else if report.telemetry.signals_generated > 0 {
            MessageType::Signal
        } else {
            MessageType::Info
        };
        let summary = if report.telemetry.symbols_scanned == 0 {
            "cycle complete: no symbols selected".to_string()
        } else if report.telemetry.signals_generated == 0 {
            format!(
                "cycle complete: {} symbols scanned, no signals generated",
                report.telemetry.symbols_scanned
            )
        } else {
            format!(
                "cycle complete: {} symbols scanned, {} signals generated, {} executed",
                report.telemetry.symbols_scanned,
                report.telemetry.signals_generated,
                report.telemetry.signals_executed
            )
        };
        report.messages.push(BotMessage::new(
            subject.bot_id(),
            subject.user_id(),
            message_type,
            summary,
        ));
    }

    /// Closes a position outright (stop-loss, take-profit, or explicit
    /// user action) and feeds the realised outcome into the rolling
    /// accuracy window, auto-pausing the owning bot when accuracy falls
    /// below threshold.
    pub async fn close_and_record(
        &self,
        subject: &CycleSubject,
        symbol: &str,
        fill_price: f64,
        strategy_id: &str,
    ) -> anyhow::Result<CycleReport> {
        let mut report = CycleReport::default();
        let trade = self.deps.portfolio.close_position(symbol, fill_price).await?;
        self.record_realized_outcome(subject.user_id(), subject.bot_id(), strategy_id, trade, &mut report);
        Ok(report)
    }

    /// Same bookkeeping as `close_and_record`, for callers (the HTTP
    /// execute-signal route) that already hold a realised `Trade` — e.g.
    /// one surfaced via `OrderResult::closed_trade` — rather than a
    /// `CycleSubject` to drive `close_position` through.
    pub fn record_executed_close(
        &self,
        user_id: &str,
        bot_id: Option<Uuid>,
        strategy_id: &str,
        trade: Trade,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        self.record_realized_outcome(user_id, bot_id, strategy_id, trade, &mut report);
        report
    }

    /// 11. Outcome capture + 12. auto-pause, shared by every code path
    /// that realises P&L on a symbol: a full `close_position` call, and a
    /// `submit_order` that happened to net against an opposite-side
    /// position.
    fn record_realized_outcome(
        &self,
        user_id: &str,
        bot_id: Option<Uuid>,
        strategy_id: &str,
        trade: Trade,
        report: &mut CycleReport,
    ) {
        let outcome = classify_outcome(trade.net_pnl);
        self.deps.rolling_accuracy.record(strategy_id, outcome);

        report.messages.push(BotMessage::new(
            bot_id,
            user_id,
            MessageType::TradeRequest,
            format!(
                "closed {} net_pnl={:.2} outcome={:?}",
                trade.symbol, trade.net_pnl, outcome
            ),
        ));

        const AUTO_PAUSE_ACCURACY: f64 = 0.35;
        if self.deps.rolling_accuracy.window_len(strategy_id) >= 5 {
            if let Some(accuracy) = self.deps.rolling_accuracy.accuracy(strategy_id) {
                if accuracy < AUTO_PAUSE_ACCURACY {
                    report.auto_paused = true;
                    report.messages.push(BotMessage::new(
                        bot_id,
                        user_id,
                        MessageType::Alert,
                        format!(
                            "auto-paused strategy {strategy_id}: accuracy {:.0}% below threshold",
                            accuracy * 100.0
                        ),
                    ));
                }
            }
        }
    }
}

struct Candidate {
    symbol: String,
    signal_type: SignalType,
    confidence: f64,
    rationale: String,
    gate_scores: GateScores,
}

fn to_engine_candle(candle: Candle) -> EngineCandle {
    EngineCandle {
        timestamp: candle.timestamp.timestamp(),
        open: candle.open,
        high: candle.high,
        low: candle.low,
        close: candle.close,
        volume: candle.volume,
    }
}
