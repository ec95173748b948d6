use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Timelike, Utc};
use portfolio_client::OrderSide;
use serde::{Deserialize, Serialize};
use signal_pipeline::{AgentConfig, AgentMode, Signal, SignalStatus, SignalType};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ApiResponse;

const MARKET_HOURS_REFRESH: chrono::Duration = chrono::Duration::minutes(10);
const OFF_HOURS_REFRESH: chrono::Duration = chrono::Duration::minutes(30);

#[derive(Deserialize)]
pub struct UserQuery {
    #[serde(default = "default_user")]
    pub user_id: String,
}

fn default_user() -> String {
    "default-user".to_string()
}

#[derive(Deserialize)]
pub struct StartAgent {
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default = "default_agent_mode")]
    pub mode: AgentMode,
    #[serde(default = "default_min_signal_score")]
    pub min_signal_score: f64,
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
}

fn default_agent_mode() -> AgentMode {
    AgentMode::Advisory
}

fn default_min_signal_score() -> f64 {
    0.65
}

fn default_max_daily_trades() -> u32 {
    10
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub is_active: bool,
    pub mode: Option<AgentMode>,
    pub today_signals: usize,
    pub today_trades: usize,
    pub uptime_seconds: u64,
    pub rust_engine: bool,
}

pub async fn agent_status(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<ApiResponse<AgentStatus>> {
    let config = state.agents.get(&query.user_id);
    let rust_engine = state.engine.is_available().await;

    Json(ApiResponse::success(AgentStatus {
        is_active: config.as_ref().map(|c| c.is_active).unwrap_or(false),
        mode: config.map(|c| c.mode),
        today_signals: state.signals.count_today(&query.user_id, None),
        today_trades: state
            .signals
            .count_today(&query.user_id, Some(SignalStatus::Executed)),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        rust_engine,
    }))
}

pub async fn start_agent(
    State(state): State<AppState>,
    Json(body): Json<StartAgent>,
) -> Json<ApiResponse<serde_json::Value>> {
    state.agents.set(
        body.user_id.clone(),
        AgentConfig {
            mode: body.mode,
            is_active: true,
            min_signal_score: body.min_signal_score,
            max_daily_trades: body.max_daily_trades,
        },
    );
    state.scheduler.start_agent(body.user_id).await;
    Json(ApiResponse::success(serde_json::json!({ "started": true })))
}

pub async fn stop_agent(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<ApiResponse<serde_json::Value>> {
    if let Some(mut config) = state.agents.get(&query.user_id) {
        config.is_active = false;
        state.agents.set(query.user_id.clone(), config);
    }
    state.scheduler.stop_agent(&query.user_id);
    Json(ApiResponse::success(serde_json::json!({ "stopped": true })))
}

#[derive(Deserialize)]
pub struct SignalsQuery {
    pub status: Option<SignalStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<SignalsQuery>,
) -> Json<ApiResponse<Vec<Signal>>> {
    Json(ApiResponse::success(state.signals.list(query.status, query.limit)))
}

pub async fn execute_signal(
    State(state): State<AppState>,
    Path(signal_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Signal>>> {
    let signal = state
        .signals
        .get(signal_id)
        .ok_or_else(|| AppError::NotFound(format!("signal {signal_id} not found")))?;
    if signal.status != SignalStatus::Pending {
        return Err(AppError::Validation(format!(
            "signal {signal_id} is not PENDING (status={:?})",
            signal.status
        )));
    }

    let exchange = state.data.resolve_exchange(&signal.symbol);
    let quote = state.data.get_quote(&signal.symbol, exchange, None).await;
    if !quote.is_valid() {
        return Err(AppError::Validation(format!(
            "no valid quote available for {}",
            signal.symbol
        )));
    }

    let outcomes = state
        .portfolio
        .recent_trade_outcomes(&signal.symbol, 30)
        .await
        .unwrap_or_default();
    let history: Vec<kelly_position_sizer::ClosedTradeOutcome> = outcomes
        .into_iter()
        .map(|net_pnl| kelly_position_sizer::ClosedTradeOutcome { net_pnl })
        .collect();
    let allocation = kelly_position_sizer::half_kelly_allocation(&history);
    let nav = state.portfolio.nav().await.unwrap_or(0.0);
    let quantity = kelly_position_sizer::quantity_for_allocation(nav, allocation, quote.ltp);

    let side = match signal.signal_type {
        SignalType::Buy => OrderSide::Buy,
        SignalType::Sell => OrderSide::Sell,
    };
    let strategy_tag = signal
        .strategy_id
        .clone()
        .unwrap_or_else(|| signal.symbol.clone());

    let order = state
        .portfolio
        .submit_order(&signal.symbol, side, quantity as f64, quote.ltp, &strategy_tag)
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if let Some(trade) = order.closed_trade {
        let report = state.pipeline.record_executed_close(&signal.user_id, None, &strategy_tag, trade);
        state.messages.push_many(report.messages);
        if report.auto_paused {
            tracing::warn!(user_id = %signal.user_id, strategy = %strategy_tag, "strategy auto-paused via HTTP execute");
        }
    }

    let updated = state
        .signals
        .update(signal_id, |s| {
            s.status = SignalStatus::Executed;
            s.executed_at = Some(Utc::now());
        })
        .expect("checked above");
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn reject_signal(
    State(state): State<AppState>,
    Path(signal_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Signal>>> {
    let signal = state
        .signals
        .get(signal_id)
        .ok_or_else(|| AppError::NotFound(format!("signal {signal_id} not found")))?;
    if signal.status != SignalStatus::Pending {
        return Err(AppError::Validation(format!(
            "signal {signal_id} is not PENDING (status={:?})",
            signal.status
        )));
    }
    let updated = state
        .signals
        .update(signal_id, |s| s.status = SignalStatus::Rejected)
        .expect("checked above");
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn premarket_briefing(State(state): State<AppState>) -> AppResult<Json<ApiResponse<String>>> {
    let now = Utc::now();
    let market_hours = matches!(now.hour(), 3..=10); // 09:00-15:30 IST ~ 03:30-10:00 UTC

    {
        let cache = state.briefing.lock().await;
        if let Some(cached) = cache.as_ref() {
            let window = if market_hours { MARKET_HOURS_REFRESH } else { OFF_HOURS_REFRESH };
            if now.signed_duration_since(cached.fetched_at) < window {
                return Ok(Json(ApiResponse::success(cached.text.clone())));
            }
        }
    }

    let indices = state.data.get_indices().await;
    let vix = state.data.get_vix().await;
    let text = format!(
        "Pre-market briefing: {} indices tracked, India VIX at {:.2} ({:+.2}%).",
        indices.len(),
        vix.value,
        vix.change_percent
    );

    let mut cache = state.briefing.lock().await;
    *cache = Some(crate::state::BriefingCache {
        text: text.clone(),
        fetched_at: now,
    });
    Ok(Json(ApiResponse::success(text)))
}
