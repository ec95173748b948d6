use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use signal_pipeline::{Bot, BotMessage, BotStatus, MessageType, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ApiResponse;

#[derive(Deserialize)]
pub struct CreateBot {
    pub user_id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub assigned_symbols: Vec<String>,
    pub assigned_strategy: String,
    pub max_capital: f64,
}

#[derive(Deserialize, Default)]
pub struct UpdateBot {
    pub name: Option<String>,
    pub assigned_symbols: Option<Vec<String>>,
    pub assigned_strategy: Option<String>,
    pub max_capital: Option<f64>,
}

#[derive(Deserialize)]
pub struct TaskRequest {
    pub message: String,
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn create_bot(
    State(state): State<AppState>,
    Json(body): Json<CreateBot>,
) -> AppResult<Json<ApiResponse<Bot>>> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if body.max_capital <= 0.0 {
        return Err(AppError::Validation("max_capital must be positive".into()));
    }

    let bot = Bot {
        id: Uuid::new_v4(),
        user_id: body.user_id,
        name: body.name,
        role: body.role,
        status: BotStatus::Idle,
        assigned_symbols: body.assigned_symbols,
        assigned_strategy: body.assigned_strategy,
        max_capital: body.max_capital,
        used_capital: 0.0,
        total_trades: 0,
        total_pnl: 0.0,
        win_rate: 0.0,
        last_action: None,
        last_action_at: None,
    };
    let bot = state.bots.insert(bot);
    Ok(Json(ApiResponse::success(bot)))
}

pub async fn update_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<Uuid>,
    Json(body): Json<UpdateBot>,
) -> AppResult<Json<ApiResponse<Bot>>> {
    let bot = state
        .bots
        .update(bot_id, |bot| {
            if let Some(name) = body.name {
                bot.name = name;
            }
            if let Some(symbols) = body.assigned_symbols {
                bot.assigned_symbols = symbols;
            }
            if let Some(strategy) = body.assigned_strategy {
                bot.assigned_strategy = strategy;
            }
            if let Some(capital) = body.max_capital {
                bot.max_capital = capital;
            }
        })
        .ok_or_else(|| AppError::NotFound(format!("bot {bot_id} not found")))?;
    Ok(Json(ApiResponse::success(bot)))
}

pub async fn delete_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    state.scheduler.stop_bot(bot_id).await;
    state
        .bots
        .remove(bot_id)
        .ok_or_else(|| AppError::NotFound(format!("bot {bot_id} not found")))?;
    Ok(Json(ApiResponse::success(serde_json::json!({ "deleted": true }))))
}

pub async fn start_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Bot>>> {
    let bot = state
        .bots
        .get(bot_id)
        .ok_or_else(|| AppError::NotFound(format!("bot {bot_id} not found")))?;
    state
        .bots
        .update(bot_id, |bot| bot.status = BotStatus::Running);
    state.scheduler.start_bot(bot_id, bot.user_id.clone()).await;
    let bot = state.bots.get(bot_id).expect("just updated");
    Ok(Json(ApiResponse::success(bot)))
}

pub async fn stop_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Bot>>> {
    state
        .bots
        .get(bot_id)
        .ok_or_else(|| AppError::NotFound(format!("bot {bot_id} not found")))?;
    state.scheduler.stop_bot(bot_id).await;
    let bot = state
        .bots
        .update(bot_id, |bot| bot.status = BotStatus::Idle)
        .expect("checked above");
    Ok(Json(ApiResponse::success(bot)))
}

pub async fn task_bot(
    State(state): State<AppState>,
    Path(bot_id): Path<Uuid>,
    Json(body): Json<TaskRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let bot = state
        .bots
        .get(bot_id)
        .ok_or_else(|| AppError::NotFound(format!("bot {bot_id} not found")))?;

    state.messages.push_many(vec![BotMessage::new(
        Some(bot_id),
        bot.user_id,
        MessageType::Info,
        body.message,
    )]);
    Ok(Json(ApiResponse::success(serde_json::json!({ "queued": true }))))
}

pub async fn list_bots(State(state): State<AppState>) -> Json<ApiResponse<Vec<Bot>>> {
    Json(ApiResponse::success(state.bots.list()))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Json<ApiResponse<Vec<BotMessage>>> {
    Json(ApiResponse::success(state.messages.recent(query.limit)))
}
