use axum::extract::{Path, Query, State};
use axum::Json;
use market_data::{Exchange, IndexQuote, Interval, OptionsChain, Quote, SearchResult, TopMovers, VixQuote};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ApiResponse;

fn parse_exchange(raw: &str) -> Option<Exchange> {
    match raw.to_ascii_uppercase().as_str() {
        "NSE" => Some(Exchange::Nse),
        "BSE" => Some(Exchange::Bse),
        "MCX" => Some(Exchange::Mcx),
        "CDS" => Some(Exchange::Cds),
        _ => None,
    }
}

#[derive(Deserialize)]
pub struct QuoteQuery {
    pub symbol: String,
    pub exchange: Option<String>,
}

pub async fn get_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> AppResult<Json<ApiResponse<Quote>>> {
    let exchange = match query.exchange {
        Some(raw) => parse_exchange(&raw)
            .ok_or_else(|| AppError::Validation(format!("unknown exchange {raw}")))?,
        None => state.data.resolve_exchange(&query.symbol),
    };
    let quote = state.data.get_quote(&query.symbol, exchange, None).await;
    Ok(Json(ApiResponse::success(quote)))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub symbol: String,
    pub interval: String,
    #[serde(default = "default_range_days")]
    pub from: i64,
    #[serde(default)]
    pub to: Option<i64>,
}

fn default_range_days() -> i64 {
    30
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<market_data::Candle>>>> {
    let interval = Interval::parse(&query.interval)
        .ok_or_else(|| AppError::Validation(format!("unknown interval {}", query.interval)))?;
    let exchange = state.data.resolve_exchange(&query.symbol);
    let range_days = query.to.map(|to| (query.from - to).abs()).unwrap_or(query.from).max(1);
    let candles = state
        .data
        .get_history(&query.symbol, exchange, interval, range_days)
        .await;
    Ok(Json(ApiResponse::success(candles)))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub exchange: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    20
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<Vec<SearchResult>>>> {
    let exchange = match query.exchange {
        Some(raw) => Some(
            parse_exchange(&raw)
                .ok_or_else(|| AppError::Validation(format!("unknown exchange {raw}")))?,
        ),
        None => None,
    };
    let results = state.data.search(&query.q, query.limit, exchange);
    Ok(Json(ApiResponse::success(results)))
}

pub async fn indices(State(state): State<AppState>) -> Json<ApiResponse<Vec<IndexQuote>>> {
    Json(ApiResponse::success(state.data.get_indices().await))
}

pub async fn vix(State(state): State<AppState>) -> Json<ApiResponse<VixQuote>> {
    Json(ApiResponse::success(state.data.get_vix().await))
}

#[derive(Deserialize)]
pub struct MoversQuery {
    #[serde(default = "default_movers_count")]
    pub count: usize,
}

fn default_movers_count() -> usize {
    10
}

pub async fn movers(
    State(state): State<AppState>,
    Query(query): Query<MoversQuery>,
) -> Json<ApiResponse<TopMovers>> {
    let mut quotes = Vec::new();
    for (symbol, _) in market_data::catalogue::EQUITIES {
        let exchange = state.data.resolve_exchange(symbol);
        let quote = state.data.get_quote(symbol, exchange, None).await;
        quotes.push((symbol.to_string(), quote));
    }
    Json(ApiResponse::success(state.data.get_top_movers(query.count, &quotes)))
}

pub async fn options_chain(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<ApiResponse<OptionsChain>> {
    Json(ApiResponse::success(state.data.get_options_chain(&symbol).await))
}
