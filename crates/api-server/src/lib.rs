use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod request_id;
pub mod routes;
pub mod security_headers;
pub mod state;
pub mod store;

pub use error::{ApiResponse, AppError, AppResult};
pub use state::AppState;

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Builds the full route tree, wrapped in the same tracing/CORS/security-header
/// middleware stack the donor layers onto its router.
pub fn build_router(state: AppState) -> Router {
    let cors = if std::env::var("CORS_PERMISSIVE")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(true)
    {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/bots", post(routes::bots::create_bot).get(routes::bots::list_bots))
        .route(
            "/bots/:id",
            put(routes::bots::update_bot).delete(routes::bots::delete_bot),
        )
        .route("/bots/:id/start", post(routes::bots::start_bot))
        .route("/bots/:id/stop", post(routes::bots::stop_bot))
        .route("/bots/:id/task", post(routes::bots::task_bot))
        .route("/bots/messages", get(routes::bots::list_messages))
        .route("/agent/status", get(routes::agents::agent_status))
        .route("/agent/start", post(routes::agents::start_agent))
        .route("/agent/stop", post(routes::agents::stop_agent))
        .route("/agent/signals", get(routes::agents::list_signals))
        .route("/agent/signals/:id/execute", post(routes::agents::execute_signal))
        .route("/agent/signals/:id/reject", post(routes::agents::reject_signal))
        .route("/agent/briefing/premarket", get(routes::agents::premarket_briefing))
        .route("/market/quote", get(routes::market::get_quote))
        .route("/market/history", get(routes::market::get_history))
        .route("/market/search", get(routes::market::search))
        .route("/market/indices", get(routes::market::indices))
        .route("/market/vix", get(routes::market::vix))
        .route("/market/movers", get(routes::market::movers))
        .route("/market/options/:symbol", get(routes::market::options_chain))
        .route_layer(middleware::from_fn(security_headers::security_headers_middleware))
        .route_layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Standalone entry point: builds state from the environment and serves
/// until a shutdown signal arrives. `paper-trader` builds its own
/// `AppState` up front (so the scheduler and the HTTP layer share it) and
/// calls [`serve`] directly instead.
pub async fn run_server() -> anyhow::Result<()> {
    let state = AppState::from_env().await;
    let bind_addr = std::env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    serve(state, &bind_addr).await
}

pub async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("api-server listening on {bind_addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down api-server"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down api-server"),
    }
}
