use std::time::Duration;

use api_server::AppState;
use llm_client::LlmProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting paper trading engine");

    let state = AppState::from_env().await;

    startup_checks(&state).await;

    state.scheduler.start_market_scan().await;
    tracing::info!("Market scan loop scheduled");

    if let Some(jobs) = state.jobs.clone() {
        spawn_market_news_job(&state, jobs).await;
    } else {
        tracing::info!("Job queue not configured (set REDIS_URL to enable), skipping market-news refresh");
    }

    let bind_addr = std::env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    tracing::info!("Serving HTTP API on {bind_addr}. Press Ctrl+C to stop.");

    let result = api_server::serve(state.clone(), &bind_addr).await;

    tracing::info!("Shutdown signal received, stopping scheduler...");
    state.scheduler.stop_all().await;

    if let Some(snapshot) = state.llm.circuit_snapshot().await {
        if let Err(err) = state.state_store.save_circuit_breaker(&snapshot).await {
            tracing::warn!(%err, "failed to persist circuit breaker state at shutdown");
        }
    }

    tracing::info!("Paper trading engine shut down.");

    result
}

/// Refreshes the VIX/indices snapshot on a timer and logs it, illustrating
/// the job queue feeding the premarket briefing rather than the scheduler's
/// own per-bot/per-user timers. The worker side just logs what it receives;
/// a future briefing consumer would read from a shared cache here instead.
async fn spawn_market_news_job(state: &AppState, jobs: std::sync::Arc<dyn job_queue::JobQueue>) {
    let handler_data = state.data.clone();
    let handler: job_queue::JobHandler = std::sync::Arc::new(move |_payload| {
        let data = handler_data.clone();
        Box::pin(async move {
            let vix = data.get_vix().await;
            let indices = data.get_indices().await;
            tracing::info!(vix = vix.value, index_count = indices.len(), "market-news job refreshed snapshot");
        })
    });

    jobs.start_worker("market-news", handler).await;
    jobs.add_repeating_job("market-news", serde_json::json!({ "kind": "refresh" }), Duration::from_secs(15 * 60))
        .await;
}

/// Warn-only connectivity probes, matching the donor main loop's
/// best-effort/log-loudly/keep-going startup posture. None of these are
/// fatal: a missing native engine or an unreachable LLM endpoint just means
/// the pipeline degrades to its fallback paths on the first cycle.
async fn startup_checks(state: &AppState) {
    if state.engine.is_available().await {
        tracing::info!("Startup check: native indicator engine OK");
    } else {
        tracing::warn!(
            "Startup check: native indicator engine unreachable — cycles will use the LLM fallback path"
        );
    }

    if state.llm.is_circuit_open() {
        tracing::warn!("Startup check: LLM circuit breaker is already open");
    } else if std::env::var("LLM_API_KEY").unwrap_or_default().is_empty() {
        tracing::warn!("Startup check: LLM_API_KEY not set — LLM calls will fail until configured");
    } else {
        tracing::info!("Startup check: LLM client configured");
    }

    match state.portfolio.nav().await {
        Ok(nav) => tracing::info!("Startup check: simulated portfolio OK (NAV={:.2})", nav),
        Err(e) => tracing::warn!("Startup check: portfolio client error: {e}"),
    }
}
