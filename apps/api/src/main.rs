mod config;
mod db;
mod errors;
mod lifecycle;
mod llm_client;
mod matching;
mod models;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::lifecycle::events::{
    spawn_notifier, LogNotificationSink, NotificationSink, WebhookNotificationSink,
};
use crate::lifecycle::policy::{ArchivalPolicyEngine, SystemClock};
use crate::lifecycle::store::LifecycleStore;
use crate::lifecycle::sweep::spawn_periodic_sweep;
use crate::llm_client::LlmClient;
use crate::matching::oracle::LlmScoringOracle;
use crate::matching::ranker::MatchRanker;
use crate::matching::scorer::MatchScorer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::memory::InMemoryRecordStore;
use crate::store::postgres::PgRecordStore;
use crate::store::RecordStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Recruit API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize record store (PostgreSQL when configured)
    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.db_max_connections).await?;
            Arc::new(PgRecordStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory record store");
            Arc::new(InMemoryRecordStore::new())
        }
    };
    info!("Record store initialized ({})", store.backend());

    // Initialize match scorer (heuristic only without an API key)
    let scorer = Arc::new(match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(
                key.clone(),
                config.oracle_api_url.clone(),
                config.oracle_timeout,
            )?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            MatchScorer::new(Arc::new(LlmScoringOracle::new(llm)), config.oracle_timeout)
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; matches use the fallback heuristic only");
            MatchScorer::heuristic_only()
        }
    });

    let ranker = Arc::new(MatchRanker::new(
        store.clone(),
        scorer.clone(),
        config.rank_concurrency,
        config.store_timeout,
        config.oracle_timeout + config.store_timeout * 2,
    ));

    // Lifecycle notifications drain in the background
    let sink: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Lifecycle events will be posted to {url}");
            Arc::new(WebhookNotificationSink::new(url.clone())?)
        }
        None => Arc::new(LogNotificationSink),
    };
    let (events, notifier) = spawn_notifier(sink);

    let lifecycle = Arc::new(LifecycleStore::new(
        store.clone(),
        ArchivalPolicyEngine::new(config.thresholds.clone()),
        Arc::new(SystemClock),
        events,
        config.max_batch_size,
        config.store_timeout,
    ));
    info!(
        "Archival thresholds: inactivity {}d, rejected hold {}d, stagnant stage {}d",
        config.thresholds.inactivity_days,
        config.thresholds.rejected_hold_days,
        config.thresholds.stagnant_stage_days
    );

    let shutdown = CancellationToken::new();
    let sweeper = spawn_periodic_sweep(lifecycle.clone(), config.sweep_interval, shutdown.clone());

    // Build app state
    let state = AppState {
        store,
        scorer,
        ranker,
        lifecycle,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // The router (and every publisher clone it held) is gone; let the notifier drain.
    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }
    notifier.await?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
