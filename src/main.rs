//! Contest Tracker Backend
//!
//! Pulls programming contests from Codeforces, CodeChef and Leetcode into a
//! local SQLite store and serves them over a small REST API.

mod api;
mod config;
mod db;
mod errors;
mod fetcher;
mod models;
mod providers;
mod sync;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use fetcher::Fetcher;
use sync::{Aggregator, Reconciler, SyncScheduler};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub scheduler: Arc<SyncScheduler>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging before parsing the rest of the configuration
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::log_level_from_env()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());

    tracing::info!("Starting Contest Tracker Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Wire up the ingestion pipeline
    let fetcher = Fetcher::new(&config)?;
    let aggregator = Aggregator::new(providers::default_chains(&config, &fetcher));
    tracing::info!(
        "Syncing platforms: {}",
        aggregator
            .platforms()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let scheduler = Arc::new(SyncScheduler::new(
        aggregator,
        Reconciler::new(repo.clone()),
    ));

    if config.sync_on_startup {
        scheduler.spawn_startup_sync();
    } else {
        tracing::info!("Startup sync disabled (CONTEST_SYNC_ON_STARTUP)");
    }

    // Create application state
    let state = AppState {
        repo,
        scheduler,
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api::health_check))
        // Contests
        .route("/contests", get(api::list_contests))
        .route("/contests/{id}", get(api::get_contest))
        .route("/contests/{id}/bookmark", post(api::bookmark_contest))
        .route("/contests/{id}/unbookmark", post(api::unbookmark_contest))
        .route("/contests/{id}/solution", post(api::attach_solution))
        .route("/ongoing-contests", get(api::list_ongoing_contests))
        .route("/past-contests", get(api::list_past_contests))
        // Sync
        .route("/last-sync", get(api::get_last_sync))
        .route("/force-sync", post(api::force_sync));

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
