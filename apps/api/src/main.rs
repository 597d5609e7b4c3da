mod assessment;
mod config;
mod errors;
mod routes;
mod state;
mod steps;
mod submission;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Atelier API v{}", env!("CARGO_PKG_VERSION"));

    // Build app state (in-memory sessions, mock feedback backend)
    let state = AppState::from_config(config.clone());
    state.start_cleanup_tasks();
    info!(
        backend = state.feedback.backend(),
        delay_ms = config.analysis_delay_ms,
        timeout_secs = config.analysis_timeout_secs,
        max_retries = config.analysis_max_retries,
        session_ttl_secs = config.session_ttl_secs,
        "Feedback generator initialized"
    );
    info!(
        "Assessment: {} skill categories; assignment '{}'",
        state.categories.len(),
        state.assignment.title
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the web client's origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
