//! REST API over the meeting index

pub mod handlers;
pub mod state;

pub use handlers::*;
pub use state::*;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;

const MB: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    // Room for a full batch of maximum-size files plus multipart framing
    let body_limit = state.config.max_files_per_upload.max(1) * state.config.max_file_size_mb as usize * MB + MB;

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .route("/files", get(list_files).delete(clear_files))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the API server until the process is stopped
pub async fn serve(config: AppConfig) -> Result<()> {
    let address = config.bind_address();
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("API listening on http://{}", address);

    axum::serve(listener, app).await.context("API server error")?;
    Ok(())
}
