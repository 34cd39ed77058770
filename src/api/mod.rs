//! HTTP API
//!
//! JSON endpoints for chat, model status and accounts.

pub mod accounts;
pub mod auth;
pub mod chat;
pub mod error;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub use error::ApiError;

/// Builds the router with every API route
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/model-status", get(chat::model_status))
        .route("/api/register", post(accounts::register))
        .route("/api/login", post(accounts::login))
        .route("/api/logout", post(accounts::logout))
        .route("/api/me", get(accounts::me))
        .route("/api/check-id/:user_id", get(accounts::check_id))
        .route("/api/check-email/:email", get(accounts::check_email))
        .layer(TraceLayer::new_for_http())
        // Mirrors the caller's origin so browsers may send the session cookie
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Serves the API on `addr` until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
