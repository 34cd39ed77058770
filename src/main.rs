//! MedResearch inference server
//!
//! Loads settings, brings the model up and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use medresearch::accounts::{AccountStore, SessionStore};
use medresearch::api;
use medresearch::app::AppState;
use medresearch::inference::{LlamaLoader, ModelService, ServingFacade};
use medresearch::storage::accounts::users_path;
use medresearch::storage::settings::{ensure_settings_file, load_settings};

/// How often expired sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("MedResearch AI Server Starting...");

    let settings = load_settings();
    if let Err(e) = ensure_settings_file(&settings) {
        tracing::warn!("Could not write settings file: {}", e);
    }
    let addr: SocketAddr = settings.bind_address.parse()?;

    let service = ModelService::spawn(LlamaLoader::new(&settings))?;
    // A failed load is logged by the service and leaves it serving fallbacks
    let _ = service.load().await;

    let facade =
        ServingFacade::new(Arc::new(service)).with_max_new_tokens(settings.max_new_tokens);
    let accounts = AccountStore::open(users_path()?)?;
    let sessions = SessionStore::new(chrono::Duration::hours(i64::from(settings.session_ttl_hours)));

    let state = AppState::new(facade, accounts, sessions);
    state.spawn_session_reaper(SESSION_SWEEP_INTERVAL);

    api::serve(state, addr).await?;
    tracing::info!("Server stopped");
    Ok(())
}
