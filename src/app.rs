//! Application state
//!
//! Everything the HTTP handlers share, built once in `main` and handed to the router.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::accounts::{AccountStore, SessionStore};
use crate::inference::ServingFacade;

/// Shared state behind every request
#[derive(Clone)]
pub struct AppState {
    pub facade: ServingFacade,
    pub accounts: Arc<AccountStore>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(facade: ServingFacade, accounts: AccountStore, sessions: SessionStore) -> Self {
        tracing::info!("AppState initialized");
        Self {
            facade,
            accounts: Arc::new(accounts),
            sessions: Arc::new(sessions),
        }
    }

    /// Periodically drops expired sessions until the runtime shuts down
    pub fn spawn_session_reaper(&self, every: Duration) -> JoinHandle<()> {
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = sessions.purge_expired();
                if purged > 0 {
                    tracing::debug!("Purged {} expired sessions", purged);
                }
            }
        })
    }
}
