//! HTTP server for Parley
//!
//! Routes:
//!
//! - `POST /api/chat`: stream a completion for the posted conversation
//! - `GET /api/messages`: stored history as JSON
//! - `GET /`: stored history rendered as an HTML page
//! - `GET /health`: liveness probe

use crate::completion::{self, CompletionGateway};
use crate::config::Config;
use crate::error::{ParleyError, Result};
use crate::storage::{self, MessageStore};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

pub mod chat;
pub mod error;
pub mod history;

pub use error::ApiError;

/// Clients shared by every request
///
/// Built once at startup and injected into handlers; handlers keep no
/// other state between requests.
#[derive(Clone)]
pub struct AppState {
    /// Message persistence
    pub store: Arc<dyn MessageStore>,
    /// Completion service
    pub gateway: Arc<dyn CompletionGateway>,
    /// Background writes of finished replies
    pub replies: TaskTracker,
}

impl AppState {
    /// Create state from already-built clients
    pub fn new(store: Arc<dyn MessageStore>, gateway: Arc<dyn CompletionGateway>) -> Self {
        Self {
            store,
            gateway,
            replies: TaskTracker::new(),
        }
    }

    /// Wait for every pending reply write to finish
    ///
    /// Called once the server has stopped accepting requests so a reply
    /// that completed during shutdown is still persisted.
    pub async fn drain_replies(&self) {
        self.replies.close();
        if !self.replies.is_empty() {
            tracing::info!("Waiting for {} reply write(s)", self.replies.len());
        }
        self.replies.wait().await;
    }

    /// Build the store and gateway described by the configuration
    ///
    /// # Errors
    ///
    /// Returns error if either client cannot be constructed for the
    /// configured profile
    pub fn from_config(config: &Config) -> Result<Self> {
        let profile = config.server.profile;
        let store = storage::connect(&config.store, profile)?;
        let gateway = completion::connect(&config.completion, profile)?;
        Ok(Self::new(store, gateway))
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(history::page))
        .route("/health", get(health))
        .route("/api/messages", get(history::messages))
        .route("/api/chat", post(chat::chat))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Run the server until ctrl-c
///
/// # Errors
///
/// Returns error if the clients cannot be built or the address cannot be
/// bound
pub async fn serve(config: Config) -> Result<()> {
    let addr: SocketAddr = config.server.bind.parse().map_err(|e| {
        ParleyError::Config(format!("Invalid bind address {}: {}", config.server.bind, e))
    })?;

    let state = AppState::from_config(&config)?;
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "Parley listening on http://{} ({:?} profile)",
        listener.local_addr()?,
        config.server.profile
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.drain_replies().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install ctrl-c handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::UnconfiguredGateway;
    use crate::storage::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = router(AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(UnconfiguredGateway),
        ));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_state_from_default_config_uses_fallbacks() {
        let state = AppState::from_config(&Config::default()).unwrap();
        assert_eq!(state.store.describe(), "memory");
        assert_eq!(state.gateway.describe(), "unconfigured");
    }

    #[test]
    fn test_state_from_config_fails_fast_in_production() {
        let mut config = Config::default();
        config.server.profile = crate::config::Profile::Production;
        assert!(AppState::from_config(&config).is_err());
    }
}
