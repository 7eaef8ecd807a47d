use std::sync::Arc;

use capacity_db::{SessionBackend, UserBackend};

use crate::auth::session_store::SessionStore;
use crate::config::ServerConfig;
use crate::middleware::rate_limit::RateLimiters;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session lifecycle over the configured storage backend.
    pub sessions: SessionStore,
    /// User-management collaborator (credentials, enabled flag).
    pub users: Arc<dyn UserBackend>,
    /// Per-action rate limiters. Each has its own counter table.
    pub limiters: Arc<RateLimiters>,
}

impl AppState {
    /// Wire the session store and limiters from configuration.
    pub fn new(
        config: ServerConfig,
        session_backend: Arc<dyn SessionBackend>,
        users: Arc<dyn UserBackend>,
    ) -> Self {
        let sessions = SessionStore::new(
            session_backend,
            config.session.ttl,
            config.session.store_timeout,
        );
        let limiters = Arc::new(RateLimiters::from_config(&config.rate_limits));
        Self {
            config: Arc::new(config),
            sessions,
            users,
            limiters,
        }
    }
}
