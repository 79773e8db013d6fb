//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    credentials::CredentialStore,
    flow::AuthFlow,
    guard::AuthGuard,
    repositories::{SessionRepository, UserRepository},
    session::SessionStore,
    settings::Settings,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub flow: AuthFlow,
    pub sessions: SessionStore,
    pub settings: Settings,
    /// Present when running against PostgreSQL
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        settings: Settings,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self::with_session_store(users, SessionStore::new(sessions), settings, db_pool)
    }

    /// Build state around an already configured session store
    pub fn with_session_store(
        users: Arc<dyn UserRepository>,
        sessions: SessionStore,
        settings: Settings,
        db_pool: Option<PgPool>,
    ) -> Self {
        let guard = AuthGuard::new(sessions.clone(), settings.redirect_targets());
        let flow = AuthFlow::new(CredentialStore::new(users), sessions.clone(), guard);

        Self {
            flow,
            sessions,
            settings,
            db_pool,
        }
    }

    pub fn guard(&self) -> &AuthGuard {
        self.flow.guard()
    }
}
