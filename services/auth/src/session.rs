//! Session store: token issuing, lookup, revocation and sweeping

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    error::{AuthError, AuthResult},
    models::{NewSession, SessionMetadata, SessionRecord},
    repositories::SessionRepository,
    token::{TokenSource, os_token_source},
};

/// Fresh tokens drawn before giving up on a colliding insert
pub const MAX_TOKEN_ATTEMPTS: usize = 3;

/// Session store for handling user sessions
#[derive(Clone)]
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    tokens: TokenSource,
}

impl SessionStore {
    /// Create a new session store using the wall clock and OS randomness
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            repository,
            clock: Arc::new(SystemClock),
            tokens: os_token_source(),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the token generator
    pub fn with_token_source(mut self, tokens: TokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    /// Create a new session for a user and return its token
    pub async fn create(&self, user_id: Uuid, metadata: SessionMetadata) -> AuthResult<String> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = (self.tokens)();
            let session = NewSession::issue(token, user_id, metadata.clone(), self.clock.now());

            if self.repository.insert_if_absent(&session).await? {
                info!(user_id = %user_id, expires_at = %session.expires_at, "Session created");
                return Ok(session.token);
            }

            warn!(user_id = %user_id, attempt, "Session token collision, drawing a new token");
        }

        Err(AuthError::StoreUnavailable(
            "could not allocate a unique session token".to_string(),
        ))
    }

    /// Look up a live session; expired, unknown and empty tokens all read as `None`
    pub async fn fetch(&self, token: &str) -> AuthResult<Option<SessionRecord>> {
        if token.is_empty() {
            return Ok(None);
        }

        self.repository.find_valid(token, self.clock.now()).await
    }

    /// Remove a session; a missing token is not an error
    pub async fn destroy(&self, token: &str) -> AuthResult<()> {
        if token.is_empty() {
            return Ok(());
        }

        self.repository.delete(token).await
    }

    /// Delete every session that expired at or before the moment the sweep starts
    pub async fn sweep(&self) -> AuthResult<u64> {
        let cutoff = self.clock.now();
        let removed = self.repository.delete_expired(cutoff).await?;

        info!(removed, cutoff = %cutoff, "Expired sessions swept");
        Ok(removed)
    }
}

/// Run [`SessionStore::sweep`] every `every` on a background task.
///
/// Failures are logged and the loop keeps going.
pub fn spawn_sweeper(store: SessionStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = store.sweep().await {
                error!("Session sweep failed: {}", e);
            }
        }
    })
}
