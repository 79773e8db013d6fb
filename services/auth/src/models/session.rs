//! Session model and related functionality

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::Identity;

/// Fixed session lifetime in seconds (7 days); sessions are never renewed
pub const SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;

/// [`SESSION_TTL_SECS`] as a duration
pub fn session_ttl() -> Duration {
    Duration::seconds(SESSION_TTL_SECS)
}

/// Opaque client details recorded with a session, e.g. `user_agent`
pub type SessionMetadata = HashMap<String, String>;

/// Session row about to be inserted
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
}

impl NewSession {
    /// Build a session for `user_id` issued at `now`
    pub fn issue(
        token: String,
        user_id: Uuid,
        metadata: SessionMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            user_id,
            issued_at: now,
            expires_at: now + session_ttl(),
            metadata,
        }
    }
}

/// A live session joined with its owning user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    /// Identity that owns this session
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }

    /// A session is valid iff it expires strictly after `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
