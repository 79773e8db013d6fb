//! Persistence seams for users and sessions
//!
//! Every method maps to a single atomic statement on the backing store so
//! that concurrent clients never race through a read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};
use crate::models::{NewSession, NewUser, SessionRecord, User};

pub mod memory;
pub mod session;
pub mod user;

pub use memory::MemoryStore;
pub use session::PgSessionRepository;
pub use user::PgUserRepository;

/// Storage for user credentials
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; fails with [`AuthError::AlreadyExists`] when the username is taken
    async fn insert(&self, new_user: &NewUser) -> AuthResult<User>;

    /// Exact, case-sensitive username lookup
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;
}

/// Storage for session rows, keyed by token
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert unless the token already exists. Returns false on collision,
    /// leaving the existing row untouched.
    async fn insert_if_absent(&self, session: &NewSession) -> AuthResult<bool>;

    /// Session joined with its user, only if it expires after `now`
    async fn find_valid(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<SessionRecord>>;

    /// Delete by token; deleting a missing token is not an error
    async fn delete(&self, token: &str) -> AuthResult<()>;

    /// Delete every row with `expires_at <= cutoff`, returning the count
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> AuthResult<u64>;
}

/// Run a database future under `limit`, mapping a timeout to
/// [`AuthError::StoreUnavailable`].
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> AuthResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(AuthError::from),
        Err(_) => Err(AuthError::StoreUnavailable(format!(
            "database did not answer within {:?}",
            limit
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_maps_timeout_to_store_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(())
        };

        let result = bounded(Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_bounded_maps_driver_errors() {
        let failing = async { Err::<(), _>(sqlx::Error::PoolTimedOut) };

        let result = bounded(Duration::from_secs(1), failing).await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_bounded_passes_values_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
