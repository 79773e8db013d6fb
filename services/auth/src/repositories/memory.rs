//! In-process store holding both users and sessions
//!
//! Used by tests and local runs without PostgreSQL. Users and sessions share
//! one lock so the session/user join behaves like the SQL backend, including
//! orphaned sessions reading as absent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{SessionRepository, UserRepository};
use crate::error::{AuthError, AuthResult};
use crate::models::{NewSession, NewUser, SessionRecord, User};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    usernames: HashMap<String, Uuid>,
    sessions: HashMap<String, NewSession>,
}

/// Memory-backed user and session repository
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`AuthError::StoreUnavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored session rows owned by `user_id`, expired or not
    pub async fn session_count_for(&self, user_id: Uuid) -> usize {
        let tables = self.tables.lock().await;
        tables
            .sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .count()
    }

    /// Total number of stored session rows
    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }

    /// Total number of stored users
    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    /// Drop a user while leaving their sessions behind
    pub async fn remove_user(&self, user_id: Uuid) {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.remove(&user_id) {
            tables.usernames.remove(&user.username);
        }
    }

    fn check_available(&self) -> AuthResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, new_user: &NewUser) -> AuthResult<User> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        if tables.usernames.contains_key(&new_user.username) {
            return Err(AuthError::AlreadyExists);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            created_at: Utc::now(),
        };
        tables.usernames.insert(user.username.clone(), user.id);
        tables.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        self.check_available()?;
        let tables = self.tables.lock().await;

        Ok(tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_if_absent(&self, session: &NewSession) -> AuthResult<bool> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        if tables.sessions.contains_key(&session.token) {
            return Ok(false);
        }
        tables
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(true)
    }

    async fn find_valid(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<SessionRecord>> {
        self.check_available()?;
        let tables = self.tables.lock().await;

        let record = tables
            .sessions
            .get(token)
            .filter(|session| session.expires_at > now)
            .and_then(|session| {
                tables.users.get(&session.user_id).map(|user| SessionRecord {
                    token: session.token.clone(),
                    user_id: session.user_id,
                    username: user.username.clone(),
                    issued_at: session.issued_at,
                    expires_at: session.expires_at,
                    metadata: session.metadata.clone(),
                })
            });

        Ok(record)
    }

    async fn delete(&self, token: &str) -> AuthResult<()> {
        self.check_available()?;
        self.tables.lock().await.sessions.remove(token);
        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        let before = tables.sessions.len();
        tables
            .sessions
            .retain(|_, session| session.expires_at > cutoff);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionMetadata;
    use chrono::Duration;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryStore::new();
        store.insert(&new_user("alice")).await.unwrap();

        let result = store.insert(&new_user("alice")).await;
        assert!(matches!(result, Err(AuthError::AlreadyExists)));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_usernames_are_case_sensitive() {
        let store = MemoryStore::new();
        store.insert(&new_user("alice")).await.unwrap();
        store.insert(&new_user("Alice")).await.unwrap();

        assert!(store.find_by_username("ALICE").await.unwrap().is_none());
        assert_eq!(store.user_count().await, 2);
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing_row() {
        let store = MemoryStore::new();
        let alice = store.insert(&new_user("alice")).await.unwrap();
        let bob = store.insert(&new_user("bob")).await.unwrap();
        let now = Utc::now();

        let first = NewSession::issue("tok".into(), alice.id, SessionMetadata::new(), now);
        let second = NewSession::issue("tok".into(), bob.id, SessionMetadata::new(), now);

        assert!(store.insert_if_absent(&first).await.unwrap());
        assert!(!store.insert_if_absent(&second).await.unwrap());

        let record = store.find_valid("tok", now).await.unwrap().unwrap();
        assert_eq!(record.user_id, alice.id);
    }

    #[tokio::test]
    async fn test_delete_expired_uses_inclusive_cutoff() {
        let store = MemoryStore::new();
        let alice = store.insert(&new_user("alice")).await.unwrap();
        let now = Utc::now();

        let session = NewSession::issue("tok".into(), alice.id, SessionMetadata::new(), now);
        store.insert_if_absent(&session).await.unwrap();

        let just_before = session.expires_at - Duration::seconds(1);
        assert_eq!(store.delete_expired(just_before).await.unwrap(), 0);
        assert_eq!(store.delete_expired(session.expires_at).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.find_by_username("alice").await,
            Err(AuthError::StoreUnavailable(_))
        ));
        assert!(matches!(
            store.delete("tok").await,
            Err(AuthError::StoreUnavailable(_))
        ));
    }
}
