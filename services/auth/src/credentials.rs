//! Credential store: registration and password verification
//!
//! Passwords are hashed with Argon2id and a fresh random salt per call. The
//! PHC string keeps the salt and parameters next to the digest, so hashes made
//! with different salts all verify.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};
use crate::models::{Identity, NewUser};
use crate::repositories::UserRepository;

/// Hash a plaintext password, returning the PHC-formatted string
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InvalidInput(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored PHC hash.
///
/// The digest comparison inside argon2 is constant-time. An unparsable hash
/// counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hash verified against when the username is unknown, so both failure
/// paths cost one Argon2 run.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("nscp-timing-equalizer").ok())
        .as_deref()
}

/// Registers and authenticates users
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Register a new user.
    ///
    /// The username is trimmed. Uniqueness is decided by the repository's
    /// insert, never by a prior lookup.
    pub async fn register(&self, username: &str, password: &str) -> AuthResult<Identity> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .insert(&NewUser {
                username: username.to_string(),
                password_hash,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        Ok(Identity::from(&user))
    }

    /// Check a username/password pair.
    ///
    /// Returns `None` for empty input, unknown users and wrong passwords alike.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<Option<Identity>> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let Some(user) = self.users.find_by_username(username).await? else {
            if let Some(hash) = dummy_hash() {
                verify_password(password, hash);
            }
            return Ok(None);
        };

        if verify_password(password, &user.password_hash) {
            Ok(Some(Identity::from(&user)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;

    fn store() -> (MemoryStore, CredentialStore) {
        let memory = MemoryStore::new();
        let credentials = CredentialStore::new(Arc::new(memory.clone()));
        (memory, credentials)
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-pw").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-pw", &hash));
        assert!(!verify_password("wrong-pw", &hash));
    }

    #[test]
    fn test_each_hash_uses_a_new_salt() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("same-password", &first));
        assert!(verify_password("same-password", &second));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn test_register_trims_username() {
        let (_, credentials) = store();
        let identity = credentials.register("  alice  ", "correct-pw").await.unwrap();
        assert_eq!(identity.username, "alice");

        let found = credentials.authenticate("alice", "correct-pw").await.unwrap();
        assert_eq!(found, Some(identity));
    }

    #[tokio::test]
    async fn test_register_rejects_empty_fields() {
        let (memory, credentials) = store();

        assert!(matches!(
            credentials.register("   ", "pw").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            credentials.register("alice", "").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert_eq!(memory.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_duplicate_reports_already_exists() {
        let (_, credentials) = store();
        credentials.register("alice", "pw-one").await.unwrap();

        let result = credentials.register("alice", "pw-two").await;
        assert!(matches!(result, Err(AuthError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let (_, credentials) = store();
        credentials.register("realuser", "rightpass").await.unwrap();

        let unknown = credentials.authenticate("nosuchuser", "x").await.unwrap();
        let wrong = credentials.authenticate("realuser", "wrongpass").await.unwrap();

        assert_eq!(unknown, None);
        assert_eq!(wrong, None);
    }

    #[tokio::test]
    async fn test_empty_input_skips_the_store() {
        let (memory, credentials) = store();
        memory.set_unavailable(true);

        // Would fail with StoreUnavailable if the repository were queried
        assert_eq!(credentials.authenticate("", "pw").await.unwrap(), None);
        assert_eq!(credentials.authenticate("alice", "").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_outage_propagates() {
        let (memory, credentials) = store();
        memory.set_unavailable(true);

        let result = credentials.authenticate("alice", "pw").await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
    }
}
