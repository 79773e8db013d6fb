//! Login, registration and logout flows
//!
//! These tie credentials, the session store, the token carrier and the
//! client's session cache together in the order the system depends on.

use tracing::{info, warn};

use crate::{
    carrier::TokenCarrier,
    credentials::CredentialStore,
    error::{AuthError, AuthResult, INVALID_CREDENTIALS},
    guard::{AuthGuard, ClientSession},
    models::{Identity, SessionMetadata, session_ttl},
    session::SessionStore,
};

/// Cookie path for the session token
pub const COOKIE_PATH: &str = "/";

/// Confirmation shown after a successful registration
pub const REGISTERED_MESSAGE: &str = "User registered successfully! You can now login.";

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated { identity: Identity, redirect_to: String },
    /// Wrong or missing credentials; the message never says which
    Rejected { message: &'static str },
}

/// Why a registration was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterRejection {
    MissingFields,
    PasswordMismatch,
    UsernameTaken,
}

impl RegisterRejection {
    pub fn message(&self) -> &'static str {
        match self {
            RegisterRejection::MissingFields => "Please fill in all fields!",
            RegisterRejection::PasswordMismatch => "Passwords do not match!",
            RegisterRejection::UsernameTaken => "Username already exists!",
        }
    }
}

/// Result of a registration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered(Identity),
    Rejected(RegisterRejection),
}

/// User-facing authentication flows
#[derive(Clone)]
pub struct AuthFlow {
    credentials: CredentialStore,
    sessions: SessionStore,
    guard: AuthGuard,
}

impl AuthFlow {
    pub fn new(credentials: CredentialStore, sessions: SessionStore, guard: AuthGuard) -> Self {
        Self {
            credentials,
            sessions,
            guard,
        }
    }

    pub fn guard(&self) -> &AuthGuard {
        &self.guard
    }

    /// Verify credentials and establish a session.
    ///
    /// The session row is written first, then the carrier, then the client
    /// cache, so a client is never marked logged in without a durable token.
    pub async fn login<C>(
        &self,
        client: &mut ClientSession,
        carrier: &mut C,
        username: &str,
        password: &str,
        metadata: SessionMetadata,
    ) -> AuthResult<LoginOutcome>
    where
        C: TokenCarrier + ?Sized,
    {
        let Some(identity) = self.credentials.authenticate(username, password).await? else {
            warn!("Rejected login attempt");
            return Ok(LoginOutcome::Rejected {
                message: INVALID_CREDENTIALS,
            });
        };

        let token = self.sessions.create(identity.user_id, metadata).await?;
        carrier.set(&token, session_ttl(), COOKIE_PATH);
        client.mark_authenticated(identity.clone());

        info!(user_id = %identity.user_id, "User logged in");
        Ok(LoginOutcome::Authenticated {
            identity,
            redirect_to: self.guard.targets().protected_landing.clone(),
        })
    }

    /// Register an account. Registration never logs the user in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirm: &str,
    ) -> AuthResult<RegisterOutcome> {
        if username.is_empty() || password.is_empty() || confirm.is_empty() {
            return Ok(RegisterOutcome::Rejected(RegisterRejection::MissingFields));
        }
        if password != confirm {
            return Ok(RegisterOutcome::Rejected(
                RegisterRejection::PasswordMismatch,
            ));
        }

        match self.credentials.register(username, password).await {
            Ok(identity) => Ok(RegisterOutcome::Registered(identity)),
            Err(AuthError::AlreadyExists) => {
                Ok(RegisterOutcome::Rejected(RegisterRejection::UsernameTaken))
            }
            Err(AuthError::InvalidInput(_)) => {
                Ok(RegisterOutcome::Rejected(RegisterRejection::MissingFields))
            }
            Err(e) => Err(e),
        }
    }

    /// Log the client out and return where to send it
    pub async fn logout<C>(&self, client: &mut ClientSession, carrier: &mut C) -> String
    where
        C: TokenCarrier + ?Sized,
    {
        self.guard.logout(client, carrier).await
    }
}
