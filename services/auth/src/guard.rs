//! Per-request authentication gate
//!
//! One guard serves every protected surface. It reconciles three sources of
//! truth in a fixed order: the client's cached identity, the carrier token,
//! and the session store. Its answer is always one of: an identity, a single
//! reload to let the carrier hydrate, or a redirect to the anonymous entry.

use tracing::{debug, info, warn};

use crate::{
    carrier::{CarrierRead, TokenCarrier},
    error::AuthResult,
    models::Identity,
    session::SessionStore,
};

/// Logical pages the guard and flows redirect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargets {
    /// Login/register surface
    pub anonymous_entry: String,
    /// Post-login landing page
    pub protected_landing: String,
}

impl Default for RedirectTargets {
    fn default() -> Self {
        Self {
            anonymous_entry: "/login".to_string(),
            protected_landing: "/dashboard".to_string(),
        }
    }
}

/// Identity cache scoped to one client connection.
///
/// Never shared between clients; the hydration flag lives here so a reload
/// budget spent by one connection cannot leak into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSession {
    identity: Option<Identity>,
    hydration_attempted: bool,
}

impl ClientSession {
    /// Fresh, anonymous connection state
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection state for a client that already used its hydration reload
    pub fn after_hydration() -> Self {
        Self {
            identity: None,
            hydration_attempted: true,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn hydration_attempted(&self) -> bool {
        self.hydration_attempted
    }

    pub(crate) fn mark_authenticated(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Forget everything, including the hydration flag
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What the caller must do with the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Serve the protected content for this identity
    Granted(Identity),
    /// Re-issue the request once so the client can present its cookies
    Reload,
    /// Stop and send the client to this page
    Redirect(String),
}

/// Authentication gate parametrized by its redirect targets
#[derive(Clone)]
pub struct AuthGuard {
    sessions: SessionStore,
    targets: RedirectTargets,
}

impl AuthGuard {
    pub fn new(sessions: SessionStore, targets: RedirectTargets) -> Self {
        Self { sessions, targets }
    }

    pub fn targets(&self) -> &RedirectTargets {
        &self.targets
    }

    /// Decide whether the current request may proceed.
    ///
    /// A store outage surfaces as an error; it is never read as "anonymous".
    pub async fn evaluate<C>(
        &self,
        client: &mut ClientSession,
        carrier: &C,
    ) -> AuthResult<GuardDecision>
    where
        C: TokenCarrier + ?Sized,
    {
        if let Some(identity) = client.identity() {
            return Ok(GuardDecision::Granted(identity.clone()));
        }

        let token = match carrier.get() {
            CarrierRead::NotLoaded if !client.hydration_attempted => {
                client.hydration_attempted = true;
                debug!("Carrier not loaded, requesting one hydration reload");
                return Ok(GuardDecision::Reload);
            }
            CarrierRead::NotLoaded | CarrierRead::Absent => None,
            CarrierRead::Present(token) => Some(token),
        };

        let Some(token) = token else {
            return Ok(self.anonymous());
        };

        match self.sessions.fetch(&token).await? {
            Some(record) => {
                let identity = record.identity();
                client.mark_authenticated(identity.clone());
                debug!(user_id = %identity.user_id, "Session restored from carrier");
                Ok(GuardDecision::Granted(identity))
            }
            None => Ok(self.anonymous()),
        }
    }

    /// End the client's session and return the anonymous entry to redirect to.
    ///
    /// Never fails: a store error while revoking is logged and the client side
    /// is cleared regardless.
    pub async fn logout<C>(&self, client: &mut ClientSession, carrier: &mut C) -> String
    where
        C: TokenCarrier + ?Sized,
    {
        if let Err(e) = self.revoke(carrier).await {
            warn!("Session could not be destroyed during logout: {}", e);
        }

        carrier.delete();
        client.clear();
        info!("Client logged out");

        self.targets.anonymous_entry.clone()
    }

    async fn revoke<C>(&self, carrier: &C) -> AuthResult<()>
    where
        C: TokenCarrier + ?Sized,
    {
        match carrier.get() {
            CarrierRead::Present(token) => self.sessions.destroy(&token).await,
            CarrierRead::NotLoaded | CarrierRead::Absent => Ok(()),
        }
    }

    fn anonymous(&self) -> GuardDecision {
        GuardDecision::Redirect(self.targets.anonymous_entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::MemoryCarrier;
    use crate::error::AuthError;
    use crate::models::{NewUser, SessionMetadata};
    use crate::repositories::{MemoryStore, UserRepository};
    use std::sync::Arc;
    use uuid::Uuid;

    async fn setup() -> (MemoryStore, SessionStore, AuthGuard, Uuid) {
        let memory = MemoryStore::new();
        let user = memory
            .insert(&NewUser {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let sessions = SessionStore::new(Arc::new(memory.clone()));
        let guard = AuthGuard::new(sessions.clone(), RedirectTargets::default());
        (memory, sessions, guard, user.id)
    }

    #[tokio::test]
    async fn test_no_cache_no_token_redirects() {
        let (_, _, guard, _) = setup().await;
        let mut client = ClientSession::new();

        let decision = guard.evaluate(&mut client, &MemoryCarrier::new()).await.unwrap();

        assert_eq!(decision, GuardDecision::Redirect("/login".to_string()));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_cached_identity_skips_the_store() {
        let (memory, _, guard, user_id) = setup().await;
        let identity = Identity {
            user_id,
            username: "alice".to_string(),
        };
        let mut client = ClientSession::new();
        client.mark_authenticated(identity.clone());
        memory.set_unavailable(true);

        let decision = guard.evaluate(&mut client, &MemoryCarrier::new()).await.unwrap();
        assert_eq!(decision, GuardDecision::Granted(identity));
    }

    #[tokio::test]
    async fn test_valid_token_restores_identity() {
        let (_, sessions, guard, user_id) = setup().await;
        let token = sessions.create(user_id, SessionMetadata::new()).await.unwrap();
        let mut client = ClientSession::new();

        let decision = guard
            .evaluate(&mut client, &MemoryCarrier::with_token(token))
            .await
            .unwrap();

        let expected = Identity {
            user_id,
            username: "alice".to_string(),
        };
        assert_eq!(decision, GuardDecision::Granted(expected.clone()));
        assert_eq!(client.identity(), Some(&expected));
    }

    #[tokio::test]
    async fn test_unknown_token_redirects() {
        let (_, _, guard, _) = setup().await;
        let mut client = ClientSession::new();

        let decision = guard
            .evaluate(&mut client, &MemoryCarrier::with_token("forged"))
            .await
            .unwrap();

        assert_eq!(decision, GuardDecision::Redirect("/login".to_string()));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_hydration_reload_happens_at_most_once() {
        let (_, _, guard, _) = setup().await;
        let carrier = MemoryCarrier::not_loaded();
        let mut client = ClientSession::new();

        let first = guard.evaluate(&mut client, &carrier).await.unwrap();
        assert_eq!(first, GuardDecision::Reload);
        assert!(client.hydration_attempted());

        for _ in 0..5 {
            let next = guard.evaluate(&mut client, &carrier).await.unwrap();
            assert_eq!(next, GuardDecision::Redirect("/login".to_string()));
        }
    }

    #[tokio::test]
    async fn test_hydration_flag_is_per_connection() {
        let (_, _, guard, _) = setup().await;
        let carrier = MemoryCarrier::not_loaded();
        let mut first_tab = ClientSession::new();
        let mut second_tab = ClientSession::new();

        guard.evaluate(&mut first_tab, &carrier).await.unwrap();
        let decision = guard.evaluate(&mut second_tab, &carrier).await.unwrap();

        assert_eq!(decision, GuardDecision::Reload);
    }

    #[tokio::test]
    async fn test_store_outage_is_an_error_not_anonymous() {
        let (memory, _, guard, _) = setup().await;
        memory.set_unavailable(true);
        let mut client = ClientSession::new();

        let result = guard
            .evaluate(&mut client, &MemoryCarrier::with_token("tok"))
            .await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_custom_targets_are_used() {
        let (_, sessions, _, _) = setup().await;
        let guard = AuthGuard::new(
            sessions,
            RedirectTargets {
                anonymous_entry: "/account".to_string(),
                protected_landing: "/home".to_string(),
            },
        );
        let mut client = ClientSession::new();

        let decision = guard.evaluate(&mut client, &MemoryCarrier::new()).await.unwrap();
        assert_eq!(decision, GuardDecision::Redirect("/account".to_string()));
    }

    #[tokio::test]
    async fn test_logout_without_cookie_clears_and_redirects() {
        let (_, _, guard, user_id) = setup().await;
        let mut client = ClientSession::after_hydration();
        client.mark_authenticated(Identity {
            user_id,
            username: "alice".to_string(),
        });
        let mut carrier = MemoryCarrier::new();

        let target = guard.logout(&mut client, &mut carrier).await;

        assert_eq!(target, "/login");
        assert_eq!(client, ClientSession::new());
        assert_eq!(carrier.get(), CarrierRead::Absent);
    }

    #[tokio::test]
    async fn test_logout_destroys_the_session() {
        let (memory, sessions, guard, user_id) = setup().await;
        let token = sessions.create(user_id, SessionMetadata::new()).await.unwrap();
        let mut client = ClientSession::new();
        let mut carrier = MemoryCarrier::with_token(token.clone());

        guard.logout(&mut client, &mut carrier).await;

        assert!(sessions.fetch(&token).await.unwrap().is_none());
        assert_eq!(memory.session_count_for(user_id).await, 0);
        assert_eq!(carrier.token(), None);
    }

    #[tokio::test]
    async fn test_logout_survives_store_outage() {
        let (memory, _, guard, _) = setup().await;
        memory.set_unavailable(true);
        let mut client = ClientSession::new();
        let mut carrier = MemoryCarrier::with_token("tok");

        let target = guard.logout(&mut client, &mut carrier).await;

        assert_eq!(target, "/login");
        assert_eq!(carrier.token(), None);
    }
}
