//! Middleware guarding protected routes with the session cookie

use axum::{
    body::Body,
    extract::State,
    http::{Request, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::{
    carrier::CookieCarrier,
    error::AuthError,
    guard::{ClientSession, GuardDecision},
    state::AppState,
};

/// Query parameter marking a request as the one hydration retry
pub const HYDRATED_PARAM: &str = "hydrated";

/// Resolve the caller's identity from its cookie, or redirect it.
///
/// On success the [`Identity`](crate::models::Identity) is inserted into the
/// request extensions for handlers to extract.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let carrier = CookieCarrier::from_headers(req.headers(), state.settings.cookie_secure);
    let mut client = if hydration_attempted(req.uri()) {
        ClientSession::after_hydration()
    } else {
        ClientSession::new()
    };

    match state.guard().evaluate(&mut client, &carrier).await? {
        GuardDecision::Granted(identity) => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        GuardDecision::Reload => {
            let target = hydration_target(req.uri());
            debug!(target = %target, "Asking client to retry with its cookies");
            Ok(Redirect::to(&target).into_response())
        }
        GuardDecision::Redirect(target) => Ok(Redirect::to(&target).into_response()),
    }
}

/// Whether the request is already the hydration retry
pub fn hydration_attempted(uri: &Uri) -> bool {
    uri.query()
        .map(|query| {
            query
                .split('&')
                .any(|pair| pair == format!("{}=1", HYDRATED_PARAM))
        })
        .unwrap_or(false)
}

/// Same path and query with the hydration marker appended
pub fn hydration_target(uri: &Uri) -> String {
    match uri.query() {
        Some(query) if !query.is_empty() => {
            format!("{}?{}&{}=1", uri.path(), query, HYDRATED_PARAM)
        }
        _ => format!("{}?{}=1", uri.path(), HYDRATED_PARAM),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hydration_attempted() {
        assert!(hydration_attempted(&Uri::from_static("/dashboard?hydrated=1")));
        assert!(hydration_attempted(&Uri::from_static("/dashboard?tab=2&hydrated=1")));
        assert!(!hydration_attempted(&Uri::from_static("/dashboard")));
        assert!(!hydration_attempted(&Uri::from_static("/dashboard?hydrated=0")));
        assert!(!hydration_attempted(&Uri::from_static("/dashboard?nothydrated=1")));
    }

    #[test]
    fn test_hydration_target_keeps_query() {
        assert_eq!(
            hydration_target(&Uri::from_static("/dashboard")),
            "/dashboard?hydrated=1"
        );
        assert_eq!(
            hydration_target(&Uri::from_static("/dashboard?tab=2")),
            "/dashboard?tab=2&hydrated=1"
        );
    }
}
