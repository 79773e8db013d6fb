//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    carrier::CookieCarrier,
    error::{AuthError, AuthResult},
    flow::{LoginOutcome, REGISTERED_MESSAGE, RegisterOutcome, RegisterRejection},
    guard::{ClientSession, GuardDecision},
    middleware::require_auth,
    models::{Identity, SessionMetadata},
    state::AppState,
};

/// Request for user login; missing fields read as empty
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request for user registration; missing fields read as empty
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

/// Response for a completed registration
#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub username: String,
    pub message: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(&state.settings.protected_landing, get(landing))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .route(&state.settings.anonymous_entry, get(entry_page))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = match &state.db_pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "ok",
            _ => "unavailable",
        },
        None => "memory",
    };

    let status = if database == "unavailable" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "auth-service",
            "database": database,
        })),
    )
        .into_response()
}

/// Anonymous entry; clients that already hold a live session go to the landing page
pub async fn entry_page(State(state): State<AppState>, headers: HeaderMap) -> AuthResult<Response> {
    let carrier = CookieCarrier::from_headers(&headers, state.settings.cookie_secure);
    let mut client = ClientSession::after_hydration();

    if let GuardDecision::Granted(_) = state.guard().evaluate(&mut client, &carrier).await? {
        return Ok(Redirect::to(&state.settings.protected_landing).into_response());
    }

    Ok(Json(serde_json::json!({
        "page": "login",
        "login": "/auth/login",
        "register": "/auth/register",
    }))
    .into_response())
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AuthError>,
) -> AuthResult<Response> {
    let outcome = state
        .flow
        .register(&payload.username, &payload.password, &payload.confirm_password)
        .await?;

    let response = match outcome {
        RegisterOutcome::Registered(identity) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                user_id: identity.user_id,
                username: identity.username,
                message: REGISTERED_MESSAGE.to_string(),
            }),
        )
            .into_response(),
        RegisterOutcome::Rejected(rejection) => {
            let status = match rejection {
                RegisterRejection::UsernameTaken => StatusCode::CONFLICT,
                RegisterRejection::MissingFields | RegisterRejection::PasswordMismatch => {
                    StatusCode::BAD_REQUEST
                }
            };
            (
                status,
                Json(serde_json::json!({ "error": rejection.message() })),
            )
                .into_response()
        }
    };

    Ok(response)
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, AuthError>,
) -> AuthResult<Response> {
    let mut carrier = CookieCarrier::from_headers(&headers, state.settings.cookie_secure);
    let mut client = ClientSession::new();

    let outcome = state
        .flow
        .login(
            &mut client,
            &mut carrier,
            &payload.username,
            &payload.password,
            request_metadata(&headers),
        )
        .await?;

    let response = match outcome {
        LoginOutcome::Authenticated { redirect_to, .. } => {
            (carrier.into_jar(), Redirect::to(&redirect_to)).into_response()
        }
        LoginOutcome::Rejected { .. } => return Err(AuthError::AuthenticationFailed),
    };

    Ok(response)
}

/// User logout endpoint
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut carrier = CookieCarrier::from_headers(&headers, state.settings.cookie_secure);
    let mut client = ClientSession::new();

    let target = state.flow.logout(&mut client, &mut carrier).await;
    (carrier.into_jar(), Redirect::to(&target)).into_response()
}

/// Protected landing page
pub async fn landing(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    info!(user_id = %identity.user_id, "Serving protected landing page");
    Json(identity)
}

/// Client details recorded alongside a new session
fn request_metadata(headers: &HeaderMap) -> SessionMetadata {
    let mut metadata = SessionMetadata::new();
    if let Some(agent) = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
    {
        metadata.insert("user_agent".to_string(), agent.to_string());
    }
    metadata
}
