//! Session-based authentication for the NSCP portal
//!
//! Users register with a username and password, log in to receive an opaque
//! session token carried in the `auth_token` cookie, and are gated on every
//! protected page by [`guard::AuthGuard`]. Sessions live in PostgreSQL (or in
//! memory for local runs) and expire after seven days.

pub mod carrier;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod guard;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod settings;
pub mod state;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use state::AppState;
