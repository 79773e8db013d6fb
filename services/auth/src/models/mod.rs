//! Authentication service models

pub mod session;
pub mod user;

// Re-export for convenience
pub use session::{NewSession, SESSION_TTL_SECS, SessionMetadata, SessionRecord, session_ttl};
pub use user::{Identity, NewUser, User};
