//! Opaque session token generation

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::Arc;

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Produces candidate session tokens
pub type TokenSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Draw a fresh URL-safe token from the OS CSPRNG
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Default token source backed by [`generate_token`]
pub fn os_token_source() -> TokenSource {
    Arc::new(generate_token)
}
