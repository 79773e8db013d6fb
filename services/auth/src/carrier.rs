//! Client-side token transport
//!
//! The carrier is where a client keeps its session token between requests.
//! Reads are tri-state: a client whose cookie jar has not been presented yet
//! is `NotLoaded`, which is not the same as having no token.

use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;

/// Cookie holding the session token
pub const AUTH_COOKIE: &str = "auth_token";

/// Outcome of reading the carrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarrierRead {
    /// The client has not presented its cookies yet
    NotLoaded,
    /// Cookies are available and hold no token
    Absent,
    /// A token is present
    Present(String),
}

/// Client-side storage for the session token
pub trait TokenCarrier {
    fn get(&self) -> CarrierRead;

    /// Persist `token` for `ttl` under `path`
    fn set(&mut self, token: &str, ttl: Duration, path: &str);

    /// Remove the token; a no-op when there is none
    fn delete(&mut self);
}

/// Carrier backed by the request's cookie jar.
///
/// A request without any `Cookie` header reads as [`CarrierRead::NotLoaded`].
#[derive(Debug)]
pub struct CookieCarrier {
    jar: CookieJar,
    loaded: bool,
    secure: bool,
}

impl CookieCarrier {
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        Self {
            jar: CookieJar::from_headers(headers),
            loaded: headers.contains_key(header::COOKIE),
            secure,
        }
    }

    /// Jar carrying any `Set-Cookie` changes, for the response
    pub fn into_jar(self) -> CookieJar {
        self.jar
    }

    fn update(&mut self, f: impl FnOnce(CookieJar) -> CookieJar) {
        let jar = std::mem::replace(&mut self.jar, CookieJar::new());
        self.jar = f(jar);
    }
}

impl TokenCarrier for CookieCarrier {
    fn get(&self) -> CarrierRead {
        if !self.loaded {
            return CarrierRead::NotLoaded;
        }

        match self.jar.get(AUTH_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => {
                CarrierRead::Present(cookie.value().to_string())
            }
            _ => CarrierRead::Absent,
        }
    }

    fn set(&mut self, token: &str, ttl: Duration, path: &str) {
        let cookie = Cookie::build((AUTH_COOKIE, token.to_string()))
            .path(path.to_string())
            .max_age(time::Duration::seconds(ttl.num_seconds()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure);

        self.update(|jar| jar.add(cookie));
        self.loaded = true;
    }

    fn delete(&mut self) {
        self.update(|jar| jar.remove(Cookie::build(AUTH_COOKIE).path("/")));
    }
}

/// Carrier kept in process memory, for non-browser clients and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryCarrier {
    loaded: bool,
    token: Option<String>,
    path: Option<String>,
    ttl: Option<Duration>,
}

impl MemoryCarrier {
    /// Loaded carrier without a token
    pub fn new() -> Self {
        Self {
            loaded: true,
            ..Self::default()
        }
    }

    /// Carrier that keeps reporting `NotLoaded` until something is set
    pub fn not_loaded() -> Self {
        Self::default()
    }

    /// Loaded carrier already holding `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            loaded: true,
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl TokenCarrier for MemoryCarrier {
    fn get(&self) -> CarrierRead {
        match (self.loaded, &self.token) {
            (false, _) => CarrierRead::NotLoaded,
            (true, Some(token)) if !token.is_empty() => CarrierRead::Present(token.clone()),
            (true, _) => CarrierRead::Absent,
        }
    }

    fn set(&mut self, token: &str, ttl: Duration, path: &str) {
        self.loaded = true;
        self.token = Some(token.to_string());
        self.ttl = Some(ttl);
        self.path = Some(path.to_string());
    }

    fn delete(&mut self) {
        self.token = None;
        self.ttl = None;
        self.path = None;
    }
}
