//! Service settings loaded from `AUTH_*` environment variables

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

use crate::guard::RedirectTargets;

/// Paths served by fixed routes; redirect targets may not claim them
const RESERVED_PATHS: &[&str] = &["/health"];
const RESERVED_PREFIX: &str = "/auth";

/// Which persistence backend serves users and sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Authentication service settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    pub anonymous_entry: String,
    pub protected_landing: String,
    pub sweep_interval_secs: u64,
    pub store: StoreBackend,
}

impl Settings {
    /// Load settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_addr", "0.0.0.0:3000")?
            .set_default("cookie_secure", false)?
            .set_default("anonymous_entry", "/login")?
            .set_default("protected_landing", "/dashboard")?
            .set_default("sweep_interval_secs", 3600)?
            .set_default("store", "postgres")?
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        for (key, path) in [
            ("anonymous_entry", &self.anonymous_entry),
            ("protected_landing", &self.protected_landing),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Message(format!(
                    "{} must be an absolute path, got {:?}",
                    key, path
                )));
            }
            if is_reserved(path) {
                return Err(ConfigError::Message(format!(
                    "{} collides with a built-in route: {:?}",
                    key, path
                )));
            }
        }
        if self.anonymous_entry == self.protected_landing {
            return Err(ConfigError::Message(
                "anonymous_entry and protected_landing must differ".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn redirect_targets(&self) -> RedirectTargets {
        RedirectTargets {
            anonymous_entry: self.anonymous_entry.clone(),
            protected_landing: self.protected_landing.clone(),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn is_reserved(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    RESERVED_PATHS.contains(&path)
        || path == RESERVED_PREFIX
        || path.starts_with(&format!("{}/", RESERVED_PREFIX))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            cookie_secure: false,
            anonymous_entry: "/login".to_string(),
            protected_landing: "/dashboard".to_string(),
            sweep_interval_secs: 3600,
            store: StoreBackend::Postgres,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "AUTH_BIND_ADDR",
        "AUTH_COOKIE_SECURE",
        "AUTH_ANONYMOUS_ENTRY",
        "AUTH_PROTECTED_LANDING",
        "AUTH_SWEEP_INTERVAL_SECS",
        "AUTH_STORE",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_settings_defaults() {
        clear_env();

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:3000");
        assert!(!settings.cookie_secure);
        assert_eq!(settings.redirect_targets(), RedirectTargets::default());
        assert_eq!(settings.sweep_interval(), Duration::from_secs(3600));
        assert_eq!(settings.store, StoreBackend::Postgres);
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        clear_env();
        unsafe {
            std::env::set_var("AUTH_BIND_ADDR", "127.0.0.1:8080");
            std::env::set_var("AUTH_COOKIE_SECURE", "true");
            std::env::set_var("AUTH_PROTECTED_LANDING", "/home");
            std::env::set_var("AUTH_SWEEP_INTERVAL_SECS", "60");
            std::env::set_var("AUTH_STORE", "memory");
        }

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:8080");
        assert!(settings.cookie_secure);
        assert_eq!(settings.anonymous_entry, "/login");
        assert_eq!(settings.protected_landing, "/home");
        assert_eq!(settings.sweep_interval_secs, 60);
        assert_eq!(settings.store, StoreBackend::Memory);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_value_is_an_error() {
        clear_env();
        unsafe {
            std::env::set_var("AUTH_SWEEP_INTERVAL_SECS", "hourly");
        }

        assert!(Settings::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_relative_redirect_target_is_rejected() {
        clear_env();
        unsafe {
            std::env::set_var("AUTH_ANONYMOUS_ENTRY", "login");
        }

        assert!(Settings::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_targets_colliding_with_builtin_routes_are_rejected() {
        for path in ["/health", "/auth/login", "/auth/logout/", "/auth"] {
            let landing = Settings {
                protected_landing: path.to_string(),
                ..Settings::default()
            };
            assert!(landing.validated().is_err(), "{} accepted as landing", path);

            let entry = Settings {
                anonymous_entry: path.to_string(),
                ..Settings::default()
            };
            assert!(entry.validated().is_err(), "{} accepted as entry", path);
        }

        let fine = Settings {
            anonymous_entry: "/authenticate".to_string(),
            ..Settings::default()
        };
        assert!(fine.validated().is_ok());
    }
}
