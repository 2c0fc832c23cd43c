//! API key handling.
//!
//! Keys are wrapped in [`SecretString`] the moment they are read and are
//! only exposed when building the request header.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::fmt;

use super::ProviderError;

/// Where a key came from, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Set in the run configuration.
    Config,
    /// Read from the named environment variable.
    Env(String),
}

/// A provider API key.
pub struct ApiKey {
    value: SecretString,
    origin: KeyOrigin,
}

impl ApiKey {
    pub fn new(value: impl Into<String>, origin: KeyOrigin) -> Self {
        Self {
            value: SecretString::from(value.into()),
            origin,
        }
    }

    /// A non-blank configured key, else the first non-blank variable of
    /// `env_vars`.
    pub fn resolve(configured: Option<&str>, env_vars: &[&str]) -> Result<Self, ProviderError> {
        if let Some(value) = configured.map(str::trim).filter(|v| !v.is_empty()) {
            return Ok(Self::new(value, KeyOrigin::Config));
        }

        for var in env_vars {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    return Ok(Self::new(value.trim(), KeyOrigin::Env(var.to_string())));
                }
            }
        }

        Err(ProviderError::MissingCredential(format!(
            "no API key configured and none of {} is set",
            env_vars.join(", ")
        )))
    }

    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn origin(&self) -> &KeyOrigin {
        &self.origin
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"[REDACTED]")
            .field("origin", &self.origin)
            .finish()
    }
}

/// A credential read from the run configuration.
///
/// Deserializes from a plain string but has no `Serialize` impl, so the
/// owning field must be `skip_serializing` and never reaches config dumps,
/// hashes or audit packets.
pub struct ConfiguredSecret(SecretString);

impl ConfiguredSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for ConfiguredSecret {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl PartialEq for ConfiguredSecret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl fmt::Debug for ConfiguredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ConfiguredSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_shows_key() {
        let key = ApiKey::new("sk-live-abcdef", KeyOrigin::Config);
        let debug = format!("{:?}", key);
        assert!(!debug.contains("sk-live-abcdef"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(key.expose(), "sk-live-abcdef");
    }

    #[test]
    fn test_configured_key_wins() {
        let key = ApiKey::resolve(Some(" cfg-key "), &["CLINAUDIT_UNUSED_ENV"]).unwrap();
        assert_eq!(key.expose(), "cfg-key");
        assert_eq!(key.origin(), &KeyOrigin::Config);
    }

    #[test]
    fn test_env_fallback() {
        std::env::set_var("CLINAUDIT_TEST_KEY_FALLBACK", "env-key");
        let key = ApiKey::resolve(Some(""), &["CLINAUDIT_TEST_KEY_FALLBACK"]).unwrap();
        assert_eq!(key.expose(), "env-key");
        assert_eq!(
            key.origin(),
            &KeyOrigin::Env("CLINAUDIT_TEST_KEY_FALLBACK".to_string())
        );
        std::env::remove_var("CLINAUDIT_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_env_vars_tried_in_order() {
        std::env::set_var("CLINAUDIT_TEST_KEY_SECOND", "second");
        let key = ApiKey::resolve(
            None,
            &["CLINAUDIT_TEST_KEY_UNSET_FIRST", "CLINAUDIT_TEST_KEY_SECOND"],
        )
        .unwrap();
        assert_eq!(key.expose(), "second");
        assert_eq!(
            key.origin(),
            &KeyOrigin::Env("CLINAUDIT_TEST_KEY_SECOND".to_string())
        );
        std::env::remove_var("CLINAUDIT_TEST_KEY_SECOND");
    }

    #[test]
    fn test_missing_key_names_env_vars() {
        let err = ApiKey::resolve(None, &["CLINAUDIT_NONEXISTENT_1", "CLINAUDIT_NONEXISTENT_2"])
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential(_)));
        assert!(err.to_string().contains("CLINAUDIT_NONEXISTENT_1, CLINAUDIT_NONEXISTENT_2"));
    }

    #[test]
    fn test_configured_secret_is_redacted() {
        let secret: ConfiguredSecret = serde_json::from_str("\"sk-config-123\"").unwrap();
        assert_eq!(secret.expose(), "sk-config-123");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert!(secret.clone() == secret);
    }
}
