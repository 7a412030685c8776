//! Secure credential handling for chat providers.
//!
//! - **No accidental logging**: credentials never appear in Debug output
//! - **Memory safety**: zeroed on drop via the `secrecy` crate
//! - **Explicit exposure**: the raw value only leaves through [`ApiCredential::expose`]

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from. Useful for debugging configuration
/// without exposing the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value.
    pub fn new(
        value: impl Into<String>,
        source: CredentialSource,
        name: &'static str,
    ) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from an environment variable. The value is not logged.
    pub fn from_env(var: &str, name: &'static str) -> Result<Self, ProviderError> {
        let value = std::env::var(var)
            .map_err(|_| ProviderError::NotConfigured(format!("{var} is not set")))?;
        if value.trim().is_empty() {
            return Err(ProviderError::NotConfigured(format!("{var} is empty")));
        }
        Ok(Self::new(value, CredentialSource::Environment, name))
    }

    /// Explicitly expose the credential for an HTTP header.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Where this credential came from.
    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_value() {
        let cred = ApiCredential::new("sk-very-secret", CredentialSource::Programmatic, "test key");
        let debug = format!("{cred:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-very-secret"));
    }

    #[test]
    fn test_expose_returns_raw_value() {
        let cred = ApiCredential::new("sk-raw", CredentialSource::Programmatic, "test key");
        assert_eq!(cred.expose(), "sk-raw");
        assert_eq!(cred.source(), CredentialSource::Programmatic);
    }

    #[test]
    fn test_from_env_missing_is_not_configured() {
        let result = ApiCredential::from_env("GAUNTLET_NO_SUCH_VAR", "test key");
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
