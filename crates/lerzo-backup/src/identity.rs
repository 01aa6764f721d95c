//! Session identity resolution

use lerzo_core::config::IdentityConfig;
use std::fmt;

/// Identity used when developer bypass is enabled and nobody is signed in.
pub const DEV_BYPASS_IDENTITY: &str = "developer-mode-bypass";

/// A non-empty user identity string (normally an email address).
///
/// Not a secret: it is the Argon2id input that binds a backup to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Returns `None` for an empty string.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        (!value.is_empty()).then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the identity a backup is locked to (or unlocked with).
pub trait IdentityProvider {
    fn current_identity(&self) -> Option<Identity>;
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for &T {
    fn current_identity(&self) -> Option<Identity> {
        (**self).current_identity()
    }
}

/// Login session state: a signed-in email and/or the developer bypass flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    email: Option<String>,
    dev_bypass: bool,
}

impl SessionIdentity {
    pub fn new(email: Option<String>, dev_bypass: bool) -> Self {
        Self { email, dev_bypass }
    }

    pub fn signed_in(email: impl Into<String>) -> Self {
        Self::new(Some(email.into()), false)
    }

    pub fn dev_bypass() -> Self {
        Self::new(None, true)
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(config.email.clone(), config.dev_bypass)
    }
}

impl IdentityProvider for SessionIdentity {
    /// The signed-in email wins; the bypass sentinel is only a fallback.
    fn current_identity(&self) -> Option<Identity> {
        self.email
            .clone()
            .and_then(Identity::new)
            .or_else(|| {
                self.dev_bypass
                    .then(|| Identity(DEV_BYPASS_IDENTITY.to_string()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_identity_rejected() {
        assert!(Identity::new("").is_none());
        assert_eq!(
            Identity::new("alice@example.com").unwrap().as_str(),
            "alice@example.com"
        );
    }

    #[test]
    fn test_signed_in_email() {
        let session = SessionIdentity::signed_in("alice@example.com");
        assert_eq!(
            session.current_identity().unwrap().as_str(),
            "alice@example.com"
        );
    }

    #[test]
    fn test_email_takes_precedence_over_bypass() {
        let session = SessionIdentity::new(Some("alice@example.com".into()), true);
        assert_eq!(
            session.current_identity().unwrap().as_str(),
            "alice@example.com"
        );
    }

    #[test]
    fn test_dev_bypass_fallback() {
        let identity = SessionIdentity::dev_bypass().current_identity().unwrap();
        assert_eq!(identity.as_str(), DEV_BYPASS_IDENTITY);

        let empty_email = SessionIdentity::new(Some(String::new()), true);
        assert_eq!(
            empty_email.current_identity().unwrap().as_str(),
            DEV_BYPASS_IDENTITY
        );
    }

    #[test]
    fn test_anonymous_has_no_identity() {
        assert!(SessionIdentity::anonymous().current_identity().is_none());
        assert!(SessionIdentity::new(Some(String::new()), false)
            .current_identity()
            .is_none());
    }

    #[test]
    fn test_from_config() {
        let config = IdentityConfig {
            email: Some("bob@example.com".into()),
            dev_bypass: false,
        };
        let session = SessionIdentity::from_config(&config);
        assert_eq!(session.current_identity().unwrap().as_str(), "bob@example.com");
    }
}
