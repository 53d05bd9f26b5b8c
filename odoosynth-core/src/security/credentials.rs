//! Secret container with automatic memory zeroing.
//!
//! A [`Credential`] holds an Odoo API key or password, or a reasoning service
//! key. The value is wiped when the last clone is dropped and never appears in
//! `Debug` output.

use std::fmt;
use zeroize::Zeroizing;

/// Secret value that zeroes its memory on drop.
///
/// # Example
///
/// ```rust
/// use odoosynth_core::security::Credential;
///
/// let key = Credential::new("a1b2c3".to_string());
/// assert_eq!(key.expose(), "a1b2c3");
/// assert_eq!(format!("{:?}", key), "Credential(<redacted>)");
/// ```
#[derive(Clone)]
pub struct Credential {
    secret: Zeroizing<String>,
}

impl Credential {
    /// Moves `secret` into a zeroizing container.
    pub fn new(secret: String) -> Self {
        Self {
            secret: Zeroizing::new(secret),
        }
    }

    /// Returns the secret for the single call that needs it.
    ///
    /// Callers must not copy the returned slice into long-lived storage.
    pub fn expose(&self) -> &str {
        &self.secret
    }

    /// Checks whether the secret is empty without exposing it.
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_new() {
        let credential = Credential::new("testpass".to_string());
        assert_eq!(credential.expose(), "testpass");
        assert!(!credential.is_empty());
    }

    #[test]
    fn test_credential_empty() {
        let credential = Credential::new(String::new());
        assert!(credential.is_empty());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("super_secret_key".to_string());
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("super_secret_key"));
    }

    #[test]
    fn test_credential_clone() {
        let first = Credential::new("key".to_string());
        let second = first.clone();
        drop(first);
        assert_eq!(second.expose(), "key");
    }
}
