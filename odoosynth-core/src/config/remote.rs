//! Remote datastore client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts for the Odoo JSON-RPC client.
///
/// # Example
/// ```rust
/// use odoosynth_core::config::RemoteConfig;
/// use std::time::Duration;
///
/// let config = RemoteConfig::new().with_request_timeout(Duration::from_secs(60));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Timeout for one JSON-RPC call
    pub request_timeout: Duration,
    /// Timeout for the reachability probe run before authentication
    pub reachability_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            reachability_timeout: Duration::from_secs(10),
        }
    }
}

impl RemoteConfig {
    /// Creates a config with safe defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates timeout values.
    ///
    /// # Errors
    /// Returns error if any timeout is zero
    pub fn validate(&self) -> crate::Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(crate::error::OdooSynthError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(crate::error::OdooSynthError::configuration(
                "request_timeout must be greater than 0",
            ));
        }

        if self.reachability_timeout.is_zero() {
            return Err(crate::error::OdooSynthError::configuration(
                "reachability_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder method to set the reachability probe timeout.
    pub fn with_reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }
}
