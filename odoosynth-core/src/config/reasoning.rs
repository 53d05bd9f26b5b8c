//! Reasoning service configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the OpenAI-compatible chat completions endpoint.
///
/// The API key is deliberately absent; it is handed to the client as a
/// [`Credential`](crate::security::Credential).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,
    /// Timeout for one completion call
    pub timeout: Duration,
    /// Sampling temperature, if the service should not use its default
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(120),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ReasoningConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns error if the model is empty, the base URL is not http(s),
    /// the timeout is zero or the temperature is outside 0.0..=2.0
    pub fn validate(&self) -> crate::Result<()> {
        if self.model.trim().is_empty() {
            return Err(crate::error::OdooSynthError::configuration(
                "reasoning model cannot be empty",
            ));
        }

        let base = url::Url::parse(&self.base_url).map_err(|e| {
            crate::error::OdooSynthError::configuration(format!(
                "Invalid reasoning base URL: {}",
                e
            ))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(crate::error::OdooSynthError::configuration(
                "reasoning base URL must use http or https",
            ));
        }

        if self.timeout.is_zero() {
            return Err(crate::error::OdooSynthError::configuration(
                "reasoning timeout must be greater than 0",
            ));
        }

        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(crate::error::OdooSynthError::configuration(
                "temperature must be between 0.0 and 2.0",
            ));
        }

        if self.max_tokens == Some(0) {
            return Err(crate::error::OdooSynthError::configuration(
                "max_tokens must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builder method to set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builder method to cap generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}
