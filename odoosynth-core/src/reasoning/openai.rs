//! OpenAI-compatible chat completions client.
//!
//! Sends `POST {base_url}/chat/completions` with
//! `response_format = {"type": "json_object"}` and returns the first choice's
//! message content untouched.

use super::{ChatMessage, ChatRequest, ReasoningService};
use crate::config::ReasoningConfig;
use crate::error::OdooSynthError;
use crate::security::Credential;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Client for any endpoint speaking the OpenAI chat completions protocol.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: ReasoningConfig,
    api_key: Credential,
}

impl OpenAiClient {
    /// Creates a client.
    ///
    /// # Errors
    /// Returns a configuration error if the config is invalid or the key is
    /// empty
    pub fn new(config: ReasoningConfig, api_key: Credential) -> Result<Self> {
        config.validate()?;
        if api_key.is_empty() {
            return Err(OdooSynthError::configuration(
                "reasoning service API key cannot be empty",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                OdooSynthError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl ReasoningService for OpenAiClient {
    async fn complete_json(&self, request: &ChatRequest) -> Result<String> {
        let body = CompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(
            "Requesting completion from {} ({} prompt bytes)",
            self.config.model,
            request
                .messages
                .iter()
                .map(|message| message.content.len())
                .sum::<usize>()
        );

        let response = self
            .http
            .post(self.config.completions_url())
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let context = if e.is_timeout() {
                    format!("completion request timed out after {:?}", self.config.timeout)
                } else {
                    "completion request could not be delivered".to_string()
                };
                OdooSynthError::plan_generation_failed(context, e.without_url())
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            OdooSynthError::plan_generation_failed("failed to read completion body", e.without_url())
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(OdooSynthError::plan_generation(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        extract_content(&text)
    }

    fn describe(&self) -> String {
        self.config.model.clone()
    }
}

/// Pulls `choices[0].message.content` out of a completion body.
fn extract_content(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| OdooSynthError::malformed_response(format!("completion body is not JSON: {}", e), body))?;

    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OdooSynthError::malformed_response("completion has no message content", body))
}
