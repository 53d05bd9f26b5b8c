//! Reasoning service access.
//!
//! The plan synthesizer only needs one capability from an LLM: answer a
//! system + user prompt with a JSON object. [`ReasoningService`] captures that
//! so tests can script responses and deployments can swap providers.

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;

pub mod openai;

pub use openai::OpenAiClient;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions and contract
    System,
    /// The request itself
    User,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Author
    pub role: ChatRole,
    /// Text
    pub content: String,
}

/// A prompt expecting a JSON object in reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Messages in order
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Creates a request from a system and a user message.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                ChatMessage {
                    role: ChatRole::System,
                    content: system.into(),
                },
                ChatMessage {
                    role: ChatRole::User,
                    content: user.into(),
                },
            ],
        }
    }

    /// Text of the user message, if any.
    pub fn user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == ChatRole::User)
            .map(|message| message.content.as_str())
    }
}

/// A service that answers prompts with JSON text.
///
/// # Errors
/// `complete_json` fails with `PlanGenerationFailed` when the call itself
/// fails and with `PlanResponseMalformed` when the reply carries no message
/// content. Parsing the content is left to the caller.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Returns the raw message content of the reply.
    async fn complete_json(&self, request: &ChatRequest) -> Result<String>;

    /// Model or provider name used in logs.
    fn describe(&self) -> String {
        "reasoning service".to_string()
    }
}
