//! Chat-completion provider abstractions.
//!
//! The replay engine talks to two external services through this one trait:
//! the responder under evaluation and the judge for rated constraints. Both
//! calls are single-shot: no retry, no backoff; a failure is handled by the
//! caller per its own containment policy.
//!
//! ## Security
//!
//! Providers hold their API keys in [`secrets::ApiCredential`], which cannot
//! be printed accidentally and is only exposed at the HTTP call site.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod secrets;

#[cfg(feature = "openai")]
mod openai;

pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OPENAI_API_KEY_ENV};

/// Errors from chat providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Authentication failed")]
    Auth,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Configuration for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Ask the backend for a JSON object response (judge calls)
    pub json_mode: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            temperature: 1.0,
            timeout: Duration::from_secs(120),
            json_mode: false,
        }
    }
}

impl CompletionConfig {
    /// Config for a named model with the remaining defaults.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Same config with JSON mode enabled.
    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A chat message for completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Response from a completion call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping chat backends.
///
/// The replay engine is the only caller; it invokes the responder once per
/// turn and the judge once per rated constraint, and never retries either.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 30,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_json_mode_builder() {
        let config = CompletionConfig::for_model("judge-1").with_json_mode();
        assert_eq!(config.model, "judge-1");
        assert!(config.json_mode);
    }
}
