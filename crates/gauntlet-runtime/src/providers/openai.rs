//! OpenAI-compatible chat-completions provider.
//!
//! Works against any backend that speaks the `/chat/completions` wire format
//! when given its base URL. JSON mode is requested via `response_format` for
//! judge calls.

use super::{
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, ChatProvider, CompletionConfig, CompletionResponse, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Environment variable holding the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a provider with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "OpenAI-compatible API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_env(OPENAI_API_KEY_ENV, "OpenAI-compatible API key")?;
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point at a different OpenAI-compatible backend.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = ChatRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            response_format: config.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Auth);
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .map(std::time::Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("response has no choices".to_string()))?;
        let usage = body.usage.unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
            model: body.model,
        })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let provider = OpenAiProvider::new("sk-test").with_base_url("http://localhost:8000/v1/");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn test_request_serialization_includes_json_mode() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "judge-1",
            messages: &messages,
            temperature: 1.0,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_debug_redacts_credential() {
        let provider = OpenAiProvider::new("sk-secret");
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
    }
}
