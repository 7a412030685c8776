//! Judge client for rated constraints.
//!
//! A rated instruction renders its own prompt (see the core catalog); this
//! client sends it as a single user message in JSON mode and insists on an
//! integer `score` in the reply. Anything else is an error the replay engine
//! degrades to a failed constraint.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::providers::{ChatMessage, ChatProvider, CompletionConfig, ProviderError};

/// Errors from a judge call.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Judge response is not the expected JSON shape: {0}")]
    MalformedResponse(String),
}

/// A parsed judge verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeScore {
    /// Integer score, 1-10 by the rubric.
    pub score: i64,

    /// One-sentence rationale; empty when the judge omitted it.
    pub rationale: String,
}

/// Scores rated-constraint prompts through a chat provider.
pub struct JudgeClient {
    provider: Arc<dyn ChatProvider>,
    config: CompletionConfig,
}

impl JudgeClient {
    pub fn new(provider: Arc<dyn ChatProvider>, config: CompletionConfig) -> Self {
        Self {
            provider,
            config: config.with_json_mode(),
        }
    }

    /// Send one judge prompt and parse `{"score": n, "rationale": "..."}`.
    pub async fn score(&self, prompt: String) -> Result<JudgeScore, JudgeError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self.provider.complete(messages, &self.config).await?;

        let value: Value = serde_json::from_str(response.content.trim())
            .map_err(|e| JudgeError::MalformedResponse(e.to_string()))?;
        let score = value
            .get("score")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                JudgeError::MalformedResponse("missing integer `score` field".to_string())
            })?;
        let rationale = value
            .get("rationale")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(JudgeScore { score, rationale })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    struct CannedJudge(&'static str);

    #[async_trait]
    impl ChatProvider for CannedJudge {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
                usage: TokenUsage::default(),
                model: "canned".to_string(),
            })
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_parses_score_and_rationale() {
        let client = JudgeClient::new(
            Arc::new(CannedJudge(r#"{"rationale": "clear tone", "score": 8}"#)),
            CompletionConfig::for_model("judge-1"),
        );
        let verdict = client.score("prompt".to_string()).await.unwrap();
        assert_eq!(verdict.score, 8);
        assert_eq!(verdict.rationale, "clear tone");
    }

    #[tokio::test]
    async fn test_missing_score_is_malformed() {
        let client = JudgeClient::new(
            Arc::new(CannedJudge(r#"{"rationale": "no score here"}"#)),
            CompletionConfig::for_model("judge-1"),
        );
        let result = client.score("prompt".to_string()).await;
        assert!(matches!(result, Err(JudgeError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_non_json_is_malformed() {
        let client = JudgeClient::new(
            Arc::new(CannedJudge("I would rate this an 8 out of 10.")),
            CompletionConfig::for_model("judge-1"),
        );
        assert!(client.score("prompt".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_rationale_defaults_empty() {
        let client = JudgeClient::new(
            Arc::new(CannedJudge(r#"{"score": 3}"#)),
            CompletionConfig::for_model("judge-1"),
        );
        let verdict = client.score("prompt".to_string()).await.unwrap();
        assert_eq!(verdict.rationale, "");
    }
}
