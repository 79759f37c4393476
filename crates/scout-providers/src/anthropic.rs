use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use scout_core::{LlmConfig, ProviderErrorKind, ScoutError};

use crate::adapter::{post_with_retry, require_model, AnalysisPrompt, CallCounters, ProviderAdapter};
use crate::pricing;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_COMPLETION_TOKENS: u32 = 2048;

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

/// Anthropic Messages API adapter.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use scout_core::LlmConfig;
/// use scout_providers::{AnthropicAdapter, CallCounters};
///
/// let config = LlmConfig {
///     provider: "anthropic".into(),
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let adapter = AnthropicAdapter::new(&config, Arc::new(CallCounters::default())).unwrap();
/// ```
pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    counters: Arc<CallCounters>,
}

impl AnthropicAdapter {
    /// Create a new adapter from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Provider`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, counters: Arc<CallCounters>) -> Result<Self, ScoutError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ScoutError::Provider {
                provider: "anthropic".into(),
                kind: ProviderErrorKind::Network,
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".into()),
            counters,
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn call(
        &self,
        model: &str,
        prompt: &AnalysisPrompt,
    ) -> Result<crate::ProviderReply, ScoutError> {
        require_model(self.id(), model)?;
        self.counters.increment(self.id(), model);

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": model,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "system": prompt.system,
            "messages": [
                { "role": "user", "content": prompt.user }
            ],
        });

        let mut headers = vec![("anthropic-version", ANTHROPIC_VERSION.to_string())];
        if let Some(api_key) = &self.api_key {
            headers.push(("x-api-key", api_key.clone()));
        }

        let started = Instant::now();
        let text = post_with_retry(&self.client, self.id(), &url, &headers, &body).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let response: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| ScoutError::Provider {
                provider: self.id().into(),
                kind: ProviderErrorKind::MalformedReply,
                message: format!("failed to decode messages response: {e}"),
            })?;

        let content: String = response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();
        if content.is_empty() {
            return Err(ScoutError::Provider {
                provider: self.id().into(),
                kind: ProviderErrorKind::MalformedReply,
                message: "response contained no text content".into(),
            });
        }

        let prompt_tokens = response.usage.as_ref().and_then(|u| u.input_tokens);
        let completion_tokens = response.usage.as_ref().and_then(|u| u.output_tokens);
        let cost = match (prompt_tokens, completion_tokens) {
            (Some(p), Some(c)) => pricing::cost_for(model, p, c),
            _ => pricing::estimate_call_cost(model, &prompt.user),
        };

        Ok(crate::ProviderReply {
            provider: self.id().into(),
            model: model.to_string(),
            text: content,
            prompt_tokens,
            completion_tokens,
            cost,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_succeeds() {
        let config = LlmConfig {
            provider: "anthropic".into(),
            ..LlmConfig::default()
        };
        let adapter = AnthropicAdapter::new(&config, Arc::new(CallCounters::default()));
        assert!(adapter.is_ok());
    }

    #[test]
    fn text_blocks_concatenate() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "MATCH SCORE: 80/100"},
                {"type": "tool_use"},
                {"type": "text", "text": "\nSHOULD APPLY: Yes"}
            ],
            "usage": {"input_tokens": 100, "output_tokens": 20}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        let content: String = response
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect();
        assert!(content.contains("MATCH SCORE"));
        assert!(content.contains("SHOULD APPLY"));
    }

    #[tokio::test]
    async fn empty_model_fails_before_any_network() {
        let config = LlmConfig {
            provider: "anthropic".into(),
            ..LlmConfig::default()
        };
        let adapter = AnthropicAdapter::new(&config, Arc::new(CallCounters::default())).unwrap();
        let prompt = AnalysisPrompt {
            system: "s".into(),
            user: "u".into(),
        };
        let err = adapter.call("", &prompt).await.unwrap_err();
        assert!(matches!(
            err,
            ScoutError::Provider {
                kind: ProviderErrorKind::InvalidModel,
                ..
            }
        ));
    }
}
