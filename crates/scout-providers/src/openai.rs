use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use scout_core::{LlmConfig, ProviderErrorKind, ScoutError};

use crate::adapter::{
    post_with_retry, require_model, AnalysisPrompt, CallCounters, ChatMessage, ProviderAdapter,
    Role,
};
use crate::pricing;

/// OpenAI-compatible chat completions adapter.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use scout_core::LlmConfig;
/// use scout_providers::{CallCounters, OpenAiAdapter};
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let adapter = OpenAiAdapter::new(&config, Arc::new(CallCounters::default())).unwrap();
/// ```
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    counters: Arc<CallCounters>,
}

impl OpenAiAdapter {
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
                provider: "openai".into(),
                kind: ProviderErrorKind::Network,
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".into()),
            counters,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &str {
        "openai"
    }

    async fn call(
        &self,
        model: &str,
        prompt: &AnalysisPrompt,
    ) -> Result<crate::ProviderReply, ScoutError> {
        require_model(self.id(), model)?;
        self.counters.increment(self.id(), model);

        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: prompt.system.clone(),
            },
            ChatMessage {
                role: Role::User,
                content: prompt.user.clone(),
            },
        ];
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": 0.2,
        });

        let mut headers = Vec::new();
        if let Some(api_key) = &self.api_key {
            headers.push(("Authorization", format!("Bearer {api_key}")));
        }

        let started = Instant::now();
        let text = post_with_retry(&self.client, self.id(), &url, &headers, &body).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let response: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ScoutError::Provider {
                provider: self.id().into(),
                kind: ProviderErrorKind::MalformedReply,
                message: format!("failed to parse response: {e}"),
            })?;

        let content = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| ScoutError::Provider {
                provider: self.id().into(),
                kind: ProviderErrorKind::MalformedReply,
                message: format!("unexpected response structure: {response}"),
            })?;

        let prompt_tokens = response
            .pointer("/usage/prompt_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);
        let completion_tokens = response
            .pointer("/usage/completion_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);

        let cost = match (prompt_tokens, completion_tokens) {
            (Some(p), Some(c)) => pricing::cost_for(model, p, c),
            _ => pricing::estimate_call_cost(model, &prompt.user),
        };

        Ok(crate::ProviderReply {
            provider: self.id().into(),
            model: model.to_string(),
            text: content.to_string(),
            prompt_tokens,
            completion_tokens,
            cost,
            latency_ms,
        })
    }
}
