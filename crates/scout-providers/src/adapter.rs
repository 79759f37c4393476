use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scout_core::{ProviderErrorKind, ScoutError};

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use scout_providers::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Evaluate this posting".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use scout_providers::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// Prompt pair sent to a provider for one analysis call.
///
/// Built by `scout-match` from the job posting and candidate profile; the
/// adapters treat both halves as opaque text.
#[derive(Debug, Clone)]
pub struct AnalysisPrompt {
    /// System instructions, including the expected reply format.
    pub system: String,
    /// The posting and profile under evaluation.
    pub user: String,
}

/// Raw output of one provider call, before parsing.
///
/// Transient: discarded after the verdict is extracted, except for the
/// accounting fields.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// Adapter that produced this reply.
    pub provider: String,
    /// Model that was called.
    pub model: String,
    /// Full response text.
    pub text: String,
    /// Prompt tokens reported by the provider, if any.
    pub prompt_tokens: Option<u32>,
    /// Completion tokens reported by the provider, if any.
    pub completion_tokens: Option<u32>,
    /// Cost of this call in USD, from reported usage when available,
    /// otherwise from the pricing estimate.
    pub cost: f64,
    /// Wall-clock time for the call.
    pub latency_ms: u64,
}

/// One upstream model provider.
///
/// One implementation per provider; the orchestration layer is written once
/// against this trait and never against a concrete provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider identifier, e.g. `"openai"`.
    fn id(&self) -> &str;

    /// Send one analysis prompt to the named model.
    ///
    /// `model` must be non-empty. Implementations raise on every failure
    /// mode (network, auth, rate-limit, malformed payload) rather than
    /// returning a partial reply, and increment the shared call counter for
    /// every attempt that reaches the wire.
    async fn call(&self, model: &str, prompt: &AnalysisPrompt)
        -> Result<ProviderReply, ScoutError>;
}

/// Shared per-model call counters.
///
/// Incremented by adapters for every issued call; read by tests and the
/// stats surface. The two-tier gate's cost-saving property is observable
/// here: a failed prescreen leaves the expensive model's count at zero.
///
/// # Examples
///
/// ```
/// use scout_providers::CallCounters;
///
/// let counters = CallCounters::default();
/// counters.increment("openai", "gpt-4o");
/// counters.increment("openai", "gpt-4o");
/// assert_eq!(counters.calls_for("gpt-4o"), 2);
/// assert_eq!(counters.calls_for("gpt-4o-mini"), 0);
/// assert_eq!(counters.total(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CallCounters {
    counts: Mutex<HashMap<String, u64>>,
}

impl CallCounters {
    /// Record one call to `model` through `provider`.
    pub fn increment(&self, provider: &str, model: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry(model.to_string()).or_insert(0) += 1;
        *counts.entry(format!("provider:{provider}")).or_insert(0) += 1;
    }

    /// Number of calls issued to `model`.
    pub fn calls_for(&self, model: &str) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(model).copied().unwrap_or(0)
    }

    /// Number of calls issued through `provider`.
    pub fn calls_for_provider(&self, provider: &str) -> u64 {
        self.calls_for(&format!("provider:{provider}"))
    }

    /// Total calls issued to models across all providers.
    pub fn total(&self) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts
            .iter()
            .filter(|(key, _)| !key.starts_with("provider:"))
            .map(|(_, n)| n)
            .sum()
    }
}

/// Reject empty model ids before anything reaches the wire.
pub(crate) fn require_model(provider: &str, model: &str) -> Result<(), ScoutError> {
    if model.trim().is_empty() {
        return Err(ScoutError::Provider {
            provider: provider.to_string(),
            kind: ProviderErrorKind::InvalidModel,
            message: "model id must be non-empty".into(),
        });
    }
    Ok(())
}

/// Map an HTTP status to a provider failure kind.
pub(crate) fn classify_status(status: reqwest::StatusCode) -> ProviderErrorKind {
    match status.as_u16() {
        401 | 403 => ProviderErrorKind::Auth,
        404 => ProviderErrorKind::InvalidModel,
        429 => ProviderErrorKind::RateLimited,
        500..=599 => ProviderErrorKind::Network,
        _ => ProviderErrorKind::MalformedReply,
    }
}

pub(crate) fn classify_send_error(err: &reqwest::Error) -> ProviderErrorKind {
    if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Network
    }
}

/// Bounded retry policy for transient failures.
pub(crate) const MAX_RETRIES: u32 = 2;

pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << attempt.min(4)))
}

/// POST a JSON body, retrying transient failures with backoff.
///
/// Returns the response text on 2xx. Non-2xx statuses and exhausted retries
/// surface as [`ScoutError::Provider`] with the classified kind.
pub(crate) async fn post_with_retry(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    headers: &[(&str, String)],
    body: &serde_json::Value,
) -> Result<String, ScoutError> {
    let mut attempt = 0u32;
    loop {
        let mut request = client.post(url).header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = match request.json(body).send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = classify_send_error(&err);
                if kind.is_transient() && attempt < MAX_RETRIES {
                    attempt += 1;
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                return Err(ScoutError::Provider {
                    provider: provider.to_string(),
                    kind,
                    message: format!("request failed: {err}"),
                });
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(text);
        }

        let kind = classify_status(status);
        if kind.is_transient() && attempt < MAX_RETRIES {
            attempt += 1;
            tracing::debug!(provider, %status, attempt, "retrying transient provider failure");
            tokio::time::sleep(backoff(attempt)).await;
            continue;
        }

        return Err(ScoutError::Provider {
            provider: provider.to_string(),
            kind,
            message: format!("API error {status}: {text}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::System,
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn counters_track_models_and_providers() {
        let counters = CallCounters::default();
        counters.increment("openai", "gpt-4o");
        counters.increment("openai", "gpt-4o-mini");
        counters.increment("anthropic", "claude-sonnet-4-20250514");

        assert_eq!(counters.calls_for("gpt-4o"), 1);
        assert_eq!(counters.calls_for_provider("openai"), 2);
        assert_eq!(counters.calls_for_provider("anthropic"), 1);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = require_model("openai", "  ").unwrap_err();
        match err {
            ScoutError::Provider { kind, .. } => {
                assert_eq!(kind, ProviderErrorKind::InvalidModel);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(require_model("openai", "gpt-4o").is_ok());
    }

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            ProviderErrorKind::Auth
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            ProviderErrorKind::InvalidModel
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderErrorKind::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            ProviderErrorKind::Network
        );
    }

    #[test]
    fn backoff_grows() {
        assert!(backoff(2) > backoff(1));
        // Capped so a misbehaving retry loop cannot sleep unbounded.
        assert_eq!(backoff(10), backoff(4));
    }
}
