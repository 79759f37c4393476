//! Provider adapters for the Scout analysis engine.
//!
//! One adapter per upstream provider, all behind [`ProviderAdapter`]:
//! an OpenAI-compatible chat-completions client and an Anthropic Messages
//! client, plus the shared call counters and price table the orchestration
//! layer leans on for accounting.

mod adapter;
mod anthropic;
mod openai;
pub mod pricing;

pub use adapter::{
    AnalysisPrompt, CallCounters, ChatMessage, ProviderAdapter, ProviderReply, Role,
};
pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

use std::sync::Arc;

use scout_core::{LlmConfig, ScoutError};

/// Build the adapter named by `config.provider`.
///
/// # Errors
///
/// Returns [`ScoutError::Config`] for an unknown provider name.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use scout_core::LlmConfig;
/// use scout_providers::{adapter_for, CallCounters};
///
/// let adapter = adapter_for(&LlmConfig::default(), Arc::new(CallCounters::default())).unwrap();
/// assert_eq!(adapter.id(), "openai");
/// ```
pub fn adapter_for(
    config: &LlmConfig,
    counters: Arc<CallCounters>,
) -> Result<Arc<dyn ProviderAdapter>, ScoutError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiAdapter::new(config, counters)?)),
        "anthropic" => Ok(Arc::new(AnthropicAdapter::new(config, counters)?)),
        other => Err(ScoutError::Config(format!(
            "unknown provider '{other}'; expected openai or anthropic"
        ))),
    }
}
