use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScoutError;

/// Top-level configuration loaded from `.scout.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use scout_core::ScoutConfig;
///
/// let config = ScoutConfig::default();
/// assert_eq!(config.matching.min_match_score, 70);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Match decision settings.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Two-tier prescreening settings.
    #[serde(default)]
    pub prescreening: PrescreeningConfig,
    /// Multi-model ensemble settings.
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    /// Advisory analysis cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ScoutConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Io`] if the file cannot be read, or
    /// [`ScoutError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use scout_core::ScoutConfig;
    /// use std::path::Path;
    ///
    /// let config = ScoutConfig::from_file(Path::new(".scout.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, ScoutError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_core::ScoutConfig;
    ///
    /// let toml = r#"
    /// [matching]
    /// min_match_score = 80
    /// "#;
    /// let config = ScoutConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.matching.min_match_score, 80);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ScoutError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// The API key for the active provider.
    ///
    /// Prefers the config file; falls back to `OPENAI_API_KEY` or
    /// `ANTHROPIC_API_KEY` depending on `llm.provider`.
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(key) = &self.llm.api_key {
            return Some(key.clone());
        }
        let var = match self.llm.provider.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        std::env::var(var).ok()
    }

    /// Starter configuration written by `scout init`.
    pub fn starter_toml() -> &'static str {
        STARTER_TOML
    }
}

const STARTER_TOML: &str = r#"# Scout configuration. See README for all options.

[llm]
provider = "openai"
analysis_model = "gpt-4o"
fallback_model = "gpt-4o-mini"
# api_key falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY

[matching]
min_match_score = 70
max_cost_per_job = 0.50

[prescreening]
enabled = false
model = "gpt-4o-mini"
threshold = 60

[ensemble]
enabled = false
models = []

[cache]
enabled = true
ttl_secs = 3600
"#;

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use scout_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.analysis_model, "gpt-4o");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`"openai"` for any OpenAI-compatible endpoint, or
    /// `"anthropic"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model used for the full analysis.
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,
    /// Model tried when the primary analysis call fails.
    pub fallback_model: Option<String>,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Per-call timeout in seconds (default: 120).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_analysis_model() -> String {
    "gpt-4o".into()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            analysis_model: default_analysis_model(),
            fallback_model: None,
            api_key: None,
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Match decision configuration.
///
/// # Examples
///
/// ```
/// use scout_core::MatchingConfig;
///
/// let config = MatchingConfig::default();
/// assert_eq!(config.min_match_score, 70);
/// assert_eq!(config.max_cost_per_job, 0.50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum score routing a job to `ready_for_documents` (default: 70).
    #[serde(default = "default_min_match_score")]
    pub min_match_score: u8,
    /// Cost ceiling per job's analysis run, USD (default: 0.50).
    #[serde(default = "default_max_cost_per_job")]
    pub max_cost_per_job: f64,
}

fn default_min_match_score() -> u8 {
    70
}

fn default_max_cost_per_job() -> f64 {
    0.50
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_match_score: default_min_match_score(),
            max_cost_per_job: default_max_cost_per_job(),
        }
    }
}

/// Two-tier prescreening configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescreeningConfig {
    /// When `true`, run the cheap model first and gate the expensive call.
    #[serde(default)]
    pub enabled: bool,
    /// Cheap model issuing the prescreen verdict (default: `"gpt-4o-mini"`).
    #[serde(default = "default_prescreen_model")]
    pub model: String,
    /// Minimum prescreen score admitting the expensive call (default: 60).
    #[serde(default = "default_prescreen_threshold")]
    pub threshold: u8,
}

fn default_prescreen_model() -> String {
    "gpt-4o-mini".into()
}

fn default_prescreen_threshold() -> u8 {
    60
}

impl Default for PrescreeningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_prescreen_model(),
            threshold: default_prescreen_threshold(),
        }
    }
}

/// Multi-model ensemble configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// When `true`, call every model in `models` and aggregate.
    #[serde(default)]
    pub enabled: bool,
    /// Ordered model ids; at least two are required when enabled.
    #[serde(default)]
    pub models: Vec<String>,
}

/// Advisory analysis cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When `true`, identical job text within the TTL reuses the stored
    /// verdict instead of re-analyzing.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// How long a cached verdict stays valid, seconds (default: 3600).
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = ScoutConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.analysis_model, "gpt-4o");
        assert_eq!(config.llm.request_timeout_secs, 120);
        assert_eq!(config.matching.min_match_score, 70);
        assert_eq!(config.matching.max_cost_per_job, 0.50);
        assert!(!config.prescreening.enabled);
        assert_eq!(config.prescreening.model, "gpt-4o-mini");
        assert_eq!(config.prescreening.threshold, 60);
        assert!(!config.ensemble.enabled);
        assert!(config.ensemble.models.is_empty());
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[matching]
min_match_score = 75
max_cost_per_job = 0.25
"#;
        let config = ScoutConfig::from_toml(toml).unwrap();
        assert_eq!(config.matching.min_match_score, 75);
        assert_eq!(config.matching.max_cost_per_job, 0.25);
        // Untouched sections keep their defaults.
        assert_eq!(config.llm.analysis_model, "gpt-4o");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
provider = "anthropic"
analysis_model = "claude-sonnet-4-20250514"
fallback_model = "claude-3-5-haiku-20241022"
base_url = "https://api.anthropic.com"
request_timeout_secs = 60

[prescreening]
enabled = true
model = "claude-3-5-haiku-20241022"
threshold = 55

[ensemble]
enabled = true
models = ["claude-sonnet-4-20250514", "gpt-4o", "gpt-4o-mini"]

[cache]
enabled = false
"#;
        let config = ScoutConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(
            config.llm.fallback_model.as_deref(),
            Some("claude-3-5-haiku-20241022")
        );
        assert_eq!(config.llm.request_timeout_secs, 60);
        assert!(config.prescreening.enabled);
        assert_eq!(config.prescreening.threshold, 55);
        assert!(config.ensemble.enabled);
        assert_eq!(config.ensemble.models.len(), 3);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ScoutConfig::from_toml("").unwrap();
        assert_eq!(config.matching.min_match_score, 70);
        assert_eq!(config.llm.analysis_model, "gpt-4o");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = ScoutConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn starter_toml_parses() {
        let config = ScoutConfig::from_toml(ScoutConfig::starter_toml()).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.fallback_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn config_api_key_wins_over_env() {
        let config = ScoutConfig {
            llm: LlmConfig {
                api_key: Some("sk-from-config".into()),
                ..LlmConfig::default()
            },
            ..ScoutConfig::default()
        };
        assert_eq!(config.resolved_api_key().as_deref(), Some("sk-from-config"));
    }
}
