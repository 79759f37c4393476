use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{JobStatus, StrategyKind};

/// Classification of a provider failure.
///
/// Transient kinds (network, rate-limit, timeout) are worth retrying;
/// permanent kinds (auth, invalid model) are not.
///
/// # Examples
///
/// ```
/// use scout_core::ProviderErrorKind;
///
/// assert!(ProviderErrorKind::RateLimited.is_transient());
/// assert!(!ProviderErrorKind::Auth.is_transient());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Connection failure or dropped response.
    Network,
    /// Provider returned HTTP 429.
    RateLimited,
    /// The call exceeded its deadline.
    Timeout,
    /// Invalid or missing credentials.
    Auth,
    /// The requested model does not exist for this provider.
    InvalidModel,
    /// The provider answered, but the payload was not usable.
    MalformedReply,
}

impl ProviderErrorKind {
    /// Returns `true` for kinds a caller may retry.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Network | ProviderErrorKind::RateLimited | ProviderErrorKind::Timeout
        )
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Network => write!(f, "network"),
            ProviderErrorKind::RateLimited => write!(f, "rate_limited"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Auth => write!(f, "auth"),
            ProviderErrorKind::InvalidModel => write!(f, "invalid_model"),
            ProviderErrorKind::MalformedReply => write!(f, "malformed_reply"),
        }
    }
}

/// Errors that can occur across the Scout platform.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the
/// boundary.
///
/// # Examples
///
/// ```
/// use scout_core::ScoutError;
///
/// let err = ScoutError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An upstream model provider failed.
    #[error("{provider} provider error ({kind}): {message}")]
    Provider {
        /// Provider identifier, e.g. `"openai"`.
        provider: String,
        /// Failure classification.
        kind: ProviderErrorKind,
        /// Human-readable detail.
        message: String,
    },

    /// The model answered but no verdict could be parsed from the text.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// The cost policy refused a call. A deliberate stop, not a fault.
    #[error("cost ceiling reached for job {job_id}: {attempted:.4} would exceed {limit:.4}")]
    BudgetExceeded {
        /// Job whose running total would overflow.
        job_id: String,
        /// Running total plus the estimated call cost.
        attempted: f64,
        /// Configured `max_cost_per_job`.
        limit: f64,
    },

    /// Too few ensemble members produced a usable verdict.
    #[error("ensemble aggregation needs at least {required} verdicts, got {succeeded}")]
    InsufficientEnsembleData {
        /// Number of models that returned a parseable verdict.
        succeeded: usize,
        /// Minimum required for aggregation.
        required: usize,
    },

    /// An analysis run failed; wraps the first unrecoverable underlying error.
    #[error("{strategy} analysis failed for job {job_id}: {source}")]
    Orchestration {
        /// Strategy that was executing when the failure occurred.
        strategy: StrategyKind,
        /// Job being analyzed.
        job_id: String,
        /// The originating error.
        #[source]
        source: Box<ScoutError>,
    },

    /// A status transition was requested from a state that does not allow it.
    #[error("invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        /// Job whose transition was rejected.
        job_id: String,
        /// Status found on the record.
        from: JobStatus,
        /// Status that was requested.
        to: JobStatus,
    },

    /// The job record does not exist.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Job store failure.
    #[error("store error: {0}")]
    Store(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ScoutError {
    /// Returns `true` if retrying the same request could plausibly succeed.
    ///
    /// Unwraps orchestration context to inspect the originating error.
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_core::{ProviderErrorKind, ScoutError};
    ///
    /// let err = ScoutError::Provider {
    ///     provider: "openai".into(),
    ///     kind: ProviderErrorKind::Network,
    ///     message: "connection reset".into(),
    /// };
    /// assert!(err.is_retryable());
    /// assert!(!ScoutError::MalformedResponse("no score".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            ScoutError::Provider { kind, .. } => kind.is_transient(),
            ScoutError::Orchestration { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The innermost error, unwrapping any orchestration context.
    pub fn origin(&self) -> &ScoutError {
        match self {
            ScoutError::Orchestration { source, .. } => source.origin(),
            other => other,
        }
    }
}
