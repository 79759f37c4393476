//! Core types, configuration, and error handling for the Scout platform.
//!
//! This crate provides the shared foundation used by all other Scout crates:
//! - [`ScoutError`] — unified error type using `thiserror`
//! - [`ScoutConfig`] — configuration loaded from `.scout.toml`
//! - Shared types: [`MatchVerdict`], [`JobStatus`], [`AnalysisStrategy`],
//!   [`JobPosting`], [`CandidateProfile`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CacheConfig, EnsembleConfig, LlmConfig, MatchingConfig, PrescreeningConfig, ScoutConfig,
};
pub use error::{ProviderErrorKind, ScoutError};
pub use types::{
    Agreement, AnalysisRequest, AnalysisStrategy, CandidateProfile, Confidence, EnsembleDetail,
    JobPosting, JobStatus, MatchVerdict, ModelScore, OutputFormat, PrescreeningDetail,
    StrategyKind,
};

/// A convenience `Result` type for Scout operations.
pub type Result<T> = std::result::Result<T, ScoutError>;
