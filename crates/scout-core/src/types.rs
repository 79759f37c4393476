use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked job posting.
///
/// Mutated exclusively through the status state machine; the analysis
/// engine never writes it directly.
///
/// # Examples
///
/// ```
/// use scout_core::JobStatus;
///
/// let status: JobStatus = "ready_for_documents".parse().unwrap();
/// assert_eq!(status, JobStatus::ReadyForDocuments);
/// assert_eq!(status.to_string(), "ready_for_documents");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Freshly imported, not yet analyzed.
    Discovered,
    /// An analysis run is in flight.
    Analyzing,
    /// Scored at or above the configured minimum; worth preparing documents.
    ReadyForDocuments,
    /// Scored below the minimum; no further action planned.
    AnalyzedNoAction,
    /// The last analysis attempt failed. Reporting state only — the
    /// persisted status reverts to its pre-call value so the job stays
    /// retryable.
    AnalysisFailed,
}

impl JobStatus {
    /// Returns `true` when no further analysis transition is expected.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::ReadyForDocuments | JobStatus::AnalyzedNoAction
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Discovered => write!(f, "discovered"),
            JobStatus::Analyzing => write!(f, "analyzing"),
            JobStatus::ReadyForDocuments => write!(f, "ready_for_documents"),
            JobStatus::AnalyzedNoAction => write!(f, "analyzed_no_action"),
            JobStatus::AnalysisFailed => write!(f, "analysis_failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovered" => Ok(JobStatus::Discovered),
            "analyzing" => Ok(JobStatus::Analyzing),
            "ready_for_documents" => Ok(JobStatus::ReadyForDocuments),
            "analyzed_no_action" => Ok(JobStatus::AnalyzedNoAction),
            "analysis_failed" => Ok(JobStatus::AnalysisFailed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Which analysis strategy produced a verdict.
///
/// # Examples
///
/// ```
/// use scout_core::StrategyKind;
///
/// assert_eq!(StrategyKind::TwoTier.to_string(), "two_tier");
/// assert_eq!(serde_json::to_string(&StrategyKind::Fallback).unwrap(), "\"fallback\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Single call to the configured analysis model.
    Direct,
    /// Cheap prescreen gating an expensive full analysis.
    TwoTier,
    /// Parallel calls to several models, aggregated.
    Ensemble,
    /// Primary model with a secondary tried on failure.
    Fallback,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Direct => write!(f, "direct"),
            StrategyKind::TwoTier => write!(f, "two_tier"),
            StrategyKind::Ensemble => write!(f, "ensemble"),
            StrategyKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// The strategy selected for one analysis run.
///
/// A tagged variant carrying only the parameters relevant to that variant,
/// so a partially-configured strategy cannot be represented.
///
/// # Examples
///
/// ```
/// use scout_core::{AnalysisStrategy, StrategyKind};
///
/// let strategy = AnalysisStrategy::TwoTier {
///     prescreen_model: "gpt-4o-mini".into(),
///     analysis_model: "gpt-4o".into(),
///     threshold: 60,
/// };
/// assert_eq!(strategy.kind(), StrategyKind::TwoTier);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisStrategy {
    /// One call to a single model.
    Direct {
        /// Model to call.
        model: String,
    },
    /// Cheap model first; expensive model only if the prescreen passes.
    TwoTier {
        /// Cheap model issuing the prescreen verdict.
        prescreen_model: String,
        /// Expensive model for the full analysis.
        analysis_model: String,
        /// Minimum prescreen score admitting the expensive call.
        threshold: u8,
    },
    /// Concurrent calls to every listed model, aggregated into one verdict.
    Ensemble {
        /// Ordered, unique model ids.
        models: Vec<String>,
    },
    /// Primary model, with one secondary attempt if the primary fails.
    WithFallback {
        /// Model tried first.
        primary: String,
        /// Model tried only after a primary failure.
        secondary: String,
    },
}

impl AnalysisStrategy {
    /// The kind label recorded on verdicts produced by this strategy.
    pub fn kind(&self) -> StrategyKind {
        match self {
            AnalysisStrategy::Direct { .. } => StrategyKind::Direct,
            AnalysisStrategy::TwoTier { .. } => StrategyKind::TwoTier,
            AnalysisStrategy::Ensemble { .. } => StrategyKind::Ensemble,
            AnalysisStrategy::WithFallback { .. } => StrategyKind::Fallback,
        }
    }
}

/// How tightly ensemble members agreed, measured by score spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Standard deviation of scores ≤ 8.
    High,
    /// Standard deviation of scores ≤ 15.
    Medium,
    /// Wider spread than that.
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Whether ensemble members agreed on the apply recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agreement {
    /// Every succeeded model reached the same should-apply flag.
    Strong,
    /// At least one model disagreed.
    Mixed,
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agreement::Strong => write!(f, "strong"),
            Agreement::Mixed => write!(f, "mixed"),
        }
    }
}

/// One ensemble member's contribution.
///
/// # Examples
///
/// ```
/// use scout_core::ModelScore;
///
/// let score = ModelScore {
///     model: "claude-sonnet-4-20250514".into(),
///     score: 82,
///     should_apply: true,
/// };
/// assert!(score.should_apply);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelScore {
    /// Model id, as requested (completion order is not meaningful).
    pub model: String,
    /// This model's match score.
    pub score: u8,
    /// This model's effective apply recommendation.
    pub should_apply: bool,
}

/// Per-model breakdown attached to an ensemble verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleDetail {
    /// Scores from the models that succeeded, tagged by model id.
    pub individual_scores: Vec<ModelScore>,
    /// Arithmetic mean of succeeded scores, rounded to nearest integer.
    pub average_score: u8,
    /// Spread classification of the succeeded scores.
    pub confidence: Confidence,
    /// Whether all succeeded models agreed on should-apply.
    pub agreement: Agreement,
}

/// Prescreen outcome attached to a two-tier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescreeningDetail {
    /// Score from the cheap model.
    pub score: u8,
    /// Threshold the score was compared against.
    pub threshold: u8,
    /// `score >= threshold`.
    pub passed: bool,
}

/// The normalized result of one analysis run.
///
/// Produced once per successful orchestration call; the state machine
/// persists a subset onto the job record and stores the full verdict as an
/// opaque JSON blob for later display.
///
/// # Examples
///
/// ```
/// use scout_core::{MatchVerdict, StrategyKind};
///
/// let verdict = MatchVerdict {
///     match_score: 85,
///     should_apply: true,
///     key_strengths: vec!["Rust".into()],
///     potential_concerns: vec![],
///     talking_points: vec![],
///     cover_letter_strategy: None,
///     strategy_used: StrategyKind::Direct,
///     cost_estimate: 0.012,
///     ensemble: None,
///     prescreening: None,
/// };
/// assert_eq!(verdict.match_score, 85);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchVerdict {
    /// Candidate-to-job fit, 0–100.
    pub match_score: u8,
    /// Apply recommendation. The model's explicit answer wins; derived from
    /// the score against the configured minimum only when absent.
    pub should_apply: bool,
    /// What works in the candidate's favor, in model order.
    pub key_strengths: Vec<String>,
    /// Gaps or risks the model flagged, in model order.
    pub potential_concerns: Vec<String>,
    /// Suggested talking points for outreach, in model order.
    pub talking_points: Vec<String>,
    /// Optional angle for a cover letter.
    pub cover_letter_strategy: Option<String>,
    /// Strategy that produced this verdict.
    pub strategy_used: StrategyKind,
    /// Estimated spend for the run, USD.
    pub cost_estimate: f64,
    /// Per-model breakdown when the ensemble strategy ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensemble: Option<EnsembleDetail>,
    /// Prescreen outcome when the two-tier strategy ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescreening: Option<PrescreeningDetail>,
}

impl fmt::Display for MatchVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Match Analysis")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Score: {}/100 | Apply: {} | Strategy: {} | Est. cost: ${:.4}\n",
            self.match_score,
            if self.should_apply { "yes" } else { "no" },
            self.strategy_used,
            self.cost_estimate,
        )?;

        if let Some(detail) = &self.prescreening {
            writeln!(
                f,
                "Prescreen: {}/100 against threshold {} ({})\n",
                detail.score,
                detail.threshold,
                if detail.passed { "passed" } else { "failed" },
            )?;
        }
        if let Some(detail) = &self.ensemble {
            writeln!(
                f,
                "Ensemble: avg {} | confidence {} | agreement {}",
                detail.average_score, detail.confidence, detail.agreement,
            )?;
            for member in &detail.individual_scores {
                writeln!(f, "  {} -> {}/100", member.model, member.score)?;
            }
            writeln!(f)?;
        }

        for (heading, items) in [
            ("Key strengths", &self.key_strengths),
            ("Potential concerns", &self.potential_concerns),
            ("Talking points", &self.talking_points),
        ] {
            if !items.is_empty() {
                writeln!(f, "{heading}:")?;
                for item in items {
                    writeln!(f, "  - {item}")?;
                }
                writeln!(f)?;
            }
        }

        if let Some(strategy) = &self.cover_letter_strategy {
            writeln!(f, "Cover letter strategy: {strategy}")?;
        }
        Ok(())
    }
}

impl MatchVerdict {
    /// Render the verdict as markdown.
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_core::{MatchVerdict, StrategyKind};
    ///
    /// let verdict = MatchVerdict {
    ///     match_score: 82,
    ///     should_apply: true,
    ///     key_strengths: vec![],
    ///     potential_concerns: vec![],
    ///     talking_points: vec![],
    ///     cover_letter_strategy: None,
    ///     strategy_used: StrategyKind::Direct,
    ///     cost_estimate: 0.01,
    ///     ensemble: None,
    ///     prescreening: None,
    /// };
    /// assert!(verdict.to_markdown().contains("# Match Analysis"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Match Analysis\n\n");
        out.push_str(&format!(
            "**Score:** {}/100 | **Apply:** {} | **Strategy:** {} | **Est. cost:** ${:.4}\n\n",
            self.match_score,
            if self.should_apply { "yes" } else { "no" },
            self.strategy_used,
            self.cost_estimate,
        ));

        if let Some(detail) = &self.prescreening {
            out.push_str(&format!(
                "> Prescreen: {}/100 against threshold {} ({})\n\n",
                detail.score,
                detail.threshold,
                if detail.passed { "passed" } else { "failed" },
            ));
        }
        if let Some(detail) = &self.ensemble {
            out.push_str(&format!(
                "> Ensemble: avg {} | confidence {} | agreement {}\n\n",
                detail.average_score, detail.confidence, detail.agreement,
            ));
            for member in &detail.individual_scores {
                out.push_str(&format!("> - `{}` -> {}/100\n", member.model, member.score));
            }
            out.push('\n');
        }

        for (heading, items) in [
            ("Key strengths", &self.key_strengths),
            ("Potential concerns", &self.potential_concerns),
            ("Talking points", &self.talking_points),
        ] {
            if !items.is_empty() {
                out.push_str(&format!("## {heading}\n\n"));
                for item in items {
                    out.push_str(&format!("- {item}\n"));
                }
                out.push('\n');
            }
        }

        if let Some(strategy) = &self.cover_letter_strategy {
            out.push_str(&format!("## Cover letter strategy\n\n{strategy}\n"));
        }
        out
    }
}

/// A job posting under evaluation.
///
/// # Examples
///
/// ```
/// use scout_core::JobPosting;
///
/// let job = JobPosting {
///     id: "acme-staff-eng".into(),
///     title: "Staff Engineer".into(),
///     company: "Acme".into(),
///     description: "Build the platform.".into(),
///     url: None,
/// };
/// assert_eq!(job.company, "Acme");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    /// Stable identifier for the posting.
    pub id: String,
    /// Role title.
    pub title: String,
    /// Hiring company.
    pub company: String,
    /// Full posting text.
    pub description: String,
    /// Source URL, if known.
    pub url: Option<String>,
}

/// The candidate profile postings are scored against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    /// Free-text background summary.
    pub summary: String,
    /// Skills worth surfacing to the model.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Years of relevant experience, if stated.
    pub years_experience: Option<u8>,
}

/// Immutable input for one analysis run.
///
/// Created fresh per invocation and never persisted.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// The posting to evaluate.
    pub job: JobPosting,
    /// Profile to score against.
    pub profile: CandidateProfile,
    /// Optional strategy override; configuration decides when absent.
    pub strategy_override: Option<AnalysisStrategy>,
}

impl AnalysisRequest {
    /// Build a request with no strategy override.
    pub fn new(job: JobPosting, profile: CandidateProfile) -> Self {
        Self {
            job,
            profile,
            strategy_override: None,
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument
/// parsing.
///
/// # Examples
///
/// ```
/// use scout_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_roundtrips_strings() {
        for status in [
            JobStatus::Discovered,
            JobStatus::Analyzing,
            JobStatus::ReadyForDocuments,
            JobStatus::AnalyzedNoAction,
            JobStatus::AnalysisFailed,
        ] {
            let parsed: JobStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("pending".parse::<JobStatus>().is_err());
    }

    #[test]
    fn job_status_terminal_states() {
        assert!(JobStatus::ReadyForDocuments.is_terminal());
        assert!(JobStatus::AnalyzedNoAction.is_terminal());
        assert!(!JobStatus::Discovered.is_terminal());
        assert!(!JobStatus::Analyzing.is_terminal());
    }

    #[test]
    fn strategy_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StrategyKind::TwoTier).unwrap(),
            "\"two_tier\""
        );
        let parsed: StrategyKind = serde_json::from_str("\"ensemble\"").unwrap();
        assert_eq!(parsed, StrategyKind::Ensemble);
    }

    #[test]
    fn strategy_variants_report_their_kind() {
        let direct = AnalysisStrategy::Direct {
            model: "gpt-4o".into(),
        };
        assert_eq!(direct.kind(), StrategyKind::Direct);

        let fallback = AnalysisStrategy::WithFallback {
            primary: "gpt-4o".into(),
            secondary: "gpt-4o-mini".into(),
        };
        assert_eq!(fallback.kind(), StrategyKind::Fallback);

        let ensemble = AnalysisStrategy::Ensemble {
            models: vec!["a".into(), "b".into()],
        };
        assert_eq!(ensemble.kind(), StrategyKind::Ensemble);
    }

    #[test]
    fn verdict_serializes_camel_case() {
        let verdict = MatchVerdict {
            match_score: 70,
            should_apply: true,
            key_strengths: vec![],
            potential_concerns: vec![],
            talking_points: vec![],
            cover_letter_strategy: None,
            strategy_used: StrategyKind::Direct,
            cost_estimate: 0.0,
            ensemble: None,
            prescreening: None,
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert!(json.get("matchScore").is_some());
        assert!(json.get("match_score").is_none());
        // Empty optional sections are omitted from the blob.
        assert!(json.get("ensemble").is_none());
    }

    #[test]
    fn verdict_blob_roundtrips() {
        let verdict = MatchVerdict {
            match_score: 82,
            should_apply: true,
            key_strengths: vec!["Rust".into(), "distributed systems".into()],
            potential_concerns: vec!["no Go experience".into()],
            talking_points: vec![],
            cover_letter_strategy: Some("lead with platform work".into()),
            strategy_used: StrategyKind::Ensemble,
            cost_estimate: 0.034,
            ensemble: Some(EnsembleDetail {
                individual_scores: vec![
                    ModelScore {
                        model: "a".into(),
                        score: 85,
                        should_apply: true,
                    },
                    ModelScore {
                        model: "b".into(),
                        score: 78,
                        should_apply: true,
                    },
                ],
                average_score: 82,
                confidence: Confidence::High,
                agreement: Agreement::Strong,
            }),
            prescreening: None,
        };
        let blob = serde_json::to_string(&verdict).unwrap();
        let back: MatchVerdict = serde_json::from_str(&blob).unwrap();
        assert_eq!(back, verdict);
    }

    #[test]
    fn confidence_and_agreement_display() {
        assert_eq!(Confidence::High.to_string(), "high");
        assert_eq!(Confidence::Medium.to_string(), "medium");
        assert_eq!(Confidence::Low.to_string(), "low");
        assert_eq!(Agreement::Strong.to_string(), "strong");
        assert_eq!(Agreement::Mixed.to_string(), "mixed");
    }

    #[test]
    fn display_and_markdown_output() {
        let verdict = MatchVerdict {
            match_score: 82,
            should_apply: true,
            key_strengths: vec!["Rust".into()],
            potential_concerns: vec!["no Go".into()],
            talking_points: vec![],
            cover_letter_strategy: Some("lead with platform work".into()),
            strategy_used: StrategyKind::TwoTier,
            cost_estimate: 0.0213,
            ensemble: None,
            prescreening: Some(PrescreeningDetail {
                score: 74,
                threshold: 60,
                passed: true,
            }),
        };
        let text = format!("{verdict}");
        assert!(text.contains("82/100"));
        assert!(text.contains("two_tier"));
        assert!(text.contains("Prescreen: 74/100"));
        assert!(text.contains("- Rust"));

        let md = verdict.to_markdown();
        assert!(md.contains("# Match Analysis"));
        assert!(md.contains("## Key strengths"));
        assert!(md.contains("lead with platform work"));
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
