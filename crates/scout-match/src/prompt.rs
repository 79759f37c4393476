use scout_core::AnalysisRequest;
use scout_providers::AnalysisPrompt;

const SYSTEM_PROMPT: &str = "\
You are Scout, a pragmatic job-search analyst. Evaluate how well a candidate \
matches a job posting. Be honest about gaps; an inflated score wastes the \
candidate's time.

Reply in exactly this format, nothing else:

MATCH SCORE: <number>/100

KEY STRENGTHS:
- <strength>

POTENTIAL CONCERNS:
- <concern>

RECOMMENDED TALKING POINTS:
- <talking point>

SHOULD APPLY: <Yes or No>

COVER LETTER STRATEGY:
<one short paragraph>

Leave a section's bullet list empty if you have nothing for it, but keep \
every heading.";

/// Build the system prompt pinning the reply format the parser consumes.
///
/// # Examples
///
/// ```
/// use scout_match::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt();
/// assert!(prompt.contains("MATCH SCORE"));
/// assert!(prompt.contains("SHOULD APPLY"));
/// ```
pub fn build_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Build the user prompt from the posting and candidate profile.
///
/// # Examples
///
/// ```
/// use scout_core::{AnalysisRequest, CandidateProfile, JobPosting};
/// use scout_match::prompt::build_user_prompt;
///
/// let request = AnalysisRequest::new(
///     JobPosting {
///         id: "j1".into(),
///         title: "Platform Engineer".into(),
///         company: "Acme".into(),
///         description: "Own the build system.".into(),
///         url: None,
///     },
///     CandidateProfile::default(),
/// );
/// let prompt = build_user_prompt(&request);
/// assert!(prompt.contains("Acme"));
/// assert!(prompt.contains("Platform Engineer"));
/// ```
pub fn build_user_prompt(request: &AnalysisRequest) -> String {
    let mut prompt = format!(
        "Job: {title} at {company}\n\nPosting:\n{description}\n",
        title = request.job.title,
        company = request.job.company,
        description = request.job.description,
    );

    prompt.push_str("\nCandidate:\n");
    if !request.profile.summary.is_empty() {
        prompt.push_str(&request.profile.summary);
        prompt.push('\n');
    }
    if !request.profile.skills.is_empty() {
        prompt.push_str(&format!("Skills: {}\n", request.profile.skills.join(", ")));
    }
    if let Some(years) = request.profile.years_experience {
        prompt.push_str(&format!("Years of experience: {years}\n"));
    }
    prompt
}

/// Assemble the full prompt pair for one analysis call.
pub fn build_analysis_prompt(request: &AnalysisRequest) -> AnalysisPrompt {
    AnalysisPrompt {
        system: build_system_prompt(),
        user: build_user_prompt(request),
    }
}
