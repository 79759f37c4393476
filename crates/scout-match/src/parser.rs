use scout_core::ScoutError;

/// The fields recovered from one model reply.
///
/// A partial verdict: the orchestrator supplies strategy, cost, and the
/// derived apply recommendation when the model left `SHOULD APPLY` out.
///
/// # Examples
///
/// ```
/// use scout_match::parser::parse_verdict;
///
/// let text = "MATCH SCORE: 85/100\n\nSHOULD APPLY: Yes";
/// let verdict = parse_verdict(text).unwrap();
/// assert_eq!(verdict.match_score, 85);
/// assert_eq!(verdict.should_apply, Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVerdict {
    /// Candidate-to-job fit, 0–100.
    pub match_score: u8,
    /// Explicit apply recommendation, when the model gave one.
    pub should_apply: Option<bool>,
    /// Bullets under `KEY STRENGTHS`.
    pub key_strengths: Vec<String>,
    /// Bullets under `POTENTIAL CONCERNS`.
    pub potential_concerns: Vec<String>,
    /// Bullets under `RECOMMENDED TALKING POINTS`.
    pub talking_points: Vec<String>,
    /// Paragraph under `COVER LETTER STRATEGY`.
    pub cover_letter_strategy: Option<String>,
}

impl ParsedVerdict {
    /// The apply recommendation with the derivation rule applied: the
    /// model's explicit answer wins; otherwise compare the score against
    /// the configured minimum.
    ///
    /// # Examples
    ///
    /// ```
    /// use scout_match::parser::parse_verdict;
    ///
    /// // Explicit "No" overrides a passing score.
    /// let verdict = parse_verdict("MATCH SCORE: 85/100\nSHOULD APPLY: No").unwrap();
    /// assert!(!verdict.effective_should_apply(70));
    ///
    /// // No explicit line: derived from the threshold.
    /// let verdict = parse_verdict("MATCH SCORE: 85/100").unwrap();
    /// assert!(verdict.effective_should_apply(70));
    /// ```
    pub fn effective_should_apply(&self, min_match_score: u8) -> bool {
        self.should_apply
            .unwrap_or(self.match_score >= min_match_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Strengths,
    Concerns,
    TalkingPoints,
    CoverLetter,
}

/// Labels that open a section. Matched case-insensitively at line start.
const LABELS: &[(&str, Section)] = &[
    ("key strengths", Section::Strengths),
    ("potential concerns", Section::Concerns),
    ("recommended talking points", Section::TalkingPoints),
    ("cover letter strategy", Section::CoverLetter),
];

/// Extract a structured verdict from free-text model output.
///
/// Scans line-oriented sections identified by case-insensitive labels.
/// Bullet lines beginning with `-` under a label are collected into that
/// field's list until a blank line or the next label. The score line is
/// parsed as `N/100`; a missing or unparsable score fails with
/// [`ScoutError::MalformedResponse`] rather than defaulting to zero — the
/// caller decides whether to retry or fail the job.
///
/// Pure function: parsing the same text twice yields identical verdicts,
/// and well-formed empty sections are valid.
///
/// # Errors
///
/// Returns [`ScoutError::MalformedResponse`] when no usable `MATCH SCORE`
/// line is present or the score is out of range.
///
/// # Examples
///
/// ```
/// use scout_match::parser::parse_verdict;
///
/// let text = "\
/// MATCH SCORE: 78/100
///
/// KEY STRENGTHS:
/// - Deep Rust experience
/// - Has shipped storage systems
///
/// POTENTIAL CONCERNS:
///
/// SHOULD APPLY: Yes";
/// let verdict = parse_verdict(text).unwrap();
/// assert_eq!(verdict.match_score, 78);
/// assert_eq!(verdict.key_strengths.len(), 2);
/// assert!(verdict.potential_concerns.is_empty());
/// ```
pub fn parse_verdict(raw: &str) -> Result<ParsedVerdict, ScoutError> {
    let mut match_score: Option<u8> = None;
    let mut should_apply: Option<bool> = None;
    let mut key_strengths = Vec::new();
    let mut potential_concerns = Vec::new();
    let mut talking_points = Vec::new();
    let mut cover_letter_lines: Vec<String> = Vec::new();
    let mut section = Section::None;

    for line in raw.lines() {
        let stripped = strip_decoration(line);

        if stripped.is_empty() {
            // A blank line closes the current bullet section but not the
            // cover letter paragraph, which may span blank-separated lines
            // until the next label.
            if section != Section::CoverLetter {
                section = Section::None;
            }
            continue;
        }

        let lower = stripped.to_lowercase();

        if let Some(rest) = label_rest(&lower, stripped, "match score") {
            match_score = Some(parse_score(rest)?);
            section = Section::None;
            continue;
        }
        if let Some(rest) = label_rest(&lower, stripped, "should apply") {
            should_apply = parse_flag(rest);
            section = Section::None;
            continue;
        }

        let mut matched_label = false;
        for (label, next) in LABELS {
            if let Some(rest) = label_rest(&lower, stripped, label) {
                section = *next;
                if *next == Section::CoverLetter && !rest.is_empty() {
                    cover_letter_lines.push(rest.to_string());
                }
                matched_label = true;
                break;
            }
        }
        if matched_label {
            continue;
        }

        match section {
            Section::Strengths | Section::Concerns | Section::TalkingPoints => {
                if let Some(bullet) = stripped.strip_prefix('-') {
                    let bullet = bullet.trim();
                    if !bullet.is_empty() {
                        match section {
                            Section::Strengths => key_strengths.push(bullet.to_string()),
                            Section::Concerns => potential_concerns.push(bullet.to_string()),
                            Section::TalkingPoints => talking_points.push(bullet.to_string()),
                            _ => unreachable!(),
                        }
                    }
                }
            }
            Section::CoverLetter => cover_letter_lines.push(stripped.to_string()),
            Section::None => {}
        }
    }

    let match_score = match_score.ok_or_else(|| {
        ScoutError::MalformedResponse("no MATCH SCORE line found in model output".into())
    })?;

    let cover_letter_strategy = if cover_letter_lines.is_empty() {
        None
    } else {
        Some(cover_letter_lines.join(" "))
    };

    Ok(ParsedVerdict {
        match_score,
        should_apply,
        key_strengths,
        potential_concerns,
        talking_points,
        cover_letter_strategy,
    })
}

/// Drop markdown decoration models like to add around headings.
fn strip_decoration(line: &str) -> &str {
    line.trim().trim_matches(|c| c == '*' || c == '#').trim()
}

/// If `lower` starts with `label`, return the original text after the
/// label and any separator.
fn label_rest<'a>(lower: &str, original: &'a str, label: &str) -> Option<&'a str> {
    if !lower.starts_with(label) {
        return None;
    }
    let rest = original
        .get(label.len()..)?
        .trim_start_matches([':', ' ', '\t', '*']);
    Some(rest.trim())
}

/// Parse a `N/100` score value; a bare integer is tolerated.
fn parse_score(rest: &str) -> Result<u8, ScoutError> {
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(ScoutError::MalformedResponse(format!(
            "unparsable match score: {rest:?}"
        )));
    }
    let score: u32 = digits
        .parse()
        .map_err(|_| ScoutError::MalformedResponse(format!("unparsable match score: {rest:?}")))?;
    if score > 100 {
        return Err(ScoutError::MalformedResponse(format!(
            "match score out of range: {score}"
        )));
    }
    Ok(score as u8)
}

/// Case-insensitive Yes/No/True/False; anything else counts as absent.
fn parse_flag(rest: &str) -> Option<bool> {
    let word: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    match word.to_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = "\
MATCH SCORE: 82/100

KEY STRENGTHS:
- Strong Rust background
- Storage engine work maps directly

POTENTIAL CONCERNS:
- No Kubernetes exposure

RECOMMENDED TALKING POINTS:
- Ask about the replication roadmap

SHOULD APPLY: Yes

COVER LETTER STRATEGY:
Lead with the storage engine rewrite and quantify the latency win.";

    #[test]
    fn parses_full_response() {
        let verdict = parse_verdict(FULL_RESPONSE).unwrap();
        assert_eq!(verdict.match_score, 82);
        assert_eq!(verdict.should_apply, Some(true));
        assert_eq!(verdict.key_strengths.len(), 2);
        assert_eq!(verdict.potential_concerns, vec!["No Kubernetes exposure"]);
        assert_eq!(verdict.talking_points.len(), 1);
        assert!(verdict
            .cover_letter_strategy
            .as_deref()
            .unwrap()
            .contains("latency win"));
    }

    #[test]
    fn recovers_every_valid_score() {
        for n in 0..=100u8 {
            let text = format!("MATCH SCORE: {n}/100");
            let verdict = parse_verdict(&text).unwrap();
            assert_eq!(verdict.match_score, n);
        }
    }

    #[test]
    fn missing_score_is_an_error() {
        let err = parse_verdict("KEY STRENGTHS:\n- Rust").unwrap_err();
        assert!(matches!(err, ScoutError::MalformedResponse(_)));
    }

    #[test]
    fn unparsable_score_is_an_error() {
        assert!(parse_verdict("MATCH SCORE: high/100").is_err());
        assert!(parse_verdict("MATCH SCORE: 150/100").is_err());
    }

    #[test]
    fn labels_match_case_insensitively() {
        let text = "match score: 60/100\nkey strengths:\n- one\nShould Apply: NO";
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.match_score, 60);
        assert_eq!(verdict.key_strengths, vec!["one"]);
        assert_eq!(verdict.should_apply, Some(false));
    }

    #[test]
    fn accepts_true_false_flags() {
        let verdict = parse_verdict("MATCH SCORE: 50/100\nSHOULD APPLY: true").unwrap();
        assert_eq!(verdict.should_apply, Some(true));
        let verdict = parse_verdict("MATCH SCORE: 50/100\nSHOULD APPLY: False").unwrap();
        assert_eq!(verdict.should_apply, Some(false));
    }

    #[test]
    fn garbage_flag_counts_as_absent() {
        let verdict = parse_verdict("MATCH SCORE: 90/100\nSHOULD APPLY: maybe").unwrap();
        assert_eq!(verdict.should_apply, None);
        assert!(verdict.effective_should_apply(70));
    }

    #[test]
    fn blank_line_closes_a_bullet_section() {
        let text = "\
MATCH SCORE: 70/100

KEY STRENGTHS:
- counted

- not counted, section closed by the blank line";
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.key_strengths, vec!["counted"]);
    }

    #[test]
    fn next_label_closes_a_bullet_section() {
        let text = "\
MATCH SCORE: 70/100
KEY STRENGTHS:
- a strength
POTENTIAL CONCERNS:
- a concern";
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.key_strengths, vec!["a strength"]);
        assert_eq!(verdict.potential_concerns, vec!["a concern"]);
    }

    #[test]
    fn empty_sections_are_valid() {
        let text = "\
MATCH SCORE: 40/100
KEY STRENGTHS:
POTENTIAL CONCERNS:
RECOMMENDED TALKING POINTS:
SHOULD APPLY: No";
        let verdict = parse_verdict(text).unwrap();
        assert!(verdict.key_strengths.is_empty());
        assert!(verdict.potential_concerns.is_empty());
        assert!(verdict.talking_points.is_empty());
    }

    #[test]
    fn markdown_decoration_is_tolerated() {
        let text = "**MATCH SCORE:** 77/100\n\n## KEY STRENGTHS:\n- bold model";
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.match_score, 77);
        assert_eq!(verdict.key_strengths, vec!["bold model"]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_verdict(FULL_RESPONSE).unwrap();
        let second = parse_verdict(FULL_RESPONSE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn derived_flag_tracks_threshold() {
        let verdict = parse_verdict("MATCH SCORE: 70/100").unwrap();
        assert!(verdict.effective_should_apply(70));
        assert!(!verdict.effective_should_apply(71));
    }

    #[test]
    fn bare_integer_score_is_tolerated() {
        let verdict = parse_verdict("MATCH SCORE: 64").unwrap();
        assert_eq!(verdict.match_score, 64);
    }
}
