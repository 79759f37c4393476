//! Per-model price table and token estimation.
//!
//! The budget policy authorizes calls *before* they are issued, so an
//! estimate has to exist without a usage report. Rates are USD per million
//! tokens; unknown models fall back to a conservative default.

/// (model id prefix, input $/Mtok, output $/Mtok). Longest prefix wins.
const PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude-sonnet", 3.00, 15.00),
    ("claude-opus", 15.00, 75.00),
];

const DEFAULT_INPUT_PER_MTOK: f64 = 3.00;
const DEFAULT_OUTPUT_PER_MTOK: f64 = 15.00;

/// Completion-size assumption used for pre-call estimates.
pub const ESTIMATED_COMPLETION_TOKENS: u32 = 700;

fn rates_for(model: &str) -> (f64, f64) {
    PRICES
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len())
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or((DEFAULT_INPUT_PER_MTOK, DEFAULT_OUTPUT_PER_MTOK))
}

/// Rough token count for a prompt string (~4 chars per token).
///
/// # Examples
///
/// ```
/// use scout_providers::pricing::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 1);
/// assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
/// ```
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.len() / 4) as u32).max(1)
}

/// Cost in USD for a call with the given token counts.
///
/// # Examples
///
/// ```
/// use scout_providers::pricing::cost_for;
///
/// let cost = cost_for("gpt-4o-mini", 1_000_000, 0);
/// assert!((cost - 0.15).abs() < 1e-9);
/// ```
pub fn cost_for(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    let (input, output) = rates_for(model);
    (prompt_tokens as f64 / 1_000_000.0) * input + (completion_tokens as f64 / 1_000_000.0) * output
}

/// Pre-call cost estimate for sending `prompt_text` to `model`.
pub fn estimate_call_cost(model: &str, prompt_text: &str) -> f64 {
    cost_for(model, estimate_tokens(prompt_text), ESTIMATED_COMPLETION_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        // "gpt-4o-mini" must not pick up the "gpt-4o" rate.
        let mini = cost_for("gpt-4o-mini", 1_000_000, 0);
        let full = cost_for("gpt-4o", 1_000_000, 0);
        assert!(mini < full);
    }

    #[test]
    fn unknown_model_uses_default_rates() {
        let cost = cost_for("mystery-model-9000", 1_000_000, 1_000_000);
        assert!((cost - (DEFAULT_INPUT_PER_MTOK + DEFAULT_OUTPUT_PER_MTOK)).abs() < 1e-9);
    }

    #[test]
    fn estimate_is_positive_for_empty_text() {
        assert!(estimate_call_cost("gpt-4o", "") > 0.0);
    }

    #[test]
    fn cheap_model_estimates_cheaper() {
        let text = "senior rust engineer, distributed systems".repeat(50);
        assert!(estimate_call_cost("gpt-4o-mini", &text) < estimate_call_cost("gpt-4o", &text));
    }
}
