use std::sync::Arc;

use scout_core::{AnalysisRequest, PrescreeningDetail, ScoutError};
use scout_providers::{pricing, ProviderAdapter};

use crate::budget::CostBudgetPolicy;
use crate::parser::{parse_verdict, ParsedVerdict};
use crate::prompt::build_analysis_prompt;

/// Outcome of a prescreen pass.
#[derive(Debug)]
pub struct ScreenOutcome {
    /// The cheap model's verdict, fully parsed and independently usable.
    pub verdict: ParsedVerdict,
    /// Score, threshold, and the pass flag, for the final verdict's record.
    pub detail: PrescreeningDetail,
}

/// Cheap-model pass/fail filter applied before the expensive analysis call.
///
/// Always issues exactly one call to the configured cheap model and parses
/// it fully. When the gate fails, the orchestrator skips the expensive
/// model entirely — that is the cost-saving property: zero expensive-model
/// calls for a failed gate.
pub struct PrescreeningGate {
    adapter: Arc<dyn ProviderAdapter>,
    policy: CostBudgetPolicy,
    model: String,
}

impl PrescreeningGate {
    /// Build a gate calling `model` through `adapter`.
    pub fn new(adapter: Arc<dyn ProviderAdapter>, policy: CostBudgetPolicy, model: String) -> Self {
        Self {
            adapter,
            policy,
            model,
        }
    }

    /// Run the prescreen and compare the score against `threshold`.
    ///
    /// A failure of the cheap-model call itself propagates as a full
    /// orchestration failure; there is no silent fallback to "pass".
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::BudgetExceeded`] when the call cannot be
    /// authorized, [`ScoutError::Provider`] when the call fails, or
    /// [`ScoutError::MalformedResponse`] when the reply cannot be parsed.
    pub async fn screen(
        &self,
        request: &AnalysisRequest,
        threshold: u8,
    ) -> Result<ScreenOutcome, ScoutError> {
        let prompt = build_analysis_prompt(request);
        let estimate = pricing::estimate_call_cost(&self.model, &prompt.user);
        if !self.policy.authorize(&request.job.id, estimate) {
            return Err(ScoutError::BudgetExceeded {
                job_id: request.job.id.clone(),
                attempted: self.policy.ledger().job_total(&request.job.id) + estimate,
                limit: self.policy.max_cost_per_job(),
            });
        }

        let reply = self.adapter.call(&self.model, &prompt).await?;
        // The call completed; the spend is real even if parsing fails below.
        self.policy.record(&request.job.id, reply.cost);

        let verdict = parse_verdict(&reply.text)?;
        let passed = verdict.match_score >= threshold;
        tracing::info!(
            job_id = %request.job.id,
            model = %self.model,
            score = verdict.match_score,
            threshold,
            passed,
            "prescreen complete"
        );

        Ok(ScreenOutcome {
            detail: PrescreeningDetail {
                score: verdict.match_score,
                threshold,
                passed,
            },
            verdict,
        })
    }
}
