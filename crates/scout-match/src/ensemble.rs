use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use scout_core::{
    Agreement, AnalysisRequest, Confidence, EnsembleDetail, ModelScore, ProviderErrorKind,
    ScoutError,
};
use scout_providers::{pricing, ProviderAdapter};

use crate::budget::CostBudgetPolicy;
use crate::parser::{parse_verdict, ParsedVerdict};
use crate::prompt::build_analysis_prompt;

/// Minimum number of usable member verdicts for an aggregate to be honest.
const MIN_SUCCEEDED: usize = 2;

/// Spread thresholds for the confidence label.
const HIGH_CONFIDENCE_STDDEV: f64 = 8.0;
const MEDIUM_CONFIDENCE_STDDEV: f64 = 15.0;

/// Outcome of an ensemble run.
#[derive(Debug)]
pub struct EnsembleOutcome {
    /// Aggregated verdict. Text fields come from the member closest to the
    /// average score; the score is the rounded mean.
    pub verdict: ParsedVerdict,
    /// Per-model breakdown for the verdict's record.
    pub detail: EnsembleDetail,
}

/// Issues one call per model concurrently and combines the verdicts.
///
/// A single model failure does not abort the ensemble — the member is
/// excluded and the breakdown reflects only succeeded calls. Completion
/// order is meaningless; results are tagged with their model id.
pub struct EnsembleAggregator {
    adapter: Arc<dyn ProviderAdapter>,
    policy: CostBudgetPolicy,
    call_timeout: Duration,
    min_match_score: u8,
}

impl EnsembleAggregator {
    /// Build an aggregator with an independent per-call timeout.
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        policy: CostBudgetPolicy,
        call_timeout: Duration,
        min_match_score: u8,
    ) -> Self {
        Self {
            adapter,
            policy,
            call_timeout,
            min_match_score,
        }
    }

    /// Call every model in `models` concurrently and aggregate the verdicts.
    ///
    /// Models are authorized in list order before being issued; the first
    /// denial stops further issuing while already-issued calls complete.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::InsufficientEnsembleData`] when fewer than two
    /// members produce a usable verdict.
    pub async fn aggregate(
        &self,
        request: &AnalysisRequest,
        models: &[String],
    ) -> Result<EnsembleOutcome, ScoutError> {
        let prompt = build_analysis_prompt(request);

        let mut calls = Vec::new();
        let mut reserved = 0.0;
        for model in models {
            let estimate = pricing::estimate_call_cost(model, &prompt.user);
            if !self.policy.authorize(&request.job.id, reserved + estimate) {
                tracing::warn!(
                    job_id = %request.job.id,
                    model = %model,
                    "budget stop: remaining ensemble calls not issued"
                );
                break;
            }
            reserved += estimate;

            let adapter = Arc::clone(&self.adapter);
            let prompt = prompt.clone();
            let model = model.clone();
            let call_timeout = self.call_timeout;
            calls.push(async move {
                let result = match tokio::time::timeout(call_timeout, adapter.call(&model, &prompt))
                    .await
                {
                    Ok(inner) => inner,
                    Err(_) => Err(ScoutError::Provider {
                        provider: adapter.id().into(),
                        kind: ProviderErrorKind::Timeout,
                        message: format!("ensemble call timed out after {call_timeout:?}"),
                    }),
                };
                (model, result)
            });
        }

        let results = join_all(calls).await;

        let mut members: Vec<(String, ParsedVerdict)> = Vec::new();
        for (model, result) in results {
            match result {
                Ok(reply) => {
                    // The call completed; record the spend before parsing.
                    self.policy.record(&request.job.id, reply.cost);
                    match parse_verdict(&reply.text) {
                        Ok(verdict) => members.push((model, verdict)),
                        Err(err) => {
                            tracing::warn!(model = %model, %err, "ensemble reply unusable; member excluded");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(model = %model, %err, "ensemble call failed; member excluded");
                }
            }
        }

        if members.len() < MIN_SUCCEEDED {
            return Err(ScoutError::InsufficientEnsembleData {
                succeeded: members.len(),
                required: MIN_SUCCEEDED,
            });
        }

        Ok(self.combine(members))
    }

    fn combine(&self, members: Vec<(String, ParsedVerdict)>) -> EnsembleOutcome {
        let n = members.len() as f64;
        let mean = members
            .iter()
            .map(|(_, v)| v.match_score as f64)
            .sum::<f64>()
            / n;
        let average_score = mean.round() as u8;

        let variance = members
            .iter()
            .map(|(_, v)| (v.match_score as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();
        let confidence = if stddev <= HIGH_CONFIDENCE_STDDEV {
            Confidence::High
        } else if stddev <= MEDIUM_CONFIDENCE_STDDEV {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        let individual_scores: Vec<ModelScore> = members
            .iter()
            .map(|(model, v)| ModelScore {
                model: model.clone(),
                score: v.match_score,
                should_apply: v.effective_should_apply(self.min_match_score),
            })
            .collect();
        let unanimous = individual_scores
            .iter()
            .all(|s| s.should_apply == individual_scores[0].should_apply);
        let agreement = if unanimous {
            Agreement::Strong
        } else {
            Agreement::Mixed
        };

        // Text fields come from the member whose score sits closest to the
        // mean; ties keep request order.
        let representative = members
            .iter()
            .min_by(|(_, a), (_, b)| {
                (a.match_score as f64 - mean)
                    .abs()
                    .partial_cmp(&(b.match_score as f64 - mean).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| members[0].1.clone());

        let mut verdict = representative;
        verdict.match_score = average_score;
        verdict.should_apply = if unanimous {
            Some(individual_scores[0].should_apply)
        } else {
            None
        };

        EnsembleOutcome {
            verdict,
            detail: EnsembleDetail {
                individual_scores,
                average_score,
                confidence,
                agreement,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CostLedger;
    use crate::testutil::{reply_with_score, sample_request, ScriptedAdapter};

    fn aggregator(adapter: Arc<ScriptedAdapter>, limit: f64) -> EnsembleAggregator {
        let policy = CostBudgetPolicy::new(Arc::new(CostLedger::default()), limit);
        EnsembleAggregator::new(adapter, policy, Duration::from_millis(200), 70)
    }

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn aggregates_mean_and_high_confidence() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(85), 0.01);
        adapter.enqueue("b", &reply_with_score(78), 0.01);
        adapter.enqueue("c", &reply_with_score(83), 0.01);

        let outcome = aggregator(adapter, 1.0)
            .aggregate(&sample_request(), &models(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(outcome.detail.average_score, 82);
        assert_eq!(outcome.detail.confidence, Confidence::High);
        assert_eq!(outcome.detail.individual_scores.len(), 3);
        assert_eq!(outcome.verdict.match_score, 82);
    }

    #[tokio::test]
    async fn wide_spread_lowers_confidence() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(95), 0.01);
        adapter.enqueue("b", &reply_with_score(40), 0.01);
        adapter.enqueue("c", &reply_with_score(70), 0.01);

        let outcome = aggregator(adapter, 1.0)
            .aggregate(&sample_request(), &models(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(outcome.detail.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn disagreement_is_mixed() {
        let adapter = ScriptedAdapter::new();
        // 85 answers Yes, 40 answers No.
        adapter.enqueue("a", &reply_with_score(85), 0.01);
        adapter.enqueue("b", &reply_with_score(40), 0.01);

        let outcome = aggregator(adapter, 1.0)
            .aggregate(&sample_request(), &models(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(outcome.detail.agreement, Agreement::Mixed);
        // No unanimous flag; the orchestrator derives from the average.
        assert_eq!(outcome.verdict.should_apply, None);
    }

    #[tokio::test]
    async fn unanimous_agreement_is_strong() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(85), 0.01);
        adapter.enqueue("b", &reply_with_score(78), 0.01);

        let outcome = aggregator(adapter, 1.0)
            .aggregate(&sample_request(), &models(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(outcome.detail.agreement, Agreement::Strong);
        assert_eq!(outcome.verdict.should_apply, Some(true));
    }

    #[tokio::test]
    async fn single_failure_is_excluded_not_fatal() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(80), 0.01);
        adapter.enqueue_error("b", ProviderErrorKind::Network);
        adapter.enqueue("c", &reply_with_score(84), 0.01);

        let outcome = aggregator(adapter, 1.0)
            .aggregate(&sample_request(), &models(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(outcome.detail.individual_scores.len(), 2);
        assert_eq!(outcome.detail.average_score, 82);
    }

    #[tokio::test]
    async fn one_survivor_is_insufficient() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(80), 0.01);
        adapter.enqueue_error("b", ProviderErrorKind::Network);
        adapter.enqueue_error("c", ProviderErrorKind::RateLimited);

        let err = aggregator(adapter, 1.0)
            .aggregate(&sample_request(), &models(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScoutError::InsufficientEnsembleData {
                succeeded: 1,
                required: 2
            }
        ));
    }

    #[tokio::test]
    async fn timed_out_member_is_excluded() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(80), 0.01);
        adapter.enqueue("b", &reply_with_score(84), 0.01);
        adapter.enqueue_slow("slow", &reply_with_score(90), 0.01, 5_000);

        let outcome = aggregator(adapter, 1.0)
            .aggregate(&sample_request(), &models(&["a", "b", "slow"]))
            .await
            .unwrap();
        assert_eq!(outcome.detail.individual_scores.len(), 2);
        assert!(outcome
            .detail
            .individual_scores
            .iter()
            .all(|s| s.model != "slow"));
    }

    #[tokio::test]
    async fn budget_denial_stops_issuing_further_calls() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(80), 0.01);
        adapter.enqueue("b", &reply_with_score(84), 0.01);
        adapter.enqueue("c", &reply_with_score(88), 0.01);

        // Budget covers roughly two estimated calls, not three.
        let prompt = crate::prompt::build_analysis_prompt(&sample_request());
        let per_call = scout_providers::pricing::estimate_call_cost("a", &prompt.user);
        let agg = aggregator(Arc::clone(&adapter), per_call * 2.5);

        let outcome = agg
            .aggregate(&sample_request(), &models(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(outcome.detail.individual_scores.len(), 2);
        assert_eq!(adapter.counters.calls_for("c"), 0);
    }

    #[tokio::test]
    async fn unparsable_member_still_pays() {
        let adapter = ScriptedAdapter::new();
        adapter.enqueue("a", &reply_with_score(80), 0.01);
        adapter.enqueue("b", &reply_with_score(84), 0.02);
        adapter.enqueue("c", "word salad with no score", 0.04);

        let ledger = Arc::new(CostLedger::default());
        let policy = CostBudgetPolicy::new(Arc::clone(&ledger), 1.0);
        let agg = EnsembleAggregator::new(adapter, policy, Duration::from_millis(200), 70);

        agg.aggregate(&sample_request(), &models(&["a", "b", "c"]))
            .await
            .unwrap();
        assert!((ledger.job_total("job-1") - 0.07).abs() < 1e-9);
    }
}
