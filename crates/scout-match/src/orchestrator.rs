use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use scout_core::{
    AnalysisRequest, AnalysisStrategy, EnsembleDetail, MatchVerdict, PrescreeningDetail,
    ScoutConfig, ScoutError,
};
use scout_providers::{pricing, ProviderAdapter};

use crate::budget::CostBudgetPolicy;
use crate::cache::{description_key, AnalysisCache, ANALYSIS_NAMESPACE};
use crate::ensemble::EnsembleAggregator;
use crate::parser::{parse_verdict, ParsedVerdict};
use crate::prescreen::PrescreeningGate;
use crate::prompt::build_analysis_prompt;

/// Resolve the strategy for a run from configuration.
///
/// Precedence: ensemble, then prescreening, then fallback, then direct.
/// Chosen once per call and never re-evaluated mid-flight.
///
/// # Errors
///
/// Returns [`ScoutError::Config`] for an enabled ensemble with fewer than
/// two models or with duplicates.
///
/// # Examples
///
/// ```
/// use scout_core::{AnalysisStrategy, ScoutConfig};
/// use scout_match::orchestrator::select_strategy;
///
/// let strategy = select_strategy(&ScoutConfig::default()).unwrap();
/// assert!(matches!(strategy, AnalysisStrategy::Direct { .. }));
/// ```
pub fn select_strategy(config: &ScoutConfig) -> Result<AnalysisStrategy, ScoutError> {
    if config.ensemble.enabled {
        let models = &config.ensemble.models;
        if models.len() < 2 {
            return Err(ScoutError::Config(
                "ensemble.models needs at least two entries when ensemble is enabled".into(),
            ));
        }
        let mut seen = HashSet::new();
        for model in models {
            if !seen.insert(model.as_str()) {
                return Err(ScoutError::Config(format!(
                    "ensemble.models lists {model} more than once"
                )));
            }
        }
        return Ok(AnalysisStrategy::Ensemble {
            models: models.clone(),
        });
    }

    if config.prescreening.enabled {
        return Ok(AnalysisStrategy::TwoTier {
            prescreen_model: config.prescreening.model.clone(),
            analysis_model: config.llm.analysis_model.clone(),
            threshold: config.prescreening.threshold,
        });
    }

    if let Some(secondary) = &config.llm.fallback_model {
        return Ok(AnalysisStrategy::WithFallback {
            primary: config.llm.analysis_model.clone(),
            secondary: secondary.clone(),
        });
    }

    Ok(AnalysisStrategy::Direct {
        model: config.llm.analysis_model.clone(),
    })
}

/// Top-level analysis entry point.
///
/// Selects a strategy from configuration, drives the gate / aggregator /
/// adapters, and returns one normalized verdict. Every issued call updates
/// the cost ledger exactly once, success or not; every failure is wrapped
/// with the strategy and job id before it leaves this type.
pub struct MatchOrchestrator {
    adapter: Arc<dyn ProviderAdapter>,
    policy: CostBudgetPolicy,
    config: ScoutConfig,
    cache: Option<Arc<dyn AnalysisCache>>,
}

impl MatchOrchestrator {
    /// Build an orchestrator over one provider adapter.
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        policy: CostBudgetPolicy,
        config: ScoutConfig,
    ) -> Self {
        Self {
            adapter,
            policy,
            config,
            cache: None,
        }
    }

    /// Attach an advisory cache. Identical job text within the configured
    /// TTL reuses the stored verdict instead of re-analyzing.
    pub fn with_cache(mut self, cache: Arc<dyn AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Analyze one posting and return the normalized verdict.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Orchestration`] wrapping the first
    /// unrecoverable underlying error — provider, parse, or budget. A
    /// half-populated verdict is never returned.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<MatchVerdict, ScoutError> {
        let strategy = match &request.strategy_override {
            Some(strategy) => strategy.clone(),
            None => select_strategy(&self.config)?,
        };
        let kind = strategy.kind();
        let job_id = request.job.id.clone();
        tracing::info!(job_id = %job_id, strategy = %kind, "starting analysis");

        if let Some(verdict) = self.cached_verdict(request) {
            tracing::info!(job_id = %job_id, "cache hit; skipping analysis");
            return Ok(verdict);
        }

        self.policy.ledger().begin_run(&job_id);

        let outcome = match &strategy {
            AnalysisStrategy::Direct { model } => self
                .run_model(request, model)
                .await
                .map(|parsed| (parsed, None, None)),
            AnalysisStrategy::TwoTier {
                prescreen_model,
                analysis_model,
                threshold,
            } => {
                self.run_two_tier(request, prescreen_model, analysis_model, *threshold)
                    .await
            }
            AnalysisStrategy::Ensemble { models } => self.run_ensemble(request, models).await,
            AnalysisStrategy::WithFallback { primary, secondary } => self
                .run_fallback(request, primary, secondary)
                .await
                .map(|parsed| (parsed, None, None)),
        };

        let (parsed, ensemble, prescreening) =
            outcome.map_err(|source| ScoutError::Orchestration {
                strategy: kind,
                job_id: job_id.clone(),
                source: Box::new(source),
            })?;

        let verdict = MatchVerdict {
            match_score: parsed.match_score,
            should_apply: parsed.effective_should_apply(self.config.matching.min_match_score),
            key_strengths: parsed.key_strengths,
            potential_concerns: parsed.potential_concerns,
            talking_points: parsed.talking_points,
            cover_letter_strategy: parsed.cover_letter_strategy,
            strategy_used: kind,
            cost_estimate: self.policy.ledger().job_total(&job_id),
            ensemble,
            prescreening,
        };

        tracing::info!(
            job_id = %job_id,
            score = verdict.match_score,
            should_apply = verdict.should_apply,
            cost = verdict.cost_estimate,
            "analysis complete"
        );
        self.store_in_cache(request, &verdict);
        Ok(verdict)
    }

    /// One authorized call to `model`, recorded and parsed.
    async fn run_model(
        &self,
        request: &AnalysisRequest,
        model: &str,
    ) -> Result<ParsedVerdict, ScoutError> {
        let prompt = build_analysis_prompt(request);
        let estimate = pricing::estimate_call_cost(model, &prompt.user);
        if !self.policy.authorize(&request.job.id, estimate) {
            return Err(ScoutError::BudgetExceeded {
                job_id: request.job.id.clone(),
                attempted: self.policy.ledger().job_total(&request.job.id) + estimate,
                limit: self.policy.max_cost_per_job(),
            });
        }
        let reply = self.adapter.call(model, &prompt).await?;
        self.policy.record(&request.job.id, reply.cost);
        parse_verdict(&reply.text)
    }

    async fn run_two_tier(
        &self,
        request: &AnalysisRequest,
        prescreen_model: &str,
        analysis_model: &str,
        threshold: u8,
    ) -> StrategyOutcome {
        let gate = PrescreeningGate::new(
            Arc::clone(&self.adapter),
            self.policy.clone(),
            prescreen_model.to_string(),
        );
        let screened = gate.screen(request, threshold).await?;
        if !screened.detail.passed {
            // The cheap verdict stands; the expensive model is never called.
            return Ok((screened.verdict, None, Some(screened.detail)));
        }
        let parsed = self.run_model(request, analysis_model).await?;
        Ok((parsed, None, Some(screened.detail)))
    }

    async fn run_ensemble(&self, request: &AnalysisRequest, models: &[String]) -> StrategyOutcome {
        let aggregator = EnsembleAggregator::new(
            Arc::clone(&self.adapter),
            self.policy.clone(),
            Duration::from_secs(self.config.llm.request_timeout_secs),
            self.config.matching.min_match_score,
        );
        let outcome = aggregator.aggregate(request, models).await?;
        Ok((outcome.verdict, Some(outcome.detail), None))
    }

    async fn run_fallback(
        &self,
        request: &AnalysisRequest,
        primary: &str,
        secondary: &str,
    ) -> Result<ParsedVerdict, ScoutError> {
        match self.run_model(request, primary).await {
            Ok(parsed) => Ok(parsed),
            // A budget refusal is a deliberate stop; the secondary would
            // only dig the hole deeper.
            Err(err @ ScoutError::BudgetExceeded { .. }) => Err(err),
            Err(err) => {
                tracing::warn!(
                    job_id = %request.job.id,
                    primary,
                    secondary,
                    %err,
                    "primary model failed; trying fallback"
                );
                self.run_model(request, secondary).await
            }
        }
    }

    fn cached_verdict(&self, request: &AnalysisRequest) -> Option<MatchVerdict> {
        if !self.config.cache.enabled {
            return None;
        }
        let cache = self.cache.as_ref()?;
        let key = description_key(&request.job.description);
        let blob = cache.get(ANALYSIS_NAMESPACE, &key)?;
        serde_json::from_str(&blob).ok()
    }

    fn store_in_cache(&self, request: &AnalysisRequest, verdict: &MatchVerdict) {
        if !self.config.cache.enabled {
            return;
        }
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let Ok(blob) = serde_json::to_string(verdict) else {
            return;
        };
        let key = description_key(&request.job.description);
        cache.set(
            ANALYSIS_NAMESPACE,
            &key,
            blob,
            Duration::from_secs(self.config.cache.ttl_secs),
        );
    }
}

type StrategyOutcome =
    Result<(ParsedVerdict, Option<EnsembleDetail>, Option<PrescreeningDetail>), ScoutError>;
