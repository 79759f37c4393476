use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Running spend totals, per job and per session.
///
/// Mutated only through [`CostBudgetPolicy`] and the orchestrator's
/// run bookkeeping; adapters never touch it directly. The single lock is
/// never held across an await point.
///
/// # Examples
///
/// ```
/// use scout_match::budget::CostLedger;
///
/// let ledger = CostLedger::default();
/// ledger.add("job-1", 0.02);
/// ledger.add("job-1", 0.03);
/// assert!((ledger.job_total("job-1") - 0.05).abs() < 1e-9);
/// assert!((ledger.session_total() - 0.05).abs() < 1e-9);
/// ```
#[derive(Debug, Default)]
pub struct CostLedger {
    inner: Mutex<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    per_job: HashMap<String, f64>,
    session_total: f64,
}

impl CostLedger {
    /// Add `cost` to the job's running total and the session total.
    pub fn add(&self, job_id: &str, cost: f64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner.per_job.entry(job_id.to_string()).or_insert(0.0) += cost;
        inner.session_total += cost;
    }

    /// Cumulative cost of the job's current analysis run.
    pub fn job_total(&self, job_id: &str) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.per_job.get(job_id).copied().unwrap_or(0.0)
    }

    /// Cumulative cost across every job this session.
    pub fn session_total(&self) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.session_total
    }

    /// Zero the job's running total at the start of a new analysis run.
    ///
    /// Session totals are unaffected; a re-run spends real money either way.
    pub fn begin_run(&self, job_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.per_job.insert(job_id.to_string(), 0.0);
    }
}

/// Enforces the per-job cost ceiling.
///
/// `authorize` answers with `false` — not an error — when a call's estimate
/// would push the job's running total past `max_cost_per_job`; the caller
/// decides whether that is a hard stop (direct strategy) or a soft one
/// (stop issuing further ensemble calls).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use scout_match::budget::{CostBudgetPolicy, CostLedger};
///
/// let policy = CostBudgetPolicy::new(Arc::new(CostLedger::default()), 0.10);
/// assert!(policy.authorize("job-1", 0.08));
/// policy.record("job-1", 0.08);
/// assert!(!policy.authorize("job-1", 0.05));
/// ```
#[derive(Debug, Clone)]
pub struct CostBudgetPolicy {
    ledger: Arc<CostLedger>,
    max_cost_per_job: f64,
}

impl CostBudgetPolicy {
    /// Build a policy over a shared ledger with the configured ceiling.
    pub fn new(ledger: Arc<CostLedger>, max_cost_per_job: f64) -> Self {
        Self {
            ledger,
            max_cost_per_job,
        }
    }

    /// Whether a call with `estimated_cost` may be issued for this job.
    ///
    /// Denies when the running total plus the estimate would land strictly
    /// above the ceiling.
    pub fn authorize(&self, job_id: &str, estimated_cost: f64) -> bool {
        let attempted = self.ledger.job_total(job_id) + estimated_cost;
        let allowed = attempted <= self.max_cost_per_job + 1e-9;
        if !allowed {
            tracing::warn!(
                job_id,
                attempted,
                limit = self.max_cost_per_job,
                "cost ceiling would be exceeded; call denied"
            );
        }
        allowed
    }

    /// Record the actual cost of a completed call.
    ///
    /// Must be called whenever the provider call itself succeeded, even if
    /// the response later failed to parse — the spend already happened.
    pub fn record(&self, job_id: &str, actual_cost: f64) {
        self.ledger.add(job_id, actual_cost);
    }

    /// The shared ledger behind this policy.
    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// The configured per-job ceiling.
    pub fn max_cost_per_job(&self) -> f64 {
        self.max_cost_per_job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(limit: f64) -> CostBudgetPolicy {
        CostBudgetPolicy::new(Arc::new(CostLedger::default()), limit)
    }

    #[test]
    fn authorize_allows_within_ceiling() {
        let policy = policy(0.50);
        assert!(policy.authorize("j", 0.49));
        assert!(policy.authorize("j", 0.50));
    }

    #[test]
    fn authorize_denies_past_ceiling() {
        let policy = policy(0.50);
        policy.record("j", 0.45);
        assert!(policy.authorize("j", 0.05));
        assert!(!policy.authorize("j", 0.06));
    }

    #[test]
    fn ceiling_is_per_job() {
        let policy = policy(0.10);
        policy.record("a", 0.10);
        assert!(!policy.authorize("a", 0.01));
        assert!(policy.authorize("b", 0.10));
    }

    #[test]
    fn record_accumulates_even_after_denial() {
        // An in-flight call that was already issued still costs money.
        let policy = policy(0.10);
        policy.record("j", 0.08);
        assert!(!policy.authorize("j", 0.05));
        policy.record("j", 0.05);
        assert!((policy.ledger().job_total("j") - 0.13).abs() < 1e-9);
    }

    #[test]
    fn begin_run_resets_job_but_not_session() {
        let ledger = Arc::new(CostLedger::default());
        ledger.add("j", 0.30);
        ledger.begin_run("j");
        assert_eq!(ledger.job_total("j"), 0.0);
        assert!((ledger.session_total() - 0.30).abs() < 1e-9);
    }
}
