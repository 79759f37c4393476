use std::sync::Arc;

use chrono::Utc;

use scout_core::{JobStatus, MatchVerdict, ScoutError};

use crate::notify::{Notifier, EVENT_ANALYSIS_FAILED, EVENT_ANALYZED, EVENT_ANALYZING};
use crate::store::{JobStore, JobUpdate};

/// Drives a job record's lifecycle status from analysis outcomes.
///
/// The only component that writes job status. `begin` moves
/// `discovered → analyzing`; `apply` commits the terminal transition
/// atomically, or rolls the job back to its pre-call status on failure.
/// Both use the store's optimistic status check, so concurrent triggers for
/// the same job id cannot double-apply — at most one transition per attempt.
pub struct JobStatusStateMachine {
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    min_match_score: u8,
}

impl JobStatusStateMachine {
    /// Build a state machine over the persistence and notification
    /// collaborators.
    pub fn new(store: Arc<dyn JobStore>, notifier: Arc<dyn Notifier>, min_match_score: u8) -> Self {
        Self {
            store,
            notifier,
            min_match_score,
        }
    }

    /// Move a discovered job into `analyzing` and emit `job.analyzing`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::InvalidTransition`] unless the job is in
    /// `discovered`, [`ScoutError::JobNotFound`] for an unknown id.
    pub fn begin(&self, job_id: &str) -> Result<(), ScoutError> {
        let record = self.store.load_job(job_id)?;
        if record.status != JobStatus::Discovered {
            return Err(ScoutError::InvalidTransition {
                job_id: job_id.to_string(),
                from: record.status,
                to: JobStatus::Analyzing,
            });
        }

        self.store.save_job(
            job_id,
            JobStatus::Discovered,
            &JobUpdate {
                status: JobStatus::Analyzing,
                match_score: record.match_score,
                analysis_completed: record.analysis_completed,
                analyzed_at: record.analyzed_at,
                verdict_json: record.verdict_json.clone(),
                last_failure: None,
            },
        )?;
        tracing::debug!(job_id, "job moved to analyzing");
        self.notifier
            .emit(EVENT_ANALYZING, serde_json::json!({ "jobId": job_id }));
        Ok(())
    }

    /// Commit the orchestration outcome for a job in `analyzing`.
    ///
    /// On success the full field set — score, completed flag, timestamp,
    /// serialized verdict, new status — lands in one store call; the status
    /// is `ready_for_documents` when `match_score >= min_match_score`
    /// (independent of the verdict's own apply recommendation), otherwise
    /// `analyzed_no_action`. On an orchestration error the job reverts to
    /// `discovered` with the failure noted, no score is visible, and the
    /// error is re-raised to the caller.
    ///
    /// # Errors
    ///
    /// Re-raises the orchestration error after routing, or returns
    /// [`ScoutError::InvalidTransition`] when the job is no longer in
    /// `analyzing`.
    pub fn apply(
        &self,
        job_id: &str,
        outcome: Result<MatchVerdict, ScoutError>,
    ) -> Result<JobStatus, ScoutError> {
        match outcome {
            Ok(verdict) => {
                let status = if verdict.match_score >= self.min_match_score {
                    JobStatus::ReadyForDocuments
                } else {
                    JobStatus::AnalyzedNoAction
                };
                let verdict_json = serde_json::to_string(&verdict)?;
                self.store.save_job(
                    job_id,
                    JobStatus::Analyzing,
                    &JobUpdate {
                        status,
                        match_score: Some(verdict.match_score),
                        analysis_completed: true,
                        analyzed_at: Some(Utc::now()),
                        verdict_json: Some(verdict_json),
                        last_failure: None,
                    },
                )?;
                tracing::info!(job_id, %status, score = verdict.match_score, "job analyzed");
                self.notifier.emit(
                    EVENT_ANALYZED,
                    serde_json::json!({
                        "jobId": job_id,
                        "status": status,
                        "matchScore": verdict.match_score,
                    }),
                );
                Ok(status)
            }
            Err(err) => {
                // Roll back to the pre-call status so the job stays
                // retryable; no partial score is ever visible.
                self.store.save_job(
                    job_id,
                    JobStatus::Analyzing,
                    &JobUpdate {
                        status: JobStatus::Discovered,
                        match_score: None,
                        analysis_completed: false,
                        analyzed_at: None,
                        verdict_json: None,
                        last_failure: Some(err.to_string()),
                    },
                )?;
                tracing::warn!(job_id, %err, "analysis failed; job reverted to discovered");
                self.notifier.emit(
                    EVENT_ANALYSIS_FAILED,
                    serde_json::json!({
                        "jobId": job_id,
                        "error": err.to_string(),
                        "retryable": err.is_retryable(),
                    }),
                );
                Err(err)
            }
        }
    }
}
