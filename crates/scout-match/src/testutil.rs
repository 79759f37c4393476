//! Scripted provider adapter for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scout_core::{ProviderErrorKind, ScoutError};
use scout_providers::{AnalysisPrompt, CallCounters, ProviderAdapter, ProviderReply};

pub(crate) struct ScriptedReply {
    text: String,
    cost: f64,
    delay_ms: u64,
}

/// Adapter that replays queued responses per model, in order.
pub(crate) struct ScriptedAdapter {
    replies: Mutex<HashMap<String, VecDeque<Result<ScriptedReply, ProviderErrorKind>>>>,
    pub(crate) counters: Arc<CallCounters>,
}

impl ScriptedAdapter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(HashMap::new()),
            counters: Arc::new(CallCounters::default()),
        })
    }

    pub(crate) fn enqueue(&self, model: &str, text: &str, cost: f64) {
        self.enqueue_slow(model, text, cost, 0);
    }

    pub(crate) fn enqueue_slow(&self, model: &str, text: &str, cost: f64, delay_ms: u64) {
        self.replies
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Ok(ScriptedReply {
                text: text.to_string(),
                cost,
                delay_ms,
            }));
    }

    pub(crate) fn enqueue_error(&self, model: &str, kind: ProviderErrorKind) {
        self.replies
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(Err(kind));
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn call(
        &self,
        model: &str,
        _prompt: &AnalysisPrompt,
    ) -> Result<ProviderReply, ScoutError> {
        self.counters.increment(self.id(), model);
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(|queue| queue.pop_front());

        match next {
            Some(Ok(reply)) => {
                if reply.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(reply.delay_ms)).await;
                }
                Ok(ProviderReply {
                    provider: self.id().into(),
                    model: model.to_string(),
                    text: reply.text,
                    prompt_tokens: Some(100),
                    completion_tokens: Some(50),
                    cost: reply.cost,
                    latency_ms: reply.delay_ms,
                })
            }
            Some(Err(kind)) => Err(ScoutError::Provider {
                provider: self.id().into(),
                kind,
                message: "scripted failure".into(),
            }),
            None => Err(ScoutError::Provider {
                provider: self.id().into(),
                kind: ProviderErrorKind::InvalidModel,
                message: format!("no scripted reply for {model}"),
            }),
        }
    }
}

/// A minimal well-formed model reply with the given score.
pub(crate) fn reply_with_score(score: u8) -> String {
    format!(
        "MATCH SCORE: {score}/100\n\nKEY STRENGTHS:\n- scripted strength\n\nSHOULD APPLY: {}",
        if score >= 70 { "Yes" } else { "No" }
    )
}

pub(crate) fn sample_request() -> scout_core::AnalysisRequest {
    scout_core::AnalysisRequest::new(
        scout_core::JobPosting {
            id: "job-1".into(),
            title: "Senior Rust Engineer".into(),
            company: "Acme".into(),
            description: "Build the storage engine.".into(),
            url: None,
        },
        scout_core::CandidateProfile {
            summary: "Systems programmer.".into(),
            skills: vec!["Rust".into()],
            years_experience: Some(8),
        },
    )
}
