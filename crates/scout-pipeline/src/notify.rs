use std::sync::Mutex;

/// Event emitted when an analysis run starts.
pub const EVENT_ANALYZING: &str = "job.analyzing";
/// Event emitted after a successful status transition.
pub const EVENT_ANALYZED: &str = "job.analyzed";
/// Event emitted after a failed analysis attempt.
pub const EVENT_ANALYSIS_FAILED: &str = "job.analysis_failed";

/// Notification collaborator. Fire-and-forget: emitting never fails and
/// never blocks the state machine.
pub trait Notifier: Send + Sync {
    /// Publish an event with a JSON payload.
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// Notifier that writes events to the tracing sink.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        tracing::info!(event, %payload, "pipeline event");
    }
}

/// Notifier that buffers events in memory, for tests and the CLI summary.
///
/// # Examples
///
/// ```
/// use scout_pipeline::notify::{MemoryNotifier, Notifier};
///
/// let notifier = MemoryNotifier::default();
/// notifier.emit("job.analyzing", serde_json::json!({"jobId": "j1"}));
/// assert_eq!(notifier.events().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryNotifier {
    /// Snapshot of everything emitted so far, in order.
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Event names only, in order.
    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((event.to_string(), payload));
    }
}
