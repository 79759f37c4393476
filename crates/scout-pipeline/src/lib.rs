//! Job persistence and the status pipeline.
//!
//! Provides the job store collaborators (in-memory and SQLite), the
//! fire-and-forget notifier interface, and [`JobStatusStateMachine`] — the
//! only component that writes a job's lifecycle status.

pub mod notify;
pub mod state;
pub mod store;

pub use notify::{MemoryNotifier, Notifier, TracingNotifier};
pub use state::JobStatusStateMachine;
pub use store::{JobRecord, JobStore, JobUpdate, MemoryStore, SqliteStore};
