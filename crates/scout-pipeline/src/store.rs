use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use scout_core::{JobStatus, ScoutError};

/// A persisted job posting with its analysis state.
///
/// # Examples
///
/// ```
/// use scout_core::JobStatus;
/// use scout_pipeline::store::JobRecord;
///
/// let record = JobRecord::discovered("j1", "Engineer", "Acme", "Build things.");
/// assert_eq!(record.status, JobStatus::Discovered);
/// assert!(record.match_score.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Stable identifier.
    pub id: String,
    /// Role title.
    pub title: String,
    /// Hiring company.
    pub company: String,
    /// Full posting text.
    pub description: String,
    /// Persisted lifecycle status.
    pub status: JobStatus,
    /// Match score from the last completed analysis.
    pub match_score: Option<u8>,
    /// Whether an analysis has completed for this record.
    pub analysis_completed: bool,
    /// When the last analysis completed.
    pub analyzed_at: Option<DateTime<Utc>>,
    /// Full verdict as an opaque JSON blob; stored for display, never
    /// re-parsed by the engine.
    pub verdict_json: Option<String>,
    /// Failure note from the last attempt, if it failed.
    pub last_failure: Option<String>,
}

impl JobRecord {
    /// A freshly discovered job with no analysis state.
    pub fn discovered(id: &str, title: &str, company: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            company: company.to_string(),
            description: description.to_string(),
            status: JobStatus::Discovered,
            match_score: None,
            analysis_completed: false,
            analyzed_at: None,
            verdict_json: None,
            last_failure: None,
        }
    }

    /// The status to show a user: a failed attempt reads as
    /// `analysis_failed` even though the persisted status stays retryable.
    pub fn display_status(&self) -> JobStatus {
        if self.last_failure.is_some() && !self.status.is_terminal() {
            JobStatus::AnalysisFailed
        } else {
            self.status
        }
    }
}

/// The full field set one `save_job` call commits.
///
/// Grouped so a transition is all-or-nothing: either every field lands or
/// the record is untouched.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    /// New lifecycle status.
    pub status: JobStatus,
    /// Score to persist, or `None` to clear it.
    pub match_score: Option<u8>,
    /// Completed flag.
    pub analysis_completed: bool,
    /// Completion timestamp.
    pub analyzed_at: Option<DateTime<Utc>>,
    /// Serialized verdict blob.
    pub verdict_json: Option<String>,
    /// Failure note.
    pub last_failure: Option<String>,
}

/// Persistence collaborator for job records.
///
/// `save_job` is atomic per call and optimistic: the update applies only
/// when the stored status still equals `expected`, so concurrent analysis
/// triggers for the same job cannot corrupt status.
pub trait JobStore: Send + Sync {
    /// Insert a new record. Fails if the id already exists.
    fn insert_job(&self, record: &JobRecord) -> Result<(), ScoutError>;

    /// Load a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::JobNotFound`] for an unknown id.
    fn load_job(&self, id: &str) -> Result<JobRecord, ScoutError>;

    /// Apply `update` if the stored status equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::InvalidTransition`] when the stored status has
    /// moved on, [`ScoutError::JobNotFound`] for an unknown id.
    fn save_job(&self, id: &str, expected: JobStatus, update: &JobUpdate)
        -> Result<(), ScoutError>;
}

/// In-process store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, JobRecord>>,
}

impl JobStore for MemoryStore {
    fn insert_job(&self, record: &JobRecord) -> Result<(), ScoutError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.id) {
            return Err(ScoutError::Store(format!(
                "job {} already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn load_job(&self, id: &str) -> Result<JobRecord, ScoutError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .get(id)
            .cloned()
            .ok_or_else(|| ScoutError::JobNotFound(id.to_string()))
    }

    fn save_job(
        &self,
        id: &str,
        expected: JobStatus,
        update: &JobUpdate,
    ) -> Result<(), ScoutError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let record = records
            .get_mut(id)
            .ok_or_else(|| ScoutError::JobNotFound(id.to_string()))?;
        if record.status != expected {
            return Err(ScoutError::InvalidTransition {
                job_id: id.to_string(),
                from: record.status,
                to: update.status,
            });
        }
        record.status = update.status;
        record.match_score = update.match_score;
        record.analysis_completed = update.analysis_completed;
        record.analyzed_at = update.analyzed_at;
        record.verdict_json = update.verdict_json.clone();
        record.last_failure = update.last_failure.clone();
        Ok(())
    }
}

/// SQLite-backed job store.
///
/// # Examples
///
/// ```
/// use scout_pipeline::store::{JobStore, JobRecord, SqliteStore};
///
/// let store = SqliteStore::in_memory().unwrap();
/// store.insert_job(&JobRecord::discovered("j1", "Engineer", "Acme", "text")).unwrap();
/// assert_eq!(store.load_job("j1").unwrap().company, "Acme");
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`ScoutError::Store`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ScoutError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScoutError::Store(format!("failed to create store directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ScoutError::Store(format!("failed to open {}: {e}", path.display())))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An in-memory store, mainly for tests.
    pub fn in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ScoutError::Store(format!("failed to open in-memory store: {e}")))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), ScoutError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                match_score INTEGER,
                analysis_completed INTEGER NOT NULL DEFAULT 0,
                analyzed_at TEXT,
                verdict_json TEXT,
                last_failure TEXT
            );",
        )
        .map_err(|e| ScoutError::Store(format!("failed to create schema: {e}")))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRecord> {
        let status_text: String = row.get("status")?;
        let analyzed_at_text: Option<String> = row.get("analyzed_at")?;
        Ok(JobRecord {
            id: row.get("id")?,
            title: row.get("title")?,
            company: row.get("company")?,
            description: row.get("description")?,
            status: status_text.parse().unwrap_or(JobStatus::Discovered),
            match_score: row.get::<_, Option<i64>>("match_score")?.map(|v| v as u8),
            analysis_completed: row.get::<_, i64>("analysis_completed")? != 0,
            analyzed_at: analyzed_at_text
                .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                .map(|t| t.with_timezone(&Utc)),
            verdict_json: row.get("verdict_json")?,
            last_failure: row.get("last_failure")?,
        })
    }
}

impl JobStore for SqliteStore {
    fn insert_job(&self, record: &JobRecord) -> Result<(), ScoutError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO jobs (id, title, company, description, status, match_score,
                               analysis_completed, analyzed_at, verdict_json, last_failure)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.title,
                record.company,
                record.description,
                record.status.to_string(),
                record.match_score.map(|v| v as i64),
                record.analysis_completed as i64,
                record.analyzed_at.map(|t| t.to_rfc3339()),
                record.verdict_json,
                record.last_failure,
            ],
        )
        .map_err(|e| ScoutError::Store(format!("failed to insert job {}: {e}", record.id)))?;
        Ok(())
    }

    fn load_job(&self, id: &str) -> Result<JobRecord, ScoutError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn
            .prepare("SELECT * FROM jobs WHERE id = ?1")
            .map_err(|e| ScoutError::Store(format!("failed to prepare load: {e}")))?;
        let mut rows = stmt
            .query_map(params![id], Self::row_to_record)
            .map_err(|e| ScoutError::Store(format!("failed to load job {id}: {e}")))?;
        match rows.next() {
            Some(Ok(record)) => Ok(record),
            Some(Err(e)) => Err(ScoutError::Store(format!("failed to read job {id}: {e}"))),
            None => Err(ScoutError::JobNotFound(id.to_string())),
        }
    }

    fn save_job(
        &self,
        id: &str,
        expected: JobStatus,
        update: &JobUpdate,
    ) -> Result<(), ScoutError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let changed = conn
            .execute(
                "UPDATE jobs SET status = ?1, match_score = ?2, analysis_completed = ?3,
                                 analyzed_at = ?4, verdict_json = ?5, last_failure = ?6
                 WHERE id = ?7 AND status = ?8",
                params![
                    update.status.to_string(),
                    update.match_score.map(|v| v as i64),
                    update.analysis_completed as i64,
                    update.analyzed_at.map(|t| t.to_rfc3339()),
                    update.verdict_json,
                    update.last_failure,
                    id,
                    expected.to_string(),
                ],
            )
            .map_err(|e| ScoutError::Store(format!("failed to update job {id}: {e}")))?;

        if changed == 0 {
            // Distinguish a vanished row from a lost optimistic race.
            drop(conn);
            let current = self.load_job(id)?;
            return Err(ScoutError::InvalidTransition {
                job_id: id.to_string(),
                from: current.status,
                to: update.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: JobStatus) -> JobUpdate {
        JobUpdate {
            status,
            match_score: None,
            analysis_completed: false,
            analyzed_at: None,
            verdict_json: None,
            last_failure: None,
        }
    }

    fn stores() -> Vec<Box<dyn JobStore>> {
        vec![
            Box::new(MemoryStore::default()),
            Box::new(SqliteStore::in_memory().unwrap()),
        ]
    }

    #[test]
    fn insert_and_load_roundtrip() {
        for store in stores() {
            let record = JobRecord::discovered("j1", "Engineer", "Acme", "Build things.");
            store.insert_job(&record).unwrap();
            let loaded = store.load_job("j1").unwrap();
            assert_eq!(loaded.id, "j1");
            assert_eq!(loaded.status, JobStatus::Discovered);
            assert!(loaded.match_score.is_none());
            assert!(!loaded.analysis_completed);
        }
    }

    #[test]
    fn duplicate_insert_fails() {
        for store in stores() {
            let record = JobRecord::discovered("j1", "Engineer", "Acme", "text");
            store.insert_job(&record).unwrap();
            assert!(store.insert_job(&record).is_err());
        }
    }

    #[test]
    fn load_missing_is_not_found() {
        for store in stores() {
            assert!(matches!(
                store.load_job("nope"),
                Err(ScoutError::JobNotFound(_))
            ));
        }
    }

    #[test]
    fn save_applies_when_status_matches() {
        for store in stores() {
            store
                .insert_job(&JobRecord::discovered("j1", "t", "c", "d"))
                .unwrap();
            let mut u = update(JobStatus::ReadyForDocuments);
            u.match_score = Some(85);
            u.analysis_completed = true;
            u.analyzed_at = Some(Utc::now());
            u.verdict_json = Some("{}".into());
            store.save_job("j1", JobStatus::Discovered, &u).unwrap();

            let loaded = store.load_job("j1").unwrap();
            assert_eq!(loaded.status, JobStatus::ReadyForDocuments);
            assert_eq!(loaded.match_score, Some(85));
            assert!(loaded.analysis_completed);
            assert!(loaded.analyzed_at.is_some());
        }
    }

    #[test]
    fn save_rejects_stale_status() {
        for store in stores() {
            store
                .insert_job(&JobRecord::discovered("j1", "t", "c", "d"))
                .unwrap();
            let err = store
                .save_job("j1", JobStatus::Analyzing, &update(JobStatus::ReadyForDocuments))
                .unwrap_err();
            assert!(matches!(err, ScoutError::InvalidTransition { .. }));
            // The record is untouched.
            assert_eq!(store.load_job("j1").unwrap().status, JobStatus::Discovered);
        }
    }

    #[test]
    fn sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_job(&JobRecord::discovered("j1", "t", "c", "d"))
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_job("j1").unwrap().title, "t");
    }

    #[test]
    fn display_status_surfaces_failures() {
        let mut record = JobRecord::discovered("j1", "t", "c", "d");
        record.last_failure = Some("provider down".into());
        assert_eq!(record.display_status(), JobStatus::AnalysisFailed);
        // A later successful analysis clears the failure view.
        record.status = JobStatus::ReadyForDocuments;
        assert_eq!(record.display_status(), JobStatus::ReadyForDocuments);
    }
}
