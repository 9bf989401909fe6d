use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::models::{Stage, Status};

/// Separator used when job identifiers are persisted as a single column
pub const JOB_ID_SEPARATOR: char = ';';

/// Scheduler job identifiers attached to an in-flight submission
///
/// Ordered and free of duplicates. Persisted as a `;`-delimited string where
/// the empty string means "no outstanding jobs".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIds(Vec<String>);

impl JobIds {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse the persisted form, ignoring blanks and repeated identifiers
    pub fn parse(s: &str) -> Self {
        let mut ids = Self::new();
        for id in s.split(JOB_ID_SEPARATOR) {
            ids.push(id);
        }
        ids
    }

    pub fn push(&mut self, id: &str) {
        let id = id.trim();
        if !id.is_empty() && !self.0.iter().any(|existing| existing == id) {
            self.0.push(id.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    /// Persisted form
    pub fn to_db_string(&self) -> String {
        self.0.join(&JOB_ID_SEPARATOR.to_string())
    }
}

impl std::fmt::Display for JobIds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

impl<S: AsRef<str>> FromIterator<S> for JobIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut ids = Self::new();
        for id in iter {
            ids.push(id.as_ref());
        }
        ids
    }
}

/// Errors raised when a persisted row cannot be trusted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record '{directory}' has stage {stage}, expected 1..=5")]
    CorruptStage { directory: String, stage: i64 },
    #[error("record '{directory}' has status {status}, expected 0..=5")]
    CorruptStatus { directory: String, status: i64 },
    #[error("record '{directory}' carries job ids while {status}")]
    StrayJobIds { directory: String, status: Status },
}

/// A row of `tasks_control` exactly as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub directory: String,
    pub stage: i64,
    pub status: i64,
    pub job_ids: String,
}

/// One work item and its progress through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub directory: String,
    pub stage: Stage,
    pub status: Status,
    pub job_ids: JobIds,
}

impl TaskRecord {
    /// A freshly added (or reset) record
    pub fn new(directory: &str, stage: Stage) -> Self {
        Self {
            directory: directory.to_string(),
            stage,
            status: Status::NotStarted,
            job_ids: JobIds::new(),
        }
    }

    /// Same record at a different status, with job ids cleared
    pub fn with_status(&self, status: Status) -> Self {
        Self {
            directory: self.directory.clone(),
            stage: self.stage,
            status,
            job_ids: JobIds::new(),
        }
    }

    /// Job ids may only be attached while a submission is in flight
    pub fn check_invariants(&self) -> Result<(), RecordError> {
        if !self.job_ids.is_empty() && self.status != Status::InProgress {
            return Err(RecordError::StrayJobIds {
                directory: self.directory.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Whether the engine will never touch this record again on its own
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal_for(self.stage)
    }
}

impl TryFrom<RecordRow> for TaskRecord {
    type Error = RecordError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let stage = Stage::from_i64(row.stage).ok_or_else(|| RecordError::CorruptStage {
            directory: row.directory.clone(),
            stage: row.stage,
        })?;
        let status = Status::from_i64(row.status).ok_or_else(|| RecordError::CorruptStatus {
            directory: row.directory.clone(),
            status: row.status,
        })?;
        Ok(Self {
            job_ids: JobIds::parse(&row.job_ids),
            directory: row.directory,
            stage,
            status,
        })
    }
}
