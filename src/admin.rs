//! Administrative operations on the ledger: add, reset and remove work items
//!
//! These never run a stage; they only edit records, cancelling scheduler
//! jobs first when a record with work in flight is reset or removed.

use std::path::{Component, Path};
use anyhow::Result;
use rusqlite::Connection;
use thiserror::Error;
use crate::models::{JobIds, RecordRow, Stage, Status, TaskRecord};
use crate::repo::RecordRepo;
use crate::scheduler::Scheduler;

/// Malformed request; nothing has been written
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("--add and --stage must have the same number of entries ({directories} directories, {stages} stages)")]
    LengthMismatch { directories: usize, stages: usize },
    #[error("no directories given")]
    Empty,
}

/// One directory/stage pair from the command line, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub directory: String,
    pub stage: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Existing record reset to NotStarted; carries any jobs that were cancelled
    Reset { cancelled: JobIds },
    /// Record exists and force was not given
    Exists,
    InvalidStage(String),
    InvalidDirectory(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { cancelled: JobIds },
    NotFound,
    /// Record has work in flight and force was not given
    InProgress,
}

/// Pair up directories with stages, rejecting the whole request on mismatch
pub fn parse_add_requests(directories: &[String], stages: &[String]) -> Result<Vec<AddRequest>, AdminError> {
    if directories.is_empty() {
        return Err(AdminError::Empty);
    }
    if directories.len() != stages.len() {
        return Err(AdminError::LengthMismatch {
            directories: directories.len(),
            stages: stages.len(),
        });
    }

    Ok(directories
        .iter()
        .zip(stages)
        .map(|(directory, stage)| AddRequest {
            directory: directory.trim().to_string(),
            stage: stage.trim().to_string(),
        })
        .collect())
}

/// Parse a stage given on the command line (1..=5)
pub fn parse_stage(raw: &str) -> Option<Stage> {
    raw.trim().parse::<i64>().ok().and_then(Stage::from_i64)
}

/// Work item directories must stay inside the pipeline root
pub fn validate_directory(directory: &str) -> Result<(), String> {
    if directory.is_empty() {
        return Err("directory name cannot be empty".to_string());
    }
    let path = Path::new(directory);
    if path.is_absolute() {
        return Err(format!("'{}' must be relative to the database directory", directory));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(format!("'{}' must not contain '..'", directory));
    }
    // Names end up on single lines of scripts and reports
    if directory.chars().any(char::is_control) {
        return Err(format!("{:?} must not contain control characters", directory));
    }
    Ok(())
}

/// Add a work item at `request.stage`, or reset an existing one when `force` is set
pub fn add(conn: &Connection, scheduler: &dyn Scheduler, request: &AddRequest, force: bool) -> Result<AddOutcome> {
    if let Err(message) = validate_directory(&request.directory) {
        return Ok(AddOutcome::InvalidDirectory(message));
    }
    let stage = match parse_stage(&request.stage) {
        Some(stage) => stage,
        None => return Ok(AddOutcome::InvalidStage(request.stage.clone())),
    };

    // Raw row, so a corrupt record can still be reset
    let existing = RecordRepo::get_row(conn, &request.directory)?;
    let outcome = match existing {
        None => AddOutcome::Added,
        Some(_) if !force => return Ok(AddOutcome::Exists),
        Some(row) => AddOutcome::Reset {
            cancelled: cancel_in_flight(scheduler, &row),
        },
    };

    RecordRepo::upsert(conn, &TaskRecord::new(&request.directory, stage))?;
    log::info!("'{}' set to {} / {}", request.directory, stage, Status::NotStarted);
    Ok(outcome)
}

/// Delete a work item; one with work in flight needs `force`
pub fn remove(conn: &Connection, scheduler: &dyn Scheduler, directory: &str, force: bool) -> Result<RemoveOutcome> {
    let row = match RecordRepo::get_row(conn, directory)? {
        Some(row) => row,
        None => return Ok(RemoveOutcome::NotFound),
    };

    if is_in_flight(&row) && !force {
        return Ok(RemoveOutcome::InProgress);
    }

    let cancelled = cancel_in_flight(scheduler, &row);
    RecordRepo::delete(conn, directory)?;
    log::info!("'{}' removed", directory);
    Ok(RemoveOutcome::Removed { cancelled })
}

fn is_in_flight(row: &RecordRow) -> bool {
    row.status == Status::InProgress.as_i64()
}

/// Fire-and-forget cancellation of a record's outstanding jobs
fn cancel_in_flight(scheduler: &dyn Scheduler, row: &RecordRow) -> JobIds {
    let jobs = JobIds::parse(&row.job_ids);
    if is_in_flight(row) && !jobs.is_empty() {
        scheduler.cancel(&jobs);
        jobs
    } else {
        JobIds::new()
    }
}
