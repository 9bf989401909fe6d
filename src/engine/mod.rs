//! Orchestration engine
//!
//! One call to [`Engine::run_pass`] moves every live record at most one step
//! through the stage cycle:
//!
//! | status      | action              | next                               |
//! |-------------|---------------------|------------------------------------|
//! | NotStarted  | prepare             | Prepared                           |
//! | Prepared    | execute             | InProgress (+ job ids)             |
//! | InProgress  | poll                | Finished once jobs are done        |
//! | Finished    | validate            | Done, or Failed                    |
//! | Done        | roll forward        | next stage, NotStarted             |
//! | Failed      | -                   | -                                  |
//!
//! All state lives in the store; a pass can be interrupted and re-run at any
//! time. Invocations must be serialized: two concurrent passes over the same
//! database may both act on the same record.

pub mod report;

pub use report::*;

use std::path::Path;
use anyhow::Result;
use rusqlite::Connection;
use crate::models::{RecordRow, Status, TaskRecord};
use crate::repo::RecordRepo;
use crate::stages::{Execution, StageHandler, Validation, WorkItem};
use crate::scheduler::JobState;

/// What happened to one record during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The record moved and was written back
    Advanced(TaskRecord),
    /// Jobs still running
    Waiting,
    /// Submission failed transiently; retried next pass
    Deferred(String),
    /// Terminal record
    Skipped,
}

pub struct Engine<'a, H: StageHandler> {
    conn: &'a Connection,
    handler: &'a H,
    root: &'a Path,
}

impl<'a, H: StageHandler> Engine<'a, H> {
    pub fn new(conn: &'a Connection, handler: &'a H, root: &'a Path) -> Self {
        Self { conn, handler, root }
    }

    /// Run one pass over the whole store
    ///
    /// Errors for individual records are collected in the report; only a
    /// failure to read the store itself aborts the pass.
    pub fn run_pass(&self) -> Result<PassReport> {
        let mut report = PassReport::default();

        for row in RecordRepo::list_corrupt(self.conn)? {
            let message = format!("corrupt record: stage={} status={}", row.stage, row.status);
            log::error!("Skipping '{}': {}", row.directory, message);
            report.errors.push(RecordFailure { directory: row.directory, message });
        }

        // Snapshot every bucket before touching anything, so a record that
        // advances is not picked up again by a later bucket in this pass.
        let mut snapshot: Vec<RecordRow> = Vec::new();
        for status in Status::ALL {
            if status == Status::Failed {
                report.skipped += RecordRepo::list_by_status(self.conn, status)?.len();
                continue;
            }
            snapshot.extend(RecordRepo::list_by_status(self.conn, status)?);
        }

        for row in snapshot {
            // Out-of-domain stages were reported above
            let record = match TaskRecord::try_from(row) {
                Ok(record) => record,
                Err(_) => continue,
            };

            match self.step(&record) {
                Ok(outcome) => report.record(&record, outcome),
                Err(e) => {
                    log::error!("'{}' ({}, {}): {:#}", record.directory, record.stage, record.status, e);
                    report.errors.push(RecordFailure {
                        directory: record.directory.clone(),
                        message: format!("{:#}", e),
                    });
                }
            }
        }

        log::info!("{}", report.summary());
        Ok(report)
    }

    /// Apply the transition for one record's current state
    pub fn step(&self, record: &TaskRecord) -> Result<StepOutcome> {
        if record.is_terminal() {
            return Ok(StepOutcome::Skipped);
        }

        let item = WorkItem::new(&record.directory, record.stage, self.root);

        match record.status {
            Status::NotStarted => {
                self.handler.prepare(&item)?;
                self.advance(record.with_status(Status::Prepared))
            }
            Status::Prepared => match self.handler.execute(&item)? {
                Execution::Completed => self.advance(record.with_status(Status::InProgress)),
                Execution::Submitted(jobs) => {
                    let mut next = record.with_status(Status::InProgress);
                    next.job_ids = jobs;
                    self.advance(next)
                }
                Execution::Deferred(e) => Ok(StepOutcome::Deferred(e.to_string())),
            },
            Status::InProgress => match self.handler.poll(&item, &record.job_ids) {
                JobState::Waiting => Ok(StepOutcome::Waiting),
                JobState::Done => self.advance(record.with_status(Status::Finished)),
            },
            Status::Finished => match self.handler.validate(&item) {
                Validation::Pass => self.advance(record.with_status(Status::Done)),
                Validation::Fail(reason) => {
                    log::warn!("'{}' failed validation of {}: {}", record.directory, record.stage, reason);
                    self.advance(record.with_status(Status::Failed))
                }
            },
            Status::Done => match record.stage.next() {
                Some(next_stage) => self.advance(TaskRecord::new(&record.directory, next_stage)),
                None => Ok(StepOutcome::Skipped),
            },
            Status::Failed => Ok(StepOutcome::Skipped),
        }
    }

    fn advance(&self, next: TaskRecord) -> Result<StepOutcome> {
        RecordRepo::upsert(self.conn, &next)?;
        Ok(StepOutcome::Advanced(next))
    }
}
