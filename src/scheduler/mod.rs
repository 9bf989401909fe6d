//! Batch scheduler client
//!
//! The engine only ever submits, polls and cancels. Implementations must not
//! panic or return hard errors when the scheduler is unreachable: submission
//! reports a [`SubmitError`], polling reports `Waiting`, cancellation logs.

pub mod slurm;

pub use slurm::*;

use std::path::Path;
use thiserror::Error;
use crate::models::JobIds;

/// What the scheduler says about a set of jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// At least one job is still queued or running
    Waiting,
    /// No matching job is active (finished, expired or never known)
    Done,
}

/// Transient submission failure; the submission is retried on the next pass
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("scheduler unreachable: {0}")]
    Unreachable(#[from] std::io::Error),
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("unexpected submission output: '{0}'")]
    UnexpectedOutput(String),
}

pub trait Scheduler {
    /// Submit `script`. With `array_size`, the scheduler fans the script out
    /// into that many indexed executions under one logical job id.
    fn submit(&self, script: &Path, array_size: Option<u32>) -> Result<JobIds, SubmitError>;

    fn poll(&self, jobs: &JobIds) -> JobState;

    /// Best effort; jobs that are already gone are not an error
    fn cancel(&self, jobs: &JobIds);
}
