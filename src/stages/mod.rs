//! Stage handlers
//!
//! Each pipeline stage knows how to prepare its inputs, start its work,
//! tell whether that work has finished and check what it produced. The engine
//! only sees the [`StageHandler`] trait; [`Pipeline`] is the production
//! implementation and picks the stage-specific definition from the record's
//! stage field.

pub mod context;
pub mod md_preparation;
pub mod md;
pub mod fep_preparation;
pub mod fep_production;
pub mod result_processing;

pub use context::*;

use std::path::{Path, PathBuf};
use thiserror::Error;
use crate::config::PipelineConfig;
use crate::models::{JobIds, Stage};
use crate::scheduler::{JobState, Scheduler, SubmitError};

/// Per-state working directories shared by every stage
pub const STATE_DIRS: [&str; 4] = ["stateA_water", "stateB_water", "stateA_protein", "stateB_protein"];
pub const RESULT_DIRS: [&str; 2] = ["result_water", "result_protein"];

/// The work item a handler operates on
#[derive(Debug, Clone, Copy)]
pub struct WorkItem<'a> {
    pub directory: &'a str,
    pub stage: Stage,
    pub root: &'a Path,
}

impl<'a> WorkItem<'a> {
    pub fn new(directory: &'a str, stage: Stage, root: &'a Path) -> Self {
        Self { directory, stage, root }
    }

    /// Absolute path of the work item's directory
    pub fn path(&self) -> PathBuf {
        self.root.join(self.directory)
    }

    /// Last component of the directory name, used to label outputs
    pub fn name(&self) -> &'a str {
        self.directory
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(self.directory)
    }
}

/// Result of starting a stage
#[derive(Debug)]
pub enum Execution {
    /// Ran to completion in-process; nothing to wait for
    Completed,
    /// Handed to the scheduler
    Submitted(JobIds),
    /// The scheduler refused or could not be reached; retry next pass
    Deferred(SubmitError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Pass,
    Fail(String),
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("work directory {0} does not exist")]
    MissingWorkDir(PathBuf),
    #[error("missing prerequisite {0}")]
    MissingInput(PathBuf),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to launch {script}: {source}")]
    Launch {
        script: PathBuf,
        source: std::io::Error,
    },
}

/// Capability set every stage provides to the engine
pub trait StageHandler {
    /// Materialize the stage's scripts and directories. Safe to re-run.
    fn prepare(&self, item: &WorkItem) -> Result<(), StageError>;

    /// Run the stage in-process or submit it to the scheduler
    fn execute(&self, item: &WorkItem) -> Result<Execution, StageError>;

    fn poll(&self, item: &WorkItem, jobs: &JobIds) -> JobState;

    fn validate(&self, item: &WorkItem) -> Validation;
}

/// Stage-specific behaviour behind [`Pipeline`]
pub trait StageDefinition {
    fn prepare(&self, ctx: &StageContext) -> Result<(), StageError>;

    fn execute(&self, ctx: &StageContext) -> Result<Execution, StageError>;

    /// In-process stages are already finished by the time they are polled
    fn poll(&self, _ctx: &StageContext, _jobs: &JobIds) -> JobState {
        JobState::Done
    }

    fn validate(&self, ctx: &StageContext) -> Validation;
}

/// Lookup table from stage to its definition
pub fn definition(stage: Stage) -> &'static dyn StageDefinition {
    match stage {
        Stage::MdPreparation => &md_preparation::MdPreparation,
        Stage::Md => &md::Md,
        Stage::FepPreparation => &fep_preparation::FepPreparation,
        Stage::FepProduction => &fep_production::FepProduction,
        Stage::ResultProcessing => &result_processing::ResultProcessing,
    }
}

/// Production handler: GROMACS scripts, run locally or through the scheduler
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    scheduler: &'a dyn Scheduler,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, scheduler: &'a dyn Scheduler) -> Self {
        Self { config, scheduler }
    }

    fn context<'b>(&'b self, item: &'b WorkItem<'b>) -> StageContext<'b> {
        StageContext::new(item, self.config, self.scheduler)
    }
}

impl StageHandler for Pipeline<'_> {
    fn prepare(&self, item: &WorkItem) -> Result<(), StageError> {
        definition(item.stage).prepare(&self.context(item))
    }

    fn execute(&self, item: &WorkItem) -> Result<Execution, StageError> {
        definition(item.stage).execute(&self.context(item))
    }

    fn poll(&self, item: &WorkItem, jobs: &JobIds) -> JobState {
        definition(item.stage).poll(&self.context(item), jobs)
    }

    fn validate(&self, item: &WorkItem) -> Validation {
        definition(item.stage).validate(&self.context(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_paths() {
        let root = Path::new("/data/fep");
        let item = WorkItem::new("batch1/lig01", Stage::Md, root);
        assert_eq!(item.path(), PathBuf::from("/data/fep/batch1/lig01"));
        assert_eq!(item.name(), "lig01");

        let item = WorkItem::new("lig02", Stage::Md, root);
        assert_eq!(item.name(), "lig02");
    }
}
