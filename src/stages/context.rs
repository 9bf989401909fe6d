use std::path::{Path, PathBuf};
use std::process::Command;
use crate::config::PipelineConfig;
use crate::scheduler::Scheduler;
use crate::utils::shell_quote_path;
use crate::stages::{Execution, StageError, Validation, WorkItem, RESULT_DIRS, STATE_DIRS};

/// Everything a stage definition needs for one work item
pub struct StageContext<'a> {
    pub item: &'a WorkItem<'a>,
    pub config: &'a PipelineConfig,
    pub scheduler: &'a dyn Scheduler,
}

impl<'a> StageContext<'a> {
    pub fn new(item: &'a WorkItem<'a>, config: &'a PipelineConfig, scheduler: &'a dyn Scheduler) -> Self {
        Self { item, config, scheduler }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.item.path()
    }

    /// `relative` inside every state directory
    pub fn state_files(&self, relative: &str) -> Vec<PathBuf> {
        let work_dir = self.work_dir();
        STATE_DIRS.iter().map(|state| work_dir.join(state).join(relative)).collect()
    }

    /// `<stem><i>.<extension>` for every FEP frame, in every state directory
    pub fn frame_files(&self, stem: &str, extension: &str) -> Vec<PathBuf> {
        let work_dir = self.work_dir();
        let mut files = Vec::new();
        for state in STATE_DIRS {
            for frame in 0..self.config.fep_frames {
                files.push(work_dir.join(state).join(format!("{}{}.{}", stem, frame, extension)));
            }
        }
        files
    }

    /// Fail unless the work directory and every listed input exist
    pub fn require_inputs<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<(), StageError> {
        let work_dir = self.work_dir();
        if !work_dir.is_dir() {
            return Err(StageError::MissingWorkDir(work_dir));
        }
        for input in inputs {
            let path = work_dir.join(input);
            if !path.exists() {
                return Err(StageError::MissingInput(path));
            }
        }
        Ok(())
    }

    /// Create the state and result directories; existing ones are reused
    pub fn create_state_dirs(&self) -> Result<(), StageError> {
        let work_dir = self.work_dir();
        for dir in STATE_DIRS.iter().chain(RESULT_DIRS.iter()) {
            let path = work_dir.join(dir);
            std::fs::create_dir_all(&path).map_err(|source| StageError::Io { path, source })?;
        }
        Ok(())
    }

    /// Write (or overwrite) a script in the work directory
    pub fn write_script(&self, name: &str, content: &str) -> Result<PathBuf, StageError> {
        let path = self.work_dir().join(name);
        std::fs::write(&path, content).map_err(|source| StageError::Io {
            path: path.clone(),
            source,
        })?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Common script prologue: modules, threads, and a pushd into the work directory
    pub fn script_header(&self, omp_threads: u32) -> String {
        self.script_header_with_env(omp_threads, &[])
    }

    /// Prologue with extra `NAME=value` exports after the thread count
    pub fn script_header_with_env(&self, omp_threads: u32, exports: &[&str]) -> String {
        let mut header = format!(
            "#!/usr/bin/env bash\n\nmodule load {}\n#\nexport OMP_NUM_THREADS={}\n",
            self.config.gromacs_modules, omp_threads
        );
        for export in exports {
            header.push_str(&format!("export {}\n", export));
        }
        header.push_str(&format!("#\npushd {}\n#\n", shell_quote_path(&self.work_dir())));
        header
    }

    /// Run a script to completion with bash
    ///
    /// A non-zero exit is only logged: whatever the script produced is
    /// judged by the stage's validation.
    pub fn run_script(&self, name: &str) -> Result<Execution, StageError> {
        let script = self.work_dir().join(name);
        log::info!("Running {}", script.display());

        let status = Command::new("bash")
            .arg(&script)
            .current_dir(self.work_dir())
            .status()
            .map_err(|source| StageError::Launch {
                script: script.clone(),
                source,
            })?;

        if !status.success() {
            log::warn!("{} exited with {}", script.display(), status);
        }
        Ok(Execution::Completed)
    }

    /// Submit a script; scheduler failures become a deferred execution
    pub fn submit(&self, name: &str, array_size: Option<u32>) -> Execution {
        let script = self.work_dir().join(name);
        match self.scheduler.submit(&script, array_size) {
            Ok(jobs) => Execution::Submitted(jobs),
            Err(e) => {
                log::warn!("Submission of {} deferred: {}", script.display(), e);
                Execution::Deferred(e)
            }
        }
    }

    /// Pass only if every expected output exists
    pub fn expect_outputs(&self, outputs: &[PathBuf]) -> Validation {
        match outputs.iter().find(|path| !path.exists()) {
            Some(missing) => Validation::Fail(format!("missing output {}", missing.display())),
            None => Validation::Pass,
        }
    }
}
