//! Pipeline configuration
//!
//! Settings come from a `key=value` rc file. The first of these that exists
//! is used:
//! - `<pipeline root>/fepdb.rc`
//! - `~/.fepdb/rc`
//!
//! Missing keys keep their defaults. Lines starting with `#` are comments.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}:{line}: expected key=value, got '{text}'")]
    Syntax { path: PathBuf, line: usize, text: String },
    #[error("{path}:{line}: invalid value '{value}' for '{key}'")]
    InvalidValue {
        path: PathBuf,
        line: usize,
        key: String,
        value: String,
    },
    #[error("{path}: fep.frames ({frames}) must equal fep.array_size ({array_size}) x {per_job} tasks per array job")]
    FrameMismatch {
        path: PathBuf,
        frames: u32,
        array_size: u32,
        per_job: u32,
    },
}

/// Slurm tasks in one FEP array job; each task runs one frame
pub const FEP_TASKS_PER_JOB: u32 = 20;

/// Batch scheduler settings shared by every submitted stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmSettings {
    pub partition: String,
    pub time: String,
    pub cpus_per_node: u32,
}

impl Default for SlurmSettings {
    fn default() -> Self {
        Self {
            partition: "hpc4-3d".to_string(),
            time: "48:00:00".to_string(),
            cpus_per_node: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Environment modules loaded at the top of every stage script
    pub gromacs_modules: String,
    pub gromacs_binary: String,
    pub omp_threads: u32,
    pub md_omp_threads: u32,
    pub maxwarn: u32,
    pub fep_preparation_maxwarn: u32,
    /// Trajectory frames turned into FEP inputs per state
    pub fep_frames: u32,
    /// Array tasks in one FEP production submission
    pub fep_array_size: u32,
    pub temperature: u32,
    pub slurm: SlurmSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gromacs_modules: "anaconda3/python3-5.1.0 openmpi/4.1.0 gromacs/2021".to_string(),
            gromacs_binary: "gmx_mpi".to_string(),
            omp_threads: 6,
            md_omp_threads: 24,
            maxwarn: 20,
            fep_preparation_maxwarn: 21,
            fep_frames: 100,
            fep_array_size: 5,
            temperature: 298,
            slurm: SlurmSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Per-root config file
    pub fn root_config_path(root: &Path) -> PathBuf {
        root.join("fepdb.rc")
    }

    /// Per-user config file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".fepdb").join("rc"))
    }

    /// Load configuration for a pipeline root, falling back to defaults
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let candidates = std::iter::once(Self::root_config_path(root))
            .chain(Self::user_config_path());

        for path in candidates {
            if path.is_file() {
                log::debug!("Loading config from {}", path.display());
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse rc content; `path` is only used for error messages
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Syntax {
                path: path.to_path_buf(),
                line: line_no,
                text: line.to_string(),
            })?;
            let key = key.trim();
            let value = value.trim();

            let number = || {
                value.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| ConfigError::InvalidValue {
                    path: path.to_path_buf(),
                    line: line_no,
                    key: key.to_string(),
                    value: value.to_string(),
                })
            };

            match key {
                "gromacs.modules" => config.gromacs_modules = value.to_string(),
                "gromacs.binary" => config.gromacs_binary = value.to_string(),
                "omp_threads" => config.omp_threads = number()?,
                "md.omp_threads" => config.md_omp_threads = number()?,
                "maxwarn" => config.maxwarn = number()?,
                "fep_preparation.maxwarn" => config.fep_preparation_maxwarn = number()?,
                "fep.frames" => config.fep_frames = number()?,
                "fep.array_size" => config.fep_array_size = number()?,
                "results.temperature" => config.temperature = number()?,
                "slurm.partition" => config.slurm.partition = value.to_string(),
                "slurm.time" => config.slurm.time = value.to_string(),
                "slurm.cpus_per_node" => config.slurm.cpus_per_node = number()?,
                _ => log::warn!("{}:{}: ignoring unknown key '{}'", path.display(), line_no, key),
            }
        }

        if config.fep_array_size.checked_mul(FEP_TASKS_PER_JOB) != Some(config.fep_frames) {
            return Err(ConfigError::FrameMismatch {
                path: path.to_path_buf(),
                frames: config.fep_frames,
                array_size: config.fep_array_size,
                per_job: FEP_TASKS_PER_JOB,
            });
        }

        Ok(config)
    }
}
