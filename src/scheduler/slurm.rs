use std::path::Path;
use std::process::Command;
use crate::config::SlurmSettings;
use crate::models::JobIds;
use crate::scheduler::{JobState, Scheduler, SubmitError};
use crate::utils::shell_quote_path;

/// squeue's complaint for ids it no longer (or never) knew about
const INVALID_JOB_ID: &str = "Invalid job id specified";

/// Slurm client driving `sbatch`, `squeue` and `scancel`
///
/// Arguments are always passed as separate argv entries, never through a shell.
#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    sbatch: String,
    squeue: String,
    scancel: String,
}

impl Default for SlurmScheduler {
    fn default() -> Self {
        Self {
            sbatch: "sbatch".to_string(),
            squeue: "squeue".to_string(),
            scancel: "scancel".to_string(),
        }
    }
}

impl SlurmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use alternative executables (wrappers, or test stand-ins)
    pub fn with_commands(sbatch: &str, squeue: &str, scancel: &str) -> Self {
        Self {
            sbatch: sbatch.to_string(),
            squeue: squeue.to_string(),
            scancel: scancel.to_string(),
        }
    }
}

impl Scheduler for SlurmScheduler {
    fn submit(&self, script: &Path, array_size: Option<u32>) -> Result<JobIds, SubmitError> {
        let mut cmd = Command::new(&self.sbatch);
        cmd.arg("--parsable");
        if let Some(size) = array_size {
            cmd.arg(format!("--array=0-{}", size.saturating_sub(1)));
        }
        cmd.arg(script);
        // Slurm writes the job's -o/-e logs relative to the submit directory
        if let Some(dir) = script.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(SubmitError::Rejected(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let jobs = parse_sbatch_output(&String::from_utf8_lossy(&output.stdout))?;
        log::info!("Submitted {} as job {}", script.display(), jobs);
        Ok(jobs)
    }

    fn poll(&self, jobs: &JobIds) -> JobState {
        if jobs.is_empty() {
            return JobState::Done;
        }

        let ids = jobs.iter().collect::<Vec<_>>().join(",");
        let output = Command::new(&self.squeue)
            .args(["-h", "-o", "%i", "-j"])
            .arg(&ids)
            .output();

        match output {
            Ok(output) => interpret_squeue(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
            Err(e) => {
                log::warn!("squeue unavailable, treating jobs {} as still waiting: {}", jobs, e);
                JobState::Waiting
            }
        }
    }

    fn cancel(&self, jobs: &JobIds) {
        if jobs.is_empty() {
            return;
        }

        match Command::new(&self.scancel).args(jobs.iter()).output() {
            Ok(output) if output.status.success() => log::info!("Cancelled jobs {}", jobs),
            Ok(output) => log::warn!(
                "scancel for jobs {} reported: {}",
                jobs,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => log::warn!("scancel unavailable, jobs {} not cancelled: {}", jobs, e),
        }
    }
}

/// Parse `sbatch --parsable` output (`<jobid>` or `<jobid>;<cluster>`).
/// The classic `Submitted batch job <jobid>` line is accepted too.
pub fn parse_sbatch_output(stdout: &str) -> Result<JobIds, SubmitError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| SubmitError::UnexpectedOutput(stdout.trim().to_string()))?;

    let id = match line.strip_prefix("Submitted batch job") {
        Some(rest) => rest.trim(),
        None => line.split(';').next().unwrap_or_default().trim(),
    };

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(SubmitError::UnexpectedOutput(line.to_string()));
    }

    let mut jobs = JobIds::new();
    jobs.push(id);
    Ok(jobs)
}

/// Decide job state from an `squeue -h` invocation
///
/// An unknown id means the job is long gone. Any other squeue failure means
/// the controller could not be asked, so the jobs are assumed still running.
pub fn interpret_squeue(success: bool, stdout: &str, stderr: &str) -> JobState {
    if stderr.contains(INVALID_JOB_ID) {
        return JobState::Done;
    }
    if !success {
        log::warn!("squeue failed, assuming jobs still waiting: {}", stderr.trim());
        return JobState::Waiting;
    }
    if stdout.lines().any(|l| !l.trim().is_empty()) {
        JobState::Waiting
    } else {
        JobState::Done
    }
}

/// Resource layout for one batch submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLayout {
    pub nodes: u32,
    pub ntasks: u32,
    pub ntasks_per_node: u32,
}

/// Slurm wrapper around a stage script
#[derive(Debug, Clone)]
pub struct BatchScript<'a> {
    pub script: &'a Path,
    pub job_name: String,
    pub layout: BatchLayout,
    pub settings: &'a SlurmSettings,
}

impl BatchScript<'_> {
    pub fn cpus_per_task(&self) -> u32 {
        (self.settings.cpus_per_node * self.layout.nodes / self.layout.ntasks.max(1)).max(1)
    }

    pub fn render(&self) -> String {
        format!(
            "#!/bin/bash
#SBATCH --nodes={nodes}
#SBATCH --ntasks={ntasks}
#SBATCH --ntasks-per-node={per_node}
#SBATCH --cpus-per-task={cpus}
#SBATCH --job-name={name}
#SBATCH -o work-%J.out
#SBATCH -e work-%J.err
#SBATCH --time={time}
#SBATCH --get-user-env
#SBATCH --partition={partition}

srun bash {script}
",
            nodes = self.layout.nodes,
            ntasks = self.layout.ntasks,
            per_node = self.layout.ntasks_per_node,
            cpus = self.cpus_per_task(),
            name = self.job_name,
            time = self.settings.time,
            partition = self.settings.partition,
            script = shell_quote_path(self.script),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_sbatch_parsable() {
        assert_eq!(parse_sbatch_output("4242\n").unwrap().to_string(), "4242");
        assert_eq!(parse_sbatch_output("4242;cluster1\n").unwrap().to_string(), "4242");
    }

    #[test]
    fn test_parse_sbatch_classic() {
        let jobs = parse_sbatch_output("Submitted batch job 981\n").unwrap();
        assert_eq!(jobs.to_string(), "981");
    }

    #[test]
    fn test_parse_sbatch_garbage() {
        assert!(matches!(parse_sbatch_output(""), Err(SubmitError::UnexpectedOutput(_))));
        assert!(matches!(parse_sbatch_output("sbatch: error"), Err(SubmitError::UnexpectedOutput(_))));
    }

    #[test]
    fn test_interpret_squeue() {
        assert_eq!(interpret_squeue(true, "123_0\n123_1\n", ""), JobState::Waiting);
        assert_eq!(interpret_squeue(true, "\n", ""), JobState::Done);
        assert_eq!(
            interpret_squeue(false, "", "slurm_load_jobs error: Invalid job id specified"),
            JobState::Done
        );
        assert_eq!(
            interpret_squeue(false, "", "slurm_load_jobs error: Unable to contact slurm controller"),
            JobState::Waiting
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_submit_runs_from_script_directory() {
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let stand_in = temp_dir.path().join("sbatch");
        std::fs::write(&stand_in, "#!/bin/sh\npwd > submit_dir.txt\necho \"$@\" > submit_args.txt\necho 4242\n").unwrap();
        std::fs::set_permissions(&stand_in, std::fs::Permissions::from_mode(0o755)).unwrap();

        let work_dir = temp_dir.path().join("lig 01");
        std::fs::create_dir_all(&work_dir).unwrap();
        let script = work_dir.join("slurm-FEP.sh");
        std::fs::write(&script, "").unwrap();

        let slurm = SlurmScheduler::with_commands(stand_in.to_str().unwrap(), "squeue", "scancel");
        let jobs = slurm.submit(&script, Some(5)).unwrap();
        assert_eq!(jobs.to_string(), "4242");

        let submit_dir = std::fs::read_to_string(work_dir.join("submit_dir.txt")).unwrap();
        assert_eq!(PathBuf::from(submit_dir.trim()).canonicalize().unwrap(), work_dir.canonicalize().unwrap());
        let args = std::fs::read_to_string(work_dir.join("submit_args.txt")).unwrap();
        assert!(args.starts_with("--parsable --array=0-4 "));
    }

    #[test]
    fn test_unreachable_scheduler() {
        let slurm = SlurmScheduler::with_commands(
            "/nonexistent/sbatch",
            "/nonexistent/squeue",
            "/nonexistent/scancel",
        );
        let jobs = JobIds::parse("1;2");

        let submitted = slurm.submit(Path::new("job.sh"), None);
        assert!(matches!(submitted, Err(SubmitError::Unreachable(_))));
        assert_eq!(slurm.poll(&jobs), JobState::Waiting);
        // Must not panic
        slurm.cancel(&jobs);
    }

    #[test]
    fn test_poll_without_jobs_is_done() {
        let slurm = SlurmScheduler::with_commands("/nonexistent", "/nonexistent", "/nonexistent");
        assert_eq!(slurm.poll(&JobIds::new()), JobState::Done);
    }

    #[test]
    fn test_batch_script_render() {
        let settings = SlurmSettings::default();
        let script = PathBuf::from("/data/lig01/FEP.sh");
        let batch = BatchScript {
            script: &script,
            job_name: "FEP-lig01".to_string(),
            layout: BatchLayout { nodes: 5, ntasks: 20, ntasks_per_node: 4 },
            settings: &settings,
        };

        assert_eq!(batch.cpus_per_task(), 12);
        let rendered = batch.render();
        assert!(rendered.starts_with("#!/bin/bash\n"));
        assert!(rendered.contains("#SBATCH --nodes=5\n"));
        assert!(rendered.contains("#SBATCH --cpus-per-task=12\n"));
        assert!(rendered.contains("#SBATCH --job-name=FEP-lig01\n"));
        assert!(rendered.contains("#SBATCH --partition=hpc4-3d\n"));
        assert!(rendered.ends_with("srun bash /data/lig01/FEP.sh\n"));
    }

    #[test]
    fn test_batch_script_quotes_script_path() {
        let settings = SlurmSettings::default();
        let script = PathBuf::from("/data/fep/lig 01/MD.sh");
        let batch = BatchScript {
            script: &script,
            job_name: "MD-lig_01".to_string(),
            layout: BatchLayout { nodes: 1, ntasks: 1, ntasks_per_node: 1 },
            settings: &settings,
        };
        assert!(batch.render().ends_with("srun bash '/data/fep/lig 01/MD.sh'\n"));
    }
}
