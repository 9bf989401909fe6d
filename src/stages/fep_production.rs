// Stage 4: non-equilibrium transitions from every frame, submitted as one
// array job. Each array task works through SLURM_NTASKS frames.

use crate::config::FEP_TASKS_PER_JOB;
use crate::models::JobIds;
use crate::scheduler::{BatchLayout, BatchScript, JobState};
use crate::utils::job_name;
use crate::stages::{Execution, StageContext, StageDefinition, StageError, Validation, STATE_DIRS};

pub const SCRIPT: &str = "FEP.sh";
pub const BATCH_SCRIPT: &str = "slurm-FEP.sh";

pub struct FepProduction;

impl FepProduction {
    pub fn script(ctx: &StageContext) -> String {
        let gmx = &ctx.config.gromacs_binary;
        let threads = ctx.config.omp_threads;
        // resubmitted frames overwrite their outputs
        let mut script = ctx.script_header_with_env(threads, &["GMX_MAXBACKUP=-1"]);
        script.push_str("let \"JOBinternal=${SLURM_ARRAY_TASK_ID}*${SLURM_NTASKS}+${SLURM_PROCID}\"\n#\n");
        for state in STATE_DIRS {
            script.push_str(&format!(
                "mpirun -n 1 {gmx} mdrun -v -s {state}/tpr${{JOBinternal}}.tpr -dhdl {state}/dhdl${{JOBinternal}}.xvg -ntomp {threads} 2>&1 | tee {state}/dhdl${{JOBinternal}}.log_gmx\n"
            ));
        }
        script.push_str("#\npopd\n");
        script
    }

    pub fn layout() -> BatchLayout {
        BatchLayout { nodes: 5, ntasks: FEP_TASKS_PER_JOB, ntasks_per_node: 4 }
    }
}

impl StageDefinition for FepProduction {
    fn prepare(&self, ctx: &StageContext) -> Result<(), StageError> {
        ctx.require_inputs(&ctx.frame_files("tpr", "tpr"))?;
        let script = ctx.write_script(SCRIPT, &Self::script(ctx))?;
        let batch = BatchScript {
            script: &script,
            job_name: job_name("FEP", ctx.item.name()),
            layout: Self::layout(),
            settings: &ctx.config.slurm,
        };
        ctx.write_script(BATCH_SCRIPT, &batch.render())?;
        Ok(())
    }

    fn execute(&self, ctx: &StageContext) -> Result<Execution, StageError> {
        Ok(ctx.submit(BATCH_SCRIPT, Some(ctx.config.fep_array_size)))
    }

    fn poll(&self, ctx: &StageContext, jobs: &JobIds) -> JobState {
        ctx.scheduler.poll(jobs)
    }

    fn validate(&self, ctx: &StageContext) -> Validation {
        ctx.expect_outputs(&ctx.frame_files("dhdl", "xvg"))
    }
}
