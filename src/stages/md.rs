// Stage 2: equilibrium MD for all four states, run through the scheduler.

use crate::models::JobIds;
use crate::scheduler::{BatchLayout, BatchScript, JobState};
use crate::utils::job_name;
use crate::stages::{Execution, StageContext, StageDefinition, StageError, Validation};

pub const SCRIPT: &str = "MD.sh";
pub const BATCH_SCRIPT: &str = "slurm-MD.sh";

pub struct Md;

impl Md {
    pub fn script(ctx: &StageContext) -> String {
        let gmx = &ctx.config.gromacs_binary;
        let threads = ctx.config.md_omp_threads;
        let mut script = ctx.script_header(threads);
        for state in crate::stages::STATE_DIRS {
            script.push_str(&format!(
                "mpirun -n 1 {gmx} mdrun -s {state}/eq.tpr -x {state}/traj_comp.xtc -ntomp {threads}\n"
            ));
        }
        script.push_str("#\npopd\n");
        script
    }

    pub fn layout() -> BatchLayout {
        BatchLayout { nodes: 1, ntasks: 1, ntasks_per_node: 1 }
    }
}

impl StageDefinition for Md {
    fn prepare(&self, ctx: &StageContext) -> Result<(), StageError> {
        ctx.require_inputs(&ctx.state_files("eq.tpr"))?;
        let script = ctx.write_script(SCRIPT, &Self::script(ctx))?;
        let batch = BatchScript {
            script: &script,
            job_name: job_name("MD", ctx.item.name()),
            layout: Self::layout(),
            settings: &ctx.config.slurm,
        };
        ctx.write_script(BATCH_SCRIPT, &batch.render())?;
        Ok(())
    }

    fn execute(&self, ctx: &StageContext) -> Result<Execution, StageError> {
        Ok(ctx.submit(BATCH_SCRIPT, None))
    }

    fn poll(&self, ctx: &StageContext, jobs: &JobIds) -> JobState {
        ctx.scheduler.poll(jobs)
    }

    fn validate(&self, ctx: &StageContext) -> Validation {
        ctx.expect_outputs(&ctx.state_files("traj_comp.xtc"))
    }
}
