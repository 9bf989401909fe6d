// Stage 3: cut the equilibrium trajectories into frames and build one
// FEP input per frame and state.

use crate::stages::{Execution, StageContext, StageDefinition, StageError, Validation, STATE_DIRS};

pub const SCRIPT: &str = "FEP_preparation.sh";

pub struct FepPreparation;

impl FepPreparation {
    pub fn script(ctx: &StageContext) -> String {
        let gmx = &ctx.config.gromacs_binary;
        let maxwarn = ctx.config.fep_preparation_maxwarn;
        let last_frame = ctx.config.fep_frames.saturating_sub(1);
        let mut script = ctx.script_header(ctx.config.omp_threads);

        for state in STATE_DIRS {
            script.push_str(&format!(
                "echo 0 | {gmx} trjconv -s {state}/eq.tpr -f {state}/traj_comp.xtc -o {state}/frame.gro -b 1 -pbc mol -ur compact -sep\n"
            ));
        }
        script.push_str(&format!("#\nfor i in `seq 0 {last_frame}`\ndo\n"));
        for state in STATE_DIRS {
            let topology = if state.ends_with("water") { "top_water.top" } else { "topol.top" };
            let mdp = if state.starts_with("stateA") { "mdp/tiA.mdp" } else { "mdp/tiB.mdp" };
            script.push_str(&format!(
                "    {gmx} grompp -f {mdp} -p {topology} -c {state}/frame${{i}}.gro -o {state}/tpr${{i}}.tpr -maxwarn {maxwarn}\n"
            ));
        }
        script.push_str("done\n#\npopd\n");
        script
    }
}

impl StageDefinition for FepPreparation {
    fn prepare(&self, ctx: &StageContext) -> Result<(), StageError> {
        ctx.require_inputs(&["mdp/tiA.mdp", "mdp/tiB.mdp"])?;
        ctx.require_inputs(&ctx.state_files("traj_comp.xtc"))?;
        ctx.write_script(SCRIPT, &Self::script(ctx))?;
        Ok(())
    }

    fn execute(&self, ctx: &StageContext) -> Result<Execution, StageError> {
        ctx.run_script(SCRIPT)
    }

    fn validate(&self, ctx: &StageContext) -> Validation {
        ctx.expect_outputs(&ctx.frame_files("tpr", "tpr"))
    }
}
