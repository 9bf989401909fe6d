// Stage 5: free energies from the dH/dl curves, collected into
// result_<name>.csv next to the work directory.

use std::path::PathBuf;
use crate::utils::{shell_quote, shell_quote_path};
use crate::stages::{Execution, StageContext, StageDefinition, StageError, Validation};

pub const SCRIPT: &str = "Result_processing.sh";

pub struct ResultProcessing;

impl ResultProcessing {
    /// The CSV the stage must leave behind
    pub fn result_file(ctx: &StageContext) -> PathBuf {
        let work_dir = ctx.work_dir();
        let parent = work_dir.parent().map(PathBuf::from).unwrap_or(work_dir.clone());
        parent.join(format!("result_{}.csv", ctx.item.name()))
    }

    pub fn script(ctx: &StageContext) -> String {
        let analyze = shell_quote_path(&ctx.item.root.join("analyze_dhdl.py"));
        let extract = shell_quote_path(&ctx.item.root.join("extract.py"));
        let temperature = ctx.config.temperature;
        let name = shell_quote(ctx.item.name());
        let output = shell_quote_path(&Self::result_file(ctx));
        let mut script = ctx.script_header(ctx.config.omp_threads);
        script.push_str(&format!(
            "{analyze} -fA stateA_water/dhdl*xvg   -fB stateB_water/dhdl*xvg   -o result_water/results_water.txt     -t {temperature}
{analyze} -fA stateA_protein/dhdl*xvg -fB stateB_protein/dhdl*xvg -o result_protein/results_protein.txt -t {temperature}
{extract} --protein result_protein/results_protein.txt --water result_water/results_water.txt --output {output} --protein_name {name}
#
popd
"
        ));
        script
    }
}

impl StageDefinition for ResultProcessing {
    fn prepare(&self, ctx: &StageContext) -> Result<(), StageError> {
        ctx.require_inputs(&ctx.frame_files("dhdl", "xvg"))?;
        ctx.write_script(SCRIPT, &Self::script(ctx))?;
        Ok(())
    }

    fn execute(&self, ctx: &StageContext) -> Result<Execution, StageError> {
        ctx.run_script(SCRIPT)
    }

    fn validate(&self, ctx: &StageContext) -> Validation {
        ctx.expect_outputs(&[Self::result_file(ctx)])
    }
}
