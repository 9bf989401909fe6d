// Stage 1: build solvated, ionized boxes for both states in water and in
// the protein, minimize them and produce the equilibration inputs.

use crate::stages::{Execution, StageContext, StageDefinition, StageError, Validation};

pub const SCRIPT: &str = "MD_preparation.sh";

/// Inputs the operator places in the work directory before adding it
pub const INPUTS: [&str; 8] = [
    "merged.pdb",
    "protein_pdb2gmx.pdb",
    "top_water.top",
    "topol.top",
    "mdp/emA.mdp",
    "mdp/emB.mdp",
    "mdp/eqA.mdp",
    "mdp/eqB.mdp",
];

pub struct MdPreparation;

impl MdPreparation {
    pub fn script(ctx: &StageContext) -> String {
        let gmx = &ctx.config.gromacs_binary;
        let maxwarn = ctx.config.maxwarn;
        let threads = ctx.config.omp_threads;
        let mut script = ctx.script_header(threads);
        script.push_str(&format!(
            "{gmx} editconf -f merged.pdb -o stateA_water/box.pdb -d 1.5 -bt cubic
awk '/ATOM/ {{print $ 0}}' protein_pdb2gmx.pdb merged.pdb> stateA_protein/protein_ligand.pdb
{gmx} editconf -f stateA_protein/protein_ligand.pdb -o stateA_protein/box.pdb -d 1.5 -bt cubic
{gmx} solvate -cs spc216.gro -cp stateA_water/box.pdb -o stateA_water/water.pdb -p top_water.top
{gmx} solvate -cs spc216.gro -cp stateA_protein/box.pdb -o stateA_protein/water.pdb -p topol.top
{gmx} grompp -f mdp/emA.mdp -c stateA_water/water.pdb -o stateA_water/water.tpr -p top_water.top -maxwarn {maxwarn}
{gmx} grompp -f mdp/emA.mdp -c stateA_protein/water.pdb -o stateA_protein/water.tpr -p topol.top -maxwarn {maxwarn}
#
echo 4 | {gmx} genion -s stateA_water/water.tpr -neutral -conc 0.15 -o stateA_water/ions.pdb -nname CLJ -pname NAJ -p top_water.top
echo 15 | {gmx} genion -s stateA_protein/water.tpr -neutral -conc 0.15 -o stateA_protein/ions.pdb -nname CLJ -pname NAJ -p topol.top
#
{gmx} grompp -f mdp/emA.mdp -c stateA_water/ions.pdb -o stateA_water/em.tpr -p top_water.top -maxwarn {maxwarn}
{gmx} grompp -f mdp/emB.mdp -c stateA_water/ions.pdb -o stateB_water/em.tpr -p top_water.top -maxwarn {maxwarn}
{gmx} grompp -f mdp/emA.mdp -c stateA_protein/ions.pdb -o stateA_protein/em.tpr -p topol.top -maxwarn {maxwarn}
{gmx} grompp -f mdp/emB.mdp -c stateA_protein/ions.pdb -o stateB_protein/em.tpr -p topol.top -maxwarn {maxwarn}
#
{gmx} mdrun -s stateA_water/em.tpr -c stateA_water/emout.gro -v -ntomp {threads} &
{gmx} mdrun -s stateB_water/em.tpr -c stateB_water/emout.gro -v -ntomp {threads} &
{gmx} mdrun -s stateA_protein/em.tpr -c stateA_protein/emout.gro -v -ntomp {threads} &
{gmx} mdrun -s stateB_protein/em.tpr -c stateB_protein/emout.gro -v -ntomp {threads} &
#
wait
#
{gmx} grompp -f mdp/eqA.mdp -c stateA_water/emout.gro -o stateA_water/eq.tpr -p top_water.top -maxwarn {maxwarn}
{gmx} grompp -f mdp/eqB.mdp -c stateB_water/emout.gro -o stateB_water/eq.tpr -p top_water.top -maxwarn {maxwarn}
{gmx} grompp -f mdp/eqA.mdp -c stateA_protein/emout.gro -o stateA_protein/eq.tpr -p topol.top -maxwarn {maxwarn}
{gmx} grompp -f mdp/eqB.mdp -c stateB_protein/emout.gro -o stateB_protein/eq.tpr -p topol.top -maxwarn {maxwarn}
#
popd
"
        ));
        script
    }
}

impl StageDefinition for MdPreparation {
    fn prepare(&self, ctx: &StageContext) -> Result<(), StageError> {
        ctx.require_inputs(&INPUTS)?;
        ctx.create_state_dirs()?;
        ctx.write_script(SCRIPT, &Self::script(ctx))?;
        Ok(())
    }

    fn execute(&self, ctx: &StageContext) -> Result<Execution, StageError> {
        ctx.run_script(SCRIPT)
    }

    fn validate(&self, ctx: &StageContext) -> Validation {
        ctx.expect_outputs(&ctx.state_files("eq.tpr"))
    }
}
