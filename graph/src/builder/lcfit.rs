use anyhow::Result;
use workflow::{Role, StageKind};

use super::{inherit_sim_output, path_value, BlockCx, Draft};

const FITRES_FILE: &str = "FITOPT000.FITRES.gz";

/// One light-curve fit per data or sim task whose name matches `MASK`.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let options = cx.block.opts()?;
    let sims = cx.masked(&[StageKind::DataPrep, StageKind::Sim], &["MASK"]);
    if sims.is_empty() {
        return Err(cx.empty_fan_out(&["MASK"]).into());
    }

    let mut drafts = Vec::with_capacity(sims.len());
    for sim in sims {
        let name = format!("{}_{}", cx.label(), sim.name);
        let lc_output_dir = cx.task_dir(&name).join("output");
        let fitres_dirs: Vec<_> = sim
            .output
            .get_strs("versions")
            .into_iter()
            .map(|v| path_value(lc_output_dir.join(v)))
            .collect();

        let mut draft = Draft::new(name.clone(), options.clone());
        draft.slots.push(Role::Sim, sim.id);
        inherit_sim_output(&mut draft.output, sim);
        draft
            .output
            .set("lcfit_name", name.as_str())
            .set("lc_output_dir", path_value(lc_output_dir))
            .set("fitres_dirs", fitres_dirs)
            .set("fitres_file", FITRES_FILE);
        drafts.push(draft);
    }
    Ok(drafts)
}
