use anyhow::Result;
use workflow::{Role, StageKind};

use super::{mask_matches, path_value, BlockCx, Draft};

/// One aggregation per data/sim task, combining the predictions of every
/// classifier run on it.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let options = cx.block.opts()?;
    let mask_clas = cx.block.get_strs("MASK_CLAS")?;
    let sims = cx.masked(&[StageKind::DataPrep, StageKind::Sim], &["MASK", "MASK_SIM"]);
    let classifiers = cx.upstream(&[StageKind::Classify]);

    let mut drafts = Vec::with_capacity(sims.len());
    for sim in sims {
        let name = format!("{}_{}", cx.label(), sim.name);
        let dir = cx.task_dir(&name);
        let mut draft = Draft::new(name, options.clone());
        draft.slots.push(Role::Sim, sim.id);

        let mut classifier_names = Vec::new();
        let mut prob_column_names = Vec::new();
        for clas in classifiers
            .iter()
            .filter(|c| c.slots.first(Role::Sim) == Some(sim.id))
            .filter(|c| mask_matches(&mask_clas, &c.name))
        {
            draft.slots.push(Role::Classifier, clas.id);
            classifier_names.extend(clas.output.get_str("classifier_name"));
            prob_column_names.extend(clas.output.get_str("prob_column_name"));
        }
        if classifier_names.is_empty() {
            log::warn!("AGGREGATION task {} has no classifiers to aggregate", draft.name);
        }

        draft
            .output
            .set("sim_name", sim.output.get("sim_name").cloned().unwrap_or_default())
            .set("classifier_names", classifier_names)
            .set("prob_column_names", prob_column_names)
            .set("merge_key_filename", path_value(dir.join("merged.csv")));
        drafts.push(draft);
    }
    Ok(drafts)
}
