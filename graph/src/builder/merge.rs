use anyhow::Result;
use workflow::{Role, StageKind};

use super::{inherit_sim_output, path_value, BlockCx, Draft};

/// One merge per (light-curve fit, aggregation) pair that share a sim.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let options = cx.block.opts()?;
    let fits = cx.masked(&[StageKind::LcFit], &["MASK", "MASK_LCFIT"]);
    let aggs = cx.masked(&[StageKind::Aggregate], &["MASK", "MASK_AGG"]);

    let mut drafts = Vec::new();
    for fit in &fits {
        for agg in aggs
            .iter()
            .filter(|a| a.output.get_str("sim_name") == fit.output.get_str("sim_name"))
        {
            let name = format!("{}_{}_{}", cx.label(), fit.name, agg.name);
            let lc_output_dir = cx.task_dir(&name).join("output");
            let fitres_dirs: Vec<_> = fit
                .output
                .get_strs("fitres_dirs")
                .into_iter()
                .filter_map(|d| std::path::Path::new(d).file_name())
                .map(|base| path_value(lc_output_dir.join(base)))
                .collect();

            let mut draft = Draft::new(name, options.clone());
            draft.slots.push(Role::LcFit, fit.id);
            draft.slots.push(Role::Aggregation, agg.id);
            inherit_sim_output(&mut draft.output, fit);
            for key in ["lcfit_name", "fitres_file"] {
                if let Some(v) = fit.output.get(key) {
                    draft.output.set(key, v.clone());
                }
            }
            draft
                .output
                .set(
                    "classifier_names",
                    agg.output.get("classifier_names").cloned().unwrap_or_default(),
                )
                .set(
                    "lcfit_output_dir",
                    fit.output.get("lc_output_dir").cloned().unwrap_or_default(),
                )
                .set("lc_output_dir", path_value(lc_output_dir))
                .set("fitres_dirs", fitres_dirs);
            drafts.push(draft);
        }
    }

    if drafts.is_empty() {
        return Err(cx.empty_fan_out(&["MASK", "MASK_LCFIT", "MASK_AGG"]).into());
    }
    Ok(drafts)
}
