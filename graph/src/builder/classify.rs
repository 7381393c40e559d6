use anyhow::Result;
use workflow::{Role, StageKind};

use super::{inherit_sim_output, path_value, BlockCx, Draft};
use crate::{Attr, Resolver, TaskNode};

const MODES: [&str; 2] = ["train", "predict"];

/// One classifier per data/sim task (or per light-curve fit with `USE_FIT`)
/// that matches the block's masks.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let mut options = cx.block.opts()?;
    let mode = cx.block.require_str("MODE")?.to_ascii_lowercase();
    if !MODES.contains(&mode.as_str()) {
        return Err(cx.block.invalid("MODE", "train or predict").into());
    }
    options.insert("MODE".to_owned(), mode.clone().into());
    let use_fit = cx.block.get_bool("USE_FIT", false)?;

    // a predicting classifier needs a trained model, either from a path or another classifier:
    let model = if mode == "predict" {
        let model = cx.block.require_str("MODEL")?;
        if model.contains('/') {
            options.insert("MODEL".to_owned(), model.clone().into());
            Model::Path(model)
        } else {
            let trained: Vec<&TaskNode> = cx
                .upstream(&[StageKind::Classify])
                .into_iter()
                .filter(|n| n.output.get_str("mode") == Some("train"))
                .collect();
            let resolver = Resolver::new("trained CLASSIFICATION", trained, Attr::Label)
                .with_fallback(Attr::Output("prob_column_name"));
            match cx.resolve(&resolver, &model) {
                Some(node) => Model::Task(node),
                None => return Ok(Vec::with_capacity(0)),
            }
        }
    } else {
        Model::None
    };

    let label = cx.label().to_owned();
    let prob_column_name = match options.get("PROB_COLUMN_NAME").and_then(|v| v.as_str()) {
        Some(name) => name.to_owned(),
        None => format!("PROB_{label}"),
    };

    // (sim, optional lcfit) pairs this classifier fans out over:
    let targets: Vec<(&TaskNode, Option<&TaskNode>)> = if use_fit {
        let sims = cx.masked(&[StageKind::DataPrep, StageKind::Sim], &["MASK_SIM"]);
        let fits = cx.masked(&[StageKind::LcFit], &["MASK", "MASK_FIT"]);
        fits.into_iter()
            .filter_map(|fit| {
                let sim_id = fit.slots.first(Role::Sim)?;
                sims.iter().find(|s| s.id == sim_id).map(|s| (*s, Some(fit)))
            })
            .collect()
    } else {
        cx.masked(&[StageKind::DataPrep, StageKind::Sim], &["MASK", "MASK_SIM"])
            .into_iter()
            .map(|sim| (sim, None))
            .collect()
    };
    if targets.is_empty() {
        log::warn!("CLASSIFICATION.{label} matches no upstream tasks and will not run");
    }

    let mut drafts = Vec::with_capacity(targets.len());
    for (sim, fit) in targets {
        let upstream_name = fit.map_or(&sim.name, |f| &f.name);
        let name = format!("{label}_{upstream_name}");
        let dir = cx.task_dir(&name);

        let mut draft = Draft::new(name, options.clone());
        draft.slots.push(Role::Sim, sim.id);
        if let Some(fit) = fit {
            draft.slots.push(Role::LcFit, fit.id);
        }
        let model_filename = match &model {
            Model::None => path_value(dir.join("model.pkl")),
            Model::Path(path) => path.as_str().into(),
            Model::Task(node) => {
                draft.slots.push(Role::Model, node.id);
                node.output
                    .get("model_filename")
                    .cloned()
                    .unwrap_or_default()
            }
        };

        inherit_sim_output(&mut draft.output, sim);
        draft
            .output
            .set("classifier_name", label.as_str())
            .set("mode", mode.as_str())
            .set("prob_column_name", prob_column_name.as_str())
            .set("predictions_filename", path_value(dir.join("predictions.csv")))
            .set("model_filename", model_filename);
        drafts.push(draft);
    }
    Ok(drafts)
}

enum Model<'g> {
    None,
    Path(String),
    Task(&'g TaskNode),
}
