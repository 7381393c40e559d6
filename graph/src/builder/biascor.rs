use anyhow::Result;
use serde_json::{json, Value};
use workflow::{Role, StageBlock, StageKind};

use super::{path_value, BlockCx, Draft};
use crate::{Attr, Resolver, TaskNode};

/// References of the base block, or of one `MUOPTS` overlay.
#[derive(Clone, Default)]
struct Refs<'g> {
    classifier: Option<&'g TaskNode>,
    sim_biascor: Vec<&'g TaskNode>,
    sim_ccprior: Vec<&'g TaskNode>,
}

impl Refs<'_> {
    fn to_json(&self) -> Value {
        json!({
            "classifier": self.classifier.map(|c| c.label.as_str()),
            "prob_column_name": self.classifier.and_then(|c| c.output.get_str("prob_column_name")),
            "sim_biascor": names(&self.sim_biascor),
            "sim_ccprior": names(&self.sim_ccprior),
        })
    }
}

/// One bias correction per block, fitting the merged data against
/// bias-correction sims. Each `MUOPTS` overlay resolves its own references;
/// anything an overlay leaves unset is inherited from the base block.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let mut options = cx.block.opts()?;
    let block = cx.block;

    if !block.has("DATA") {
        cx.errors.add(block.missing("DATA"));
    }
    if !block.has("SIMFILE_BIASCOR") {
        cx.errors.add(block.missing("SIMFILE_BIASCOR"));
    }

    let base = resolve_refs(cx, block, &Refs::default());
    let data_names = cx.check(block.get_strs("DATA")).unwrap_or_default();
    let data = resolve_merges(cx, "DATA", &data_names, base.classifier);

    let mut overlays = Vec::new();
    for overlay in cx.check(block.sub_blocks("MUOPTS")).unwrap_or_default() {
        let refs = resolve_refs(cx, &overlay, &base);
        let opts = cx.check(overlay.opts()).unwrap_or_default();
        overlays.push((overlay.label, refs, opts));
    }

    if !cx.errors.is_empty() {
        return Ok(Vec::with_capacity(0));
    }

    let name = cx.label().to_owned();
    let dir = cx.task_dir(&name);
    let mut draft = Draft::new(name, Default::default());

    for merge in &data {
        draft.slots.push(Role::Merge, merge.id);
    }
    for refs in std::iter::once(&base).chain(overlays.iter().map(|(_, refs, _)| refs)) {
        fill_slots(&mut draft, refs);
    }

    let mut muopts = Vec::with_capacity(overlays.len());
    for (label, refs, opts) in &overlays {
        let mut val = refs.to_json();
        val["label"] = label.as_str().into();
        val["opts"] = Value::Object(opts.clone());
        muopts.push(val);
    }
    options.insert("DATA".to_owned(), names(&data).into());
    options.insert("BASE".to_owned(), base.to_json());
    options.insert("MUOPTS".to_owned(), muopts.into());
    draft.options = options;

    // one fit output subdir per data version:
    let num_versions: usize = data
        .iter()
        .map(|m| m.output.get_strs("fitres_dirs").len().max(1))
        .sum();
    let subdirs: Vec<String> = if num_versions <= 1 {
        vec!["OUTPUT_BBCFIT".to_owned()]
    } else {
        (1..=num_versions)
            .map(|i| format!("OUTPUT_BBCFIT-{i:04}"))
            .collect()
    };
    let fit_output_dir = dir.join("output");
    let m0dif_dirs: Vec<_> = subdirs
        .iter()
        .map(|s| path_value(fit_output_dir.join(s)))
        .collect();

    let prob_column_name = base
        .classifier
        .and_then(|c| c.output.get("prob_column_name").cloned())
        .unwrap_or_default();
    let blind = data.iter().any(|m| m.output.get_bool("blind").unwrap_or(false));
    let is_data = data.iter().any(|m| m.output.get_bool("is_data").unwrap_or(false));
    let muopt_labels: Vec<&str> = overlays.iter().map(|(l, _, _)| l.as_str()).collect();

    draft
        .output
        .set("prob_column_name", prob_column_name)
        .set("subdirs", subdirs)
        .set("m0dif_dirs", m0dif_dirs)
        .set("fit_output_dir", path_value(fit_output_dir))
        .set("w_summary", path_value(dir.join("w_summary.csv")))
        .set("muopts", muopt_labels)
        .set("is_data", is_data)
        .set("blind", blind);
    Ok(vec![draft])
}

/// Resolve the classifier and sim references of `block`,
/// falling back to `inherit` for anything it does not set.
fn resolve_refs<'g>(cx: &mut BlockCx<'g>, block: &StageBlock, inherit: &Refs<'g>) -> Refs<'g> {
    let classifier = match cx.check(block.get_str("CLASSIFIER")) {
        Some(Some(reference)) => {
            let resolver = Resolver::new(
                "CLASSIFICATION",
                cx.upstream(&[StageKind::Classify]),
                Attr::Label,
            )
            .with_fallback(Attr::Output("prob_column_name"));
            cx.resolve(&resolver, &reference)
        }
        _ => inherit.classifier,
    };

    let mut sims_for = |field: &str, inherited: &[&'g TaskNode]| -> Vec<&'g TaskNode> {
        if block.has(field) {
            let refs = cx.check(block.get_strs(field)).unwrap_or_default();
            resolve_merges(cx, field, &refs, classifier)
        } else {
            inherited.to_vec()
        }
    };
    let sim_biascor = sims_for("SIMFILE_BIASCOR", &inherit.sim_biascor);
    let sim_ccprior = sims_for("SIMFILE_CCPRIOR", &inherit.sim_ccprior);

    Refs {
        classifier,
        sim_biascor,
        sim_ccprior,
    }
}

/// Resolve light-curve fit names to merges by `lcfit_name`. Merges that include
/// `classifier` are preferred; when none do, any matching merge is used with a warning.
fn resolve_merges<'g>(
    cx: &mut BlockCx<'g>,
    field: &str,
    refs: &[String],
    classifier: Option<&TaskNode>,
) -> Vec<&'g TaskNode> {
    let merges = cx.upstream(&[StageKind::Merge]);
    let what = format!("MERGE (from {field})");
    let mut out = Vec::with_capacity(refs.len());

    for reference in refs {
        let mut candidates = merges.clone();
        if let Some(clas) = classifier {
            let with_clas: Vec<&TaskNode> = merges
                .iter()
                .copied()
                .filter(|m| m.output.get_str("lcfit_name") == Some(reference.as_str()))
                .filter(|m| {
                    m.output
                        .get_strs("classifier_names")
                        .contains(&clas.label.as_str())
                })
                .collect();
            if with_clas.is_empty() {
                log::warn!(
                    "{}.{}: no merge of {reference} includes classifier {}",
                    cx.kind(),
                    cx.label(),
                    clas.label,
                );
            } else {
                candidates = with_clas;
            }
        }
        let resolver = Resolver::new(what.clone(), candidates, Attr::Output("lcfit_name"));
        out.extend(cx.resolve(&resolver, reference));
    }
    out
}

fn fill_slots(draft: &mut Draft, refs: &Refs) {
    if let Some(clas) = refs.classifier {
        draft.slots.push(Role::Classifier, clas.id);
    }
    for sim in &refs.sim_biascor {
        draft.slots.push(Role::SimBiasCor, sim.id);
    }
    for sim in &refs.sim_ccprior {
        draft.slots.push(Role::SimCcPrior, sim.id);
    }
}

fn names(nodes: &[&TaskNode]) -> Vec<String> {
    nodes.iter().map(|n| n.name.clone()).collect()
}
