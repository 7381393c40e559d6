use anyhow::Result;
use serde_json::{Map, Value};
use workflow::{Role, StageKind};

use super::{path_value, BlockCx, Draft};

const DEFAULT_PARAMS: [&str; 2] = ["omegam", "w"];

/// One cosmology fit per matching covariance build.
/// `OPTS.COVOPTS` picks which covariance options to fit; by default all of them.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let options = cx.block.opts()?;
    let wanted: Option<Vec<String>> = match options.get("COVOPTS") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(vec![s.clone()]),
        Some(Value::Array(vals)) => Some(
            vals.iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect::<Option<_>>()
                .ok_or_else(|| cx.block.invalid("OPTS.COVOPTS", "a list of labels"))?,
        ),
        Some(_) => return Err(cx.block.invalid("OPTS.COVOPTS", "a list of labels").into()),
    };
    let params = match options.get("PARAMS") {
        Some(params) => params.clone(),
        None => DEFAULT_PARAMS.to_vec().into(),
    };

    let covs = cx.masked(&[StageKind::CreateCov], &["MASK"]);
    let mut drafts = Vec::with_capacity(covs.len());
    for cov in covs {
        let name = format!("{}_{}", cx.label(), cov.name);
        let dir = cx.task_dir(&name);

        let mut covopts = Map::new();
        if let Some(Value::Object(all)) = cov.output.get("covopts") {
            for (label, index) in all {
                if wanted.as_ref().map_or(true, |w| w.contains(label)) {
                    covopts.insert(label.clone(), index.clone());
                }
            }
        }
        if let Some(wanted) = &wanted {
            for label in wanted.iter().filter(|l| !covopts.contains_key(*l)) {
                log::warn!("{name}: {} has no covopt {label}", cov.name);
            }
        }

        let mut draft = Draft::new(name, options.clone());
        draft.slots.push(Role::CreateCov, cov.id);
        draft
            .output
            .set("label", cx.label())
            .set("covopts", Value::Object(covopts))
            .set("chain_dir", path_value(dir.join("chains")))
            .set("cosmology_params", params.clone())
            .set("blind", cov.output.get_bool("blind").unwrap_or(false));
        drafts.push(draft);
    }
    Ok(drafts)
}
