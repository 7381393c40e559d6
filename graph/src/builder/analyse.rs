use anyhow::Result;
use workflow::{Role, StageKind};

use super::{mask_matches, BlockCx, Draft};
use crate::Error;

/// Each mask field, the kind it selects from, and the role it fills.
/// Unlike other kinds, an absent mask here selects nothing.
const MASKS: [(&str, StageKind, Role); 3] = [
    ("MASK_COSMOFIT", StageKind::CosmoFit, Role::CosmoFit),
    ("MASK_BIASCOR", StageKind::BiasCor, Role::BiasCor),
    ("MASK_LCFIT", StageKind::LcFit, Role::LcFit),
];

/// One analysis task per block, summarising every selected upstream task.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let options = cx.block.opts()?;
    let name = cx.label().to_owned();
    let mut draft = Draft::new(name, options);

    let mut blind = false;
    for (field, kind, role) in MASKS {
        if !cx.block.has(field) {
            continue;
        }
        let mask = cx.block.get_strs(field)?;
        for node in cx
            .upstream(&[kind])
            .into_iter()
            .filter(|n| mask_matches(&mask, &n.name))
        {
            draft.slots.push(role, node.id);
            blind |= node.output.get_bool("blind").unwrap_or(false);
        }
    }

    if draft.slots.is_empty() {
        return Err(Error::NoDependencies {
            kind: cx.kind(),
            label: cx.label().to_owned(),
        }
        .into());
    }
    draft.output.set("blind", blind);
    Ok(vec![draft])
}
