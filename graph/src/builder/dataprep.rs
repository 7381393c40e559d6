use anyhow::Result;
use serde_json::Value;

use super::{path_value, BlockCx, Draft};

/// One task per block, preparing real data found under `OPTS.RAW_DIR`.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let options = cx.block.opts()?;
    let raw_dir = match options.get("RAW_DIR") {
        Some(Value::String(dir)) => dir.clone(),
        _ => return Err(cx.block.missing("OPTS.RAW_DIR").into()),
    };
    let blind = match options.get("BLIND") {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(cx.block.invalid("OPTS.BLIND", "true or false").into()),
    };

    let name = cx.label().to_owned();
    let dir = cx.task_dir(&name);
    let mut draft = Draft::new(name.clone(), options);
    draft
        .output
        .set("sim_name", name.as_str())
        .set("genversion", name.as_str())
        .set("versions", vec![name.as_str()])
        .set("photometry_dirs", vec![path_value(dir.join(&name))])
        .set("raw_dir", raw_dir)
        .set("is_data", true)
        .set("blind", blind);
    Ok(vec![draft])
}
