use anyhow::Result;

use super::{path_value, BlockCx, Draft};

/// One task per block. `NUM_VERSIONS` splits the simulation into
/// independently-seeded sub-versions that downstream fits handle separately.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let mut options = cx.block.opts()?;
    let num_versions = cx.block.get_usize("NUM_VERSIONS", 1)?;
    if num_versions == 0 {
        return Err(cx.block.invalid("NUM_VERSIONS", "at least 1").into());
    }
    options.insert("NUM_VERSIONS".to_owned(), num_versions.into());

    let name = cx.label().to_owned();
    let dir = cx.task_dir(&name);
    let versions: Vec<String> = if num_versions == 1 {
        vec![name.clone()]
    } else {
        (1..=num_versions).map(|i| format!("{name}-{i:04}")).collect()
    };
    let photometry_dirs: Vec<_> = versions.iter().map(|v| path_value(dir.join(v))).collect();

    let mut draft = Draft::new(name.clone(), options);
    draft
        .output
        .set("sim_name", name.as_str())
        .set("genversion", name.as_str())
        .set("versions", versions)
        .set("photometry_dirs", photometry_dirs)
        .set("is_data", false)
        .set("blind", false);
    Ok(vec![draft])
}
