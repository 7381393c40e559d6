use anyhow::Result;
use serde_json::{Map, Value};
use workflow::{Role, StageBlock, StageKind};

use super::{path_value, BlockCx, Draft};

/// Label given to the covariance that includes every systematic.
const ALL_COVOPT: &str = "ALL";

/// One covariance build per matching bias correction and per fit subdir it produces.
pub(crate) fn build(cx: &mut BlockCx) -> Result<Vec<Draft>> {
    let mut options = cx.block.opts()?;
    let covopts = parse_covopts(cx.block)?;
    options.insert("COVOPTS".to_owned(), cx.block.get_strs("COVOPTS")?.into());

    let bcors = cx.masked(&[StageKind::BiasCor], &["MASK"]);
    let mut drafts = Vec::new();
    for bcor in bcors {
        let subdirs = bcor.output.get_strs("subdirs");
        for (index, subdir) in subdirs.iter().enumerate() {
            let name = if subdirs.len() == 1 {
                format!("{}_{}", cx.label(), bcor.name)
            } else {
                format!("{}_{}_{:04}", cx.label(), bcor.name, index + 1)
            };
            let dir = cx.task_dir(&name);
            let mut task_options = options.clone();
            task_options.insert("SUBDIR".to_owned(), (*subdir).into());

            let mut draft = Draft::new(name, task_options);
            draft.slots.push(Role::BiasCor, bcor.id);
            draft
                .output
                .set("bcor_name", bcor.name.as_str())
                .set("index", index)
                .set("ini_dir", path_value(dir.join("ini")))
                .set("covopts", Value::Object(covopts.clone()))
                .set(
                    "blind",
                    bcor.output.get_bool("blind").unwrap_or(false),
                );
            drafts.push(draft);
        }
    }

    if drafts.is_empty() {
        return Err(cx.empty_fan_out(&["MASK"]).into());
    }
    Ok(drafts)
}

/// Map each covariance option label to its index: `ALL` is 0,
/// then `[LABEL] ...` entries count up from 1.
fn parse_covopts(block: &StageBlock) -> Result<Map<String, Value>> {
    let mut covopts = Map::new();
    covopts.insert(ALL_COVOPT.to_owned(), 0.into());
    for (i, entry) in block.get_strs("COVOPTS")?.iter().enumerate() {
        let label = entry
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.split_once(']'))
            .map(|(label, _)| label.trim())
            .filter(|label| !label.is_empty())
            .ok_or_else(|| block.invalid("COVOPTS", "a list of \"[LABEL] options\" entries"))?;
        covopts.insert(label.to_owned(), (i + 1).into());
    }
    Ok(covopts)
}

#[cfg(test)]
mod test {
    use super::*;
    use workflow::PipelineConfig;

    fn block(yaml: &str) -> Result<StageBlock> {
        let config = PipelineConfig::from_yaml(yaml)?;
        Ok(config.blocks(StageKind::CreateCov)[0].clone())
    }

    #[test]
    fn test_parse_covopts() -> Result<()> {
        let b = block("CREATE_COV:\n  COV:\n    COVOPTS: ['[NOSYS] [=DEFAULT,=DEFAULT]', '[SALT2] [+SALT2,=DEFAULT]']\n")?;
        let covopts = parse_covopts(&b)?;
        assert_eq!(covopts["ALL"], Value::from(0));
        assert_eq!(covopts["NOSYS"], Value::from(1));
        assert_eq!(covopts["SALT2"], Value::from(2));
        Ok(())
    }

    #[test]
    fn test_malformed_covopts() -> Result<()> {
        let b = block("CREATE_COV:\n  COV:\n    COVOPTS: 'NOSYS with no brackets'\n")?;
        assert!(parse_covopts(&b).is_err());
        let b = block("CREATE_COV:\n  COV:\n    COVOPTS: '[] empty'\n")?;
        assert!(parse_covopts(&b).is_err());
        Ok(())
    }
}
