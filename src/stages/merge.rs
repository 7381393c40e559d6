use std::path::Path;

use anyhow::{Context, Result};

use graph::TaskNode;

use super::Stage;
use crate::fs::Fs;

/// Files copied from the light-curve fit into the merge output.
const COPIED_FILES: [&str; 2] = ["MERGE.LOG", "FITOPT.README"];
/// Systematic fit results are linked rather than merged; the nominal one is merged.
const SYS_PREFIX: &str = "FITOPT";
const NOMINAL: &str = "FITOPT000";

pub struct Merge;

impl Stage for Merge {
    fn finalize(&self, node: &TaskNode, fs: &Fs) -> Result<()> {
        let (Some(lcfit_dir), Some(merge_dir)) = (
            node.output.get_str("lcfit_output_dir"),
            node.output.get_str("lc_output_dir"),
        ) else {
            return Ok(());
        };
        let (lcfit_dir, merge_dir) = (Path::new(lcfit_dir), Path::new(merge_dir));

        for file in COPIED_FILES {
            let (src, tgt) = (lcfit_dir.join(file), merge_dir.join(file));
            if fs.exists(&src) && !fs.exists(&tgt) {
                log::info!("{}: copying {file} from light-curve fit", node.name);
                fs.create_dir(merge_dir)?;
                fs.copy(&src, &tgt)?;
            }
        }

        for version_dir in node.output.get_strs("fitres_dirs") {
            let version_dir = Path::new(version_dir);
            let Some(version) = version_dir.file_name() else {
                continue;
            };
            let source_dir = lcfit_dir.join(version);
            for src in fs.list_files(&source_dir, SYS_PREFIX, "")? {
                let Some(name) = src.file_name() else {
                    continue;
                };
                if name.to_string_lossy().starts_with(NOMINAL) {
                    continue;
                }
                let link = version_dir.join(name);
                if !fs.exists(&link) {
                    fs.create_dir(version_dir)?;
                    fs.symlink(&src, &link)
                        .with_context(|| format!("while linking systematic fit {name:?}"))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;
    use workflow::{Output, StageKind, TaskId};

    #[test]
    fn test_finalize_copies_and_links() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut fs = Fs::new(dir.path(), false);
        fs.ensure_output_dir_exists(false)?;
        let root = fs.output_prefix().to_path_buf();

        let lcfit_dir = root.join("2_LCFIT/FIT_SIM_A/output");
        let lcfit_version = lcfit_dir.join("SIM_A-0001");
        fs.create_dir(&lcfit_version)?;
        fs.write_file(lcfit_dir.join("MERGE.LOG"), "merged\n")?;
        fs.write_file(lcfit_version.join("FITOPT000.FITRES.gz"), "nominal")?;
        fs.write_file(lcfit_version.join("FITOPT001.FITRES.gz"), "sys 1")?;

        let merge_dir = root.join("5_MERGE/MERGE_FIT_AGG/output");
        let merge_version = merge_dir.join("SIM_A-0001");
        let mut output = Output::default();
        output
            .set("lcfit_output_dir", lcfit_dir.to_string_lossy().into_owned())
            .set("lc_output_dir", merge_dir.to_string_lossy().into_owned())
            .set(
                "fitres_dirs",
                vec![merge_version.to_string_lossy().into_owned()],
            );
        let node = TaskNode {
            id: TaskId::from(0),
            kind: StageKind::Merge,
            label: "MERGE".to_owned(),
            name: "MERGE_FIT_AGG".to_owned(),
            job_name: "BF_test_MERGE_MERGE_FIT_AGG".to_owned(),
            output_dir: PathBuf::new(),
            slots: Default::default(),
            deps: Vec::new(),
            config: Default::default(),
            output,
            num_jobs: 1,
        };

        Merge.finalize(&node, &fs)?;
        assert_eq!(std::fs::read_to_string(merge_dir.join("MERGE.LOG"))?, "merged\n");
        assert!(!fs.exists(merge_dir.join("FITOPT.README")));
        assert!(merge_version.join("FITOPT001.FITRES.gz").is_symlink());
        assert!(!fs.exists(merge_version.join("FITOPT000.FITRES.gz")));

        // already present files are left alone:
        fs.write_file(merge_dir.join("MERGE.LOG"), "edited\n")?;
        Merge.finalize(&node, &fs)?;
        assert_eq!(std::fs::read_to_string(merge_dir.join("MERGE.LOG"))?, "edited\n");
        Ok(())
    }
}
