use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use graph::TaskNode;

use super::Stage;
use crate::fs::{Fs, TaskPaths};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No wfit_*.COSPAR files found in {0}")]
    NoCospar(String),
    #[error("{0} should have a header line and a value line")]
    BadCospar(String),
    #[error("{file} has columns [{found}], expected [{expected}]")]
    ColumnMismatch {
        file: String,
        found: String,
        expected: String,
    },
}

pub struct BiasCor;

impl Stage for BiasCor {
    fn log_files(&self, node: &TaskNode, paths: &TaskPaths, fs: &Fs) -> Result<Vec<PathBuf>> {
        let mut files = vec![paths.log.clone()];
        for dir in node.output.get_strs("m0dif_dirs") {
            files.extend(fs.list_files(dir, "", ".LOG")?);
        }
        Ok(files)
    }

    fn finalize(&self, node: &TaskNode, fs: &Fs) -> Result<()> {
        let Some(summary) = node.output.get_str("w_summary") else {
            return Ok(());
        };
        if fs.exists(summary) {
            return Ok(());
        }
        log::info!("{}: building {summary}", node.name);
        let text = summarize(node.output.get_strs("m0dif_dirs"), fs)?;
        fs.write_file(summary, &text)
    }
}

/// Collect the cosmology parameters of every `wfit_*.COSPAR` file into one csv,
/// with one row per file.
fn summarize(dirs: Vec<&str>, fs: &Fs) -> Result<String> {
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for dir in &dirs {
        let subdir = Path::new(dir)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for file in fs.list_files(dir, "wfit_", ".COSPAR")? {
            let mut text = String::new();
            fs.read_to_buf(&file, &mut text)
                .with_context(|| format!("while reading {file:?}"))?;
            let (cols, vals) = parse_cospar(&text)
                .ok_or_else(|| Error::BadCospar(file.to_string_lossy().into_owned()))?;

            match &header {
                None => header = Some(cols),
                Some(expected) if *expected != cols => {
                    return Err(Error::ColumnMismatch {
                        file: file.to_string_lossy().into_owned(),
                        found: cols.join(", "),
                        expected: expected.join(", "),
                    }
                    .into())
                }
                Some(_) => (),
            }

            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut row = vec![subdir.clone(), name];
            row.extend(vals);
            rows.push(row.join(","));
        }
    }

    let Some(header) = header else {
        return Err(Error::NoCospar(dirs.join(", ")).into());
    };
    let mut out = format!("subdir,file,{}\n", header.join(","));
    for row in rows {
        out.push_str(&row);
        out.push('\n');
    }
    Ok(out)
}

/// First non-empty line is the (optionally `#`-prefixed) header, second is values.
fn parse_cospar(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let header = lines.next()?.trim_start_matches('#');
    let vals = lines.next()?;
    let split = |l: &str| l.split_whitespace().map(str::to_owned).collect::<Vec<_>>();
    let (cols, vals) = (split(header), split(vals));
    (!cols.is_empty() && cols.len() == vals.len()).then_some((cols, vals))
}

#[cfg(test)]
mod test {
    use super::*;
    use workflow::{Output, StageKind, TaskId};

    use crate::stages::stage_for;

    fn node_with_output(output: Output) -> TaskNode {
        TaskNode {
            id: TaskId::from(0),
            kind: StageKind::BiasCor,
            label: "BCOR".to_owned(),
            name: "BCOR".to_owned(),
            job_name: "BF_test_BIASCOR_BCOR".to_owned(),
            output_dir: PathBuf::new(),
            slots: Default::default(),
            deps: Vec::new(),
            config: Default::default(),
            output,
            num_jobs: 1,
        }
    }

    fn setup() -> Result<(tempfile::TempDir, Fs, TaskNode)> {
        let dir = tempfile::tempdir()?;
        let mut fs = Fs::new(dir.path(), false);
        fs.ensure_output_dir_exists(false)?;
        let task_dir = fs.output_prefix().join("6_BIASCOR/BCOR");
        let m0dif = task_dir.join("output/OUTPUT_BBCFIT");
        fs.create_dir(&m0dif)?;

        let mut output = Output::default();
        output
            .set("m0dif_dirs", vec![m0dif.to_string_lossy().into_owned()])
            .set(
                "w_summary",
                task_dir.join("w_summary.csv").to_string_lossy().into_owned(),
            );
        Ok((dir, fs, node_with_output(output)))
    }

    #[test]
    fn test_build_summary() -> Result<()> {
        let (_dir, fs, node) = setup()?;
        let m0dif = PathBuf::from(node.output.get_strs("m0dif_dirs")[0]);
        fs.write_file(m0dif.join("wfit_a.COSPAR"), "# w wsig OM\n-1.01 0.05 0.31\n")?;
        fs.write_file(m0dif.join("wfit_b.COSPAR"), "# w wsig OM\n-0.98 0.04 0.30\n")?;

        stage_for(StageKind::BiasCor).finalize(&node, &fs)?;
        let summary = fs
            .read_if_exists(node.output.get_str("w_summary").unwrap())?
            .unwrap();
        assert_eq!(
            summary,
            "subdir,file,w,wsig,OM\n\
             OUTPUT_BBCFIT,wfit_a.COSPAR,-1.01,0.05,0.31\n\
             OUTPUT_BBCFIT,wfit_b.COSPAR,-0.98,0.04,0.30\n"
        );
        Ok(())
    }

    #[test]
    fn test_missing_cospar_is_error() -> Result<()> {
        let (_dir, fs, node) = setup()?;
        assert!(stage_for(StageKind::BiasCor).finalize(&node, &fs).is_err());
        Ok(())
    }

    #[test]
    fn test_log_files_include_fit_logs() -> Result<()> {
        let (_dir, fs, node) = setup()?;
        let m0dif = PathBuf::from(node.output.get_strs("m0dif_dirs")[0]);
        fs.write_file(m0dif.join("FITJOBS.LOG"), "")?;
        let paths = TaskPaths::new(&fs.output_prefix().join("6_BIASCOR/BCOR"));
        let files = stage_for(StageKind::BiasCor).log_files(&node, &paths, &fs)?;
        assert_eq!(files, vec![paths.log.clone(), m0dif.join("FITJOBS.LOG")]);
        Ok(())
    }
}
