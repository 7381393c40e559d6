use std::path::{Path, PathBuf};

use util::PathEncodingError;
use workflow::StageKind;

/// Where a pipeline's tasks live and how their jobs are named.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// file stem of the pipeline config
    pub pipeline_name: String,
    /// `{output root}/{pipeline name}`
    pub pipeline_dir: PathBuf,
    /// prepended to every job name so concurrent pipelines don't collide
    pub prefix: String,
}

impl BuildContext {
    pub fn new(output_root: &Path, config_path: &Path) -> Result<Self, PathEncodingError> {
        let pipeline_name = config_path
            .file_stem()
            .ok_or(PathEncodingError)?
            .to_str()
            .ok_or(PathEncodingError)?
            .to_owned();
        Ok(Self {
            pipeline_dir: output_root.join(&pipeline_name),
            prefix: format!("BF_{pipeline_name}"),
            pipeline_name,
        })
    }

    /// e.g. `output/my_pipeline/2_LCFIT`
    pub fn stage_dir(&self, kind: StageKind) -> PathBuf {
        self.pipeline_dir.join(kind.dir_name())
    }

    pub fn task_dir(&self, kind: StageKind, name: &str) -> PathBuf {
        self.stage_dir(kind).join(name)
    }

    /// e.g. `BF_my_pipeline_LCFIT_D_FIT_SIM_A`
    pub fn job_name(&self, kind: StageKind, name: &str) -> String {
        format!("{}_{}_{}", self.prefix, kind.key(), name)
    }
}
