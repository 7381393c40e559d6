//! Per-kind behaviour around the shared task state machine.

use std::path::PathBuf;

use anyhow::Result;

use graph::TaskNode;
use workflow::StageKind;

use crate::fs::{Fs, TaskPaths};

mod biascor;
mod merge;

pub use biascor::BiasCor;
pub use merge::Merge;

/// Hooks a stage kind can override.
pub trait Stage: Sync {
    /// Logs to scan for fatal patterns once the task has failed.
    fn log_files(&self, _node: &TaskNode, paths: &TaskPaths, _fs: &Fs) -> Result<Vec<PathBuf>> {
        Ok(vec![paths.log.clone()])
    }

    /// Regenerate secondary artifacts that are missing after the job succeeded.
    /// Errors here only degrade the task; it still counts as successful.
    fn finalize(&self, _node: &TaskNode, _fs: &Fs) -> Result<()> {
        Ok(())
    }

    /// If true, a task whose dependencies didn't all succeed fails without submitting.
    fn needs_successful_deps(&self) -> bool {
        true
    }
}

/// Stages with no special behaviour.
pub struct Plain;
impl Stage for Plain {}

/// Analysis runs on whatever upstream results exist, even if some failed.
pub struct Analyse;
impl Stage for Analyse {
    fn needs_successful_deps(&self) -> bool {
        false
    }
}

pub fn stage_for(kind: StageKind) -> &'static dyn Stage {
    match kind {
        StageKind::Merge => &Merge,
        StageKind::BiasCor => &BiasCor,
        StageKind::Analyse => &Analyse,
        _ => &Plain,
    }
}
