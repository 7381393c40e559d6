use std::path::Path;

use anyhow::Result;

use util::HashSet;

/// Slurm batch system
mod slurm;
pub use slurm::SlurmExecutor;

/// Background processes on this machine
mod local;
pub use local::LocalExecutor;

/// The polling loop
mod scheduler;
pub use scheduler::{Refresh, Report, Scheduler};

/// Run a subprocess
mod run_cmd;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("Job script has no parent directory: {0}")]
    NoJobDir(String),
    #[error("$USER is not set")]
    NoUser,
}

/// The external resource that actually runs jobs.
///
/// Jobs are identified only by name. The scheduler treats every call as fast
/// and synchronous.
pub trait BatchExecutor {
    /// Enqueue the job script at `script` under `job_name`.
    fn submit(&mut self, job_name: &str, script: &Path) -> Result<()>;

    /// Names of all jobs the batch system currently considers queued or running.
    fn live_job_names(&mut self) -> Result<HashSet<String>>;

    /// Ask for `job_name` to be cancelled. Callers treat errors as warnings.
    fn cancel(&mut self, job_name: &str) -> Result<()>;
}

/// Directory a job runs in: the one holding its script.
fn job_dir(script: &Path) -> Result<&Path> {
    script
        .parent()
        .ok_or_else(|| Error::NoJobDir(script.to_string_lossy().into_owned()).into())
}
