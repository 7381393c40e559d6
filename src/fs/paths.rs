use std::path::{Path, PathBuf};

/// Files a task keeps in its output dir.
#[derive(Debug, Clone)]
pub struct TaskPaths {
    /// $OUTPUT/pipeline/N_KIND/task_name
    pub dir: PathBuf,
    /// stored effective hash
    pub hash: PathBuf,
    /// resolved configuration, as json
    pub input: PathBuf,
    /// rendered job script
    pub job: PathBuf,
    /// job stdout and stderr
    pub log: PathBuf,
    /// completion marker written by the job
    pub done: PathBuf,
}

impl TaskPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            hash: dir.join("hash.txt"),
            input: dir.join("input.json"),
            job: dir.join("job.sh"),
            log: dir.join("output.log"),
            done: dir.join("done.txt"),
        }
    }
}
