use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};
use workflow::{Output, Slots, StageKind, TaskId};

/// Fully-resolved configuration of one task.
/// This is what gets written to the task's input file and hashed,
/// so it must only contain values that affect what the task produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedConfig {
    /// the block's own options, plus values the builder derived from them
    pub options: Map<String, Value>,
    /// outputs of every dependency, keyed by role, then by dependency name
    pub inputs: Map<String, Value>,
}

/// One concrete task in the graph.
/// Nodes are immutable once built; runtime state lives elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub id: TaskId,
    pub kind: StageKind,
    /// label of the config block this task was built from
    pub label: String,
    /// unique within `kind`
    pub name: String,
    /// unique among all live jobs on the batch system.
    /// Sub-jobs a task's job submits itself are named `{job_name}.{n}`.
    pub job_name: String,
    /// exclusively owned by this task
    pub output_dir: PathBuf,
    /// which upstream task fills which role
    pub slots: Slots,
    /// unique ids from `slots`, in declaration order
    pub deps: Vec<TaskId>,
    pub config: ResolvedConfig,
    /// values published for downstream tasks
    pub output: Output,
    /// number of batch jobs this task occupies while running
    pub num_jobs: usize,
}

impl TaskNode {
    /// Short description for logs and reports, e.g. `LCFIT/D_FIT_SIM_A`.
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// True if `job` is this task's job, or one of its numbered sub-jobs.
    /// Task names never contain [`SUB_JOB_SEPARATOR`], so no other task's job
    /// can look like one of ours.
    pub fn owns_job(&self, job: &str) -> bool {
        match job.strip_prefix(self.job_name.as_str()) {
            Some("") => true,
            Some(rest) => rest
                .strip_prefix(SUB_JOB_SEPARATOR)
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
            None => false,
        }
    }
}

/// Joins a job name to a sub-job number.
pub const SUB_JOB_SEPARATOR: char = '.';

#[cfg(test)]
pub(crate) fn test_node(id: usize, kind: StageKind, label: &str, name: &str) -> TaskNode {
    TaskNode {
        id: TaskId::from(id),
        kind,
        label: label.to_owned(),
        name: name.to_owned(),
        job_name: format!("BF_TEST_{kind}_{name}"),
        output_dir: PathBuf::from("/tmp").join(kind.dir_name()).join(name),
        slots: Slots::default(),
        deps: Vec::new(),
        config: ResolvedConfig::default(),
        output: Output::default(),
        num_jobs: 1,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_owns_job() {
        let sim = test_node(0, StageKind::Sim, "SIM", "SIM");
        let job = sim.job_name.clone();
        assert!(sim.owns_job(&job));
        assert!(sim.owns_job(&format!("{job}.1")));
        assert!(sim.owns_job(&format!("{job}.12")));

        // a sibling whose name extends ours:
        let sim_b = test_node(1, StageKind::Sim, "SIM_B", "SIM_B");
        assert!(!sim.owns_job(&sim_b.job_name));
        assert!(!sim.owns_job(&format!("{}.1", sim_b.job_name)));

        assert!(!sim.owns_job(&format!("{job}_1")));
        assert!(!sim.owns_job(&format!("{job}.")));
        assert!(!sim.owns_job(&format!("{job}.v2_SIM_X")));
        assert!(!sim.owns_job("BF_TEST"));
    }
}
