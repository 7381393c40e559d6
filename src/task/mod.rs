use std::fmt;

use anyhow::{Context, Result};
use colored::Colorize;

use graph::TaskNode;
use util::HashSet;

use crate::config::GlobalConfig;
use crate::exec::BatchExecutor;
use crate::fs::{Fs, TaskPaths};
use crate::hash::HashStore;
use crate::stages::{stage_for, Stage};

/// Job script and input file rendering
mod job;
pub use job::{render, JobSpec, JobTemplates};

/// Done file parsing
mod marker;
pub use marker::DoneMarker;

/// Scanning logs for known fatal errors
mod scan;
use scan::scan_logs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    NotStarted,
    Submitted,
    Running,
    FinishedSuccess,
    FinishedFailure,
}

impl TaskState {
    /// True if no further transitions happen in this invocation.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::FinishedSuccess | TaskState::FinishedFailure)
    }

    /// True if the task has a job on the batch system (as far as we know).
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Submitted | TaskState::Running)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TaskState::NotStarted => "NOT_STARTED",
            TaskState::Submitted => "SUBMITTED",
            TaskState::Running => "RUNNING",
            TaskState::FinishedSuccess => "FINISHED_SUCCESS",
            TaskState::FinishedFailure => "FINISHED_FAILURE",
        })
    }
}

/// Everything a task reads from outside itself while running.
#[derive(Clone, Copy)]
pub struct RunEnv<'a> {
    pub fs: &'a Fs,
    pub global: &'a GlobalConfig,
    pub templates: &'a JobTemplates,
}

/// Runtime state of one node of the graph.
///
/// A task only ever writes inside its own output dir, and only reads its
/// dependencies through the outputs they published at build time.
pub struct Task<'g> {
    pub node: &'g TaskNode,
    state: TaskState,
    paths: TaskPaths,
    hash: HashStore,
    stage: &'static dyn Stage,
}

impl<'g> Task<'g> {
    pub fn new(node: &'g TaskNode) -> Self {
        let paths = TaskPaths::new(&node.output_dir);
        Self {
            node,
            state: TaskState::NotStarted,
            hash: HashStore::new(&paths.hash),
            paths,
            stage: stage_for(node.kind),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn paths(&self) -> &TaskPaths {
        &self.paths
    }

    /// Render this task's input file and job script.
    pub fn job(&self, env: RunEnv) -> Result<JobSpec> {
        let stage = env.global.stage(self.node.kind);
        render(
            self.node,
            &self.paths,
            &stage,
            &env.global.batch.header,
            env.templates.get(self.node.kind),
        )
        .with_context(|| format!("while rendering job for {}", self.node.display_name()))
    }

    /// True if the stored hash is missing or differs from `job`'s, or `force` is set.
    pub fn is_stale(&self, env: RunEnv, job: &JobSpec, force: bool) -> Result<bool> {
        if force {
            return Ok(true);
        }
        match self.hash.load(env.fs)? {
            None => Ok(true),
            Some(stored) => Ok(stored != job.hash()),
        }
    }

    /// Set the task up and submit its job if it is stale. Otherwise, pick up where
    /// a previous invocation left off. Returns true if a job was submitted.
    ///
    /// `deps_ok` says whether every dependency finished successfully.
    pub fn run(
        &mut self,
        env: RunEnv,
        executor: &mut dyn BatchExecutor,
        force: bool,
        deps_ok: bool,
    ) -> Result<bool> {
        if !deps_ok && self.stage.needs_successful_deps() {
            log::warn!(
                "{} not run: a dependency failed",
                self.node.display_name()
            );
            self.state = TaskState::FinishedFailure;
            return Ok(false);
        }

        let job = self.job(env)?;
        if self.is_stale(env, &job, force)? {
            self.submit(env, executor, &job)?;
            return Ok(true);
        }

        match DoneMarker::read(env.fs, &self.paths.done)? {
            DoneMarker::Success => {
                log::info!("{} is up to date", self.node.display_name());
                self.finalize(env);
                self.state = TaskState::FinishedSuccess;
                Ok(false)
            }
            DoneMarker::Missing => {
                log::info!(
                    "{} was already submitted; waiting for job {}",
                    self.node.display_name(),
                    self.node.job_name,
                );
                self.state = TaskState::Submitted;
                Ok(false)
            }
            DoneMarker::Failure => {
                log::info!(
                    "{} failed last time; regenerating",
                    self.node.display_name()
                );
                self.submit(env, executor, &job)?;
                Ok(true)
            }
        }
    }

    /// Wipe the output dir, write the job's files, store its hash, and submit it.
    fn submit(&mut self, env: RunEnv, executor: &mut dyn BatchExecutor, job: &JobSpec) -> Result<()> {
        let fs = env.fs;
        fs.recreate_dir(&self.paths.dir)?;
        fs.write_file(&self.paths.input, &job.input)?;
        fs.write_file(&self.paths.job, &job.script)?;
        self.hash.save(fs, &job.hash())?;

        executor
            .submit(&self.node.job_name, &self.paths.job)
            .with_context(|| format!("while submitting {}", self.node.job_name))?;
        eprintln!("{} {}", "SUBMITTED".cyan(), self.node.display_name());
        self.state = TaskState::Submitted;
        Ok(())
    }

    /// Advance a submitted task, given the names of jobs the batch system still knows about.
    ///
    /// A job that has vanished from `live` without leaving a done marker has failed.
    pub fn check_completion(
        &mut self,
        env: RunEnv,
        executor: &mut dyn BatchExecutor,
        live: &HashSet<String>,
    ) -> Result<TaskState> {
        debug_assert!(self.state.is_active());

        match DoneMarker::read(env.fs, &self.paths.done)? {
            DoneMarker::Success => {
                self.finalize(env);
                eprintln!("{} {}", "FINISHED".green(), self.node.display_name());
                self.state = TaskState::FinishedSuccess;
            }
            DoneMarker::Failure => {
                eprintln!(
                    "{} {}: job reported failure",
                    "FAILED".red(),
                    self.node.display_name()
                );
                self.on_failure_detected(env, executor, live)?;
            }
            DoneMarker::Missing if self.is_live(live) => {
                self.state = TaskState::Running;
            }
            DoneMarker::Missing => {
                eprintln!(
                    "{} {}: job {} is gone but left no done marker",
                    "FAILED".red(),
                    self.node.display_name(),
                    self.node.job_name,
                );
                self.on_failure_detected(env, executor, live)?;
            }
        }
        Ok(self.state)
    }

    /// Report what the logs say about the failure, cancel whatever is left
    /// of the job, and forget the stored hash so the next invocation regenerates.
    pub fn on_failure_detected(
        &mut self,
        env: RunEnv,
        executor: &mut dyn BatchExecutor,
        live: &HashSet<String>,
    ) -> Result<()> {
        let logs = self.stage.log_files(self.node, &self.paths, env.fs)?;
        for finding in scan_logs(&logs, &env.global.fatal_patterns)? {
            eprintln!(
                "  {} {} ({:?}, line {}):\n    {}",
                "cause:".red(),
                finding.kind.describe(),
                finding.file,
                finding.line_no,
                finding.line,
            );
        }

        for job in self.own_jobs(live) {
            if let Err(e) = executor.cancel(&job) {
                log::warn!("could not cancel job {job}: {e:?}");
            }
        }

        self.hash.clear(env.fs)?;
        self.state = TaskState::FinishedFailure;
        Ok(())
    }

    fn finalize(&self, env: RunEnv) {
        if let Err(e) = self.stage.finalize(self.node, env.fs) {
            log::warn!(
                "{} succeeded, but regenerating its secondary outputs failed: {e:?}",
                self.node.display_name()
            );
        }
    }

    /// True if the job, or any of its sub-jobs, is still known to the batch system.
    fn is_live(&self, live: &HashSet<String>) -> bool {
        live.iter().any(|j| self.node.owns_job(j))
    }

    /// This task's job, plus any of its sub-jobs still in `live`.
    fn own_jobs(&self, live: &HashSet<String>) -> Vec<String> {
        let mut jobs: Vec<String> = live
            .iter()
            .filter(|j| self.node.owns_job(j) && **j != self.node.job_name)
            .cloned()
            .collect();
        jobs.sort();
        jobs.insert(0, self.node.job_name.clone());
        jobs
    }
}
