use std::time::Duration;

use anyhow::{Context, Result};

use util::{HashMap, Timer};
use workflow::{StageKind, TaskId};

use crate::task::{RunEnv, Task, TaskState};

use super::BatchExecutor;

/// Which tasks regenerate regardless of their stored hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Refresh {
    /// every task
    pub all: bool,
    /// tasks of this kind and every later kind
    pub from: Option<StageKind>,
}

impl Refresh {
    pub fn applies_to(self, kind: StageKind) -> bool {
        self.all || self.from.is_some_and(|from| kind >= from)
    }
}

/// Final state of every task after a run.
#[derive(Debug, Default)]
pub struct Report {
    pub entries: Vec<(String, StageKind, TaskState)>,
}

impl Report {
    fn new(tasks: &[Task]) -> Self {
        Self {
            entries: tasks
                .iter()
                .map(|t| (t.node.name.clone(), t.node.kind, t.state()))
                .collect(),
        }
    }

    /// Number of tasks that finished with failure.
    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, _, state)| *state == TaskState::FinishedFailure)
            .count()
    }

    pub fn state_of(&self, name: &str) -> Option<TaskState> {
        self.entries
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, state)| *state)
    }
}

/// Drives every task to a terminal state, keeping the number of outstanding
/// batch jobs under `max_jobs`.
///
/// Single-threaded: each cycle polls the batch system once, advances every
/// active task, then submits ready tasks in declaration order. Completion
/// checks always come before submissions, so a task that just finished can
/// unblock its dependents in the same cycle.
///
/// Task failures end up in the report. Errors talking to the batch system or
/// the filesystem abort the run.
pub struct Scheduler<'a> {
    executor: &'a mut dyn BatchExecutor,
    env: RunEnv<'a>,
    max_jobs: usize,
    poll_interval: Duration,
    refresh: Refresh,
    timer: Timer,
}

impl<'a> Scheduler<'a> {
    pub fn new(executor: &'a mut dyn BatchExecutor, env: RunEnv<'a>, refresh: Refresh) -> Self {
        let batch = &env.global.batch;
        Self {
            executor,
            env,
            max_jobs: batch.max_jobs.max(1),
            poll_interval: Duration::from_secs(batch.poll_interval_secs),
            refresh,
            timer: Timer::now(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Cycle until every task is terminal.
    pub fn run(&mut self, tasks: &mut [Task]) -> Result<Report> {
        self.timer.reset();
        let mut cycles = 0usize;
        loop {
            self.cycle(tasks)?;
            cycles += 1;
            if tasks.iter().all(|t| t.state().is_terminal()) {
                break;
            }
            std::thread::sleep(self.poll_interval);
        }
        log::info!("all tasks finished after {cycles} poll cycles");
        log::info!("pipeline execution took {:?}", self.timer.elapsed());
        Ok(Report::new(tasks))
    }

    /// One poll cycle: check completion of every active task,
    /// then submit ready tasks while there is room.
    pub fn cycle(&mut self, tasks: &mut [Task]) -> Result<()> {
        let live = self.executor.live_job_names()?;
        log::debug!("{} jobs live on the batch system", live.len());

        for task in tasks.iter_mut().filter(|t| t.state().is_active()) {
            task.check_completion(self.env, &mut *self.executor, &live)
                .with_context(|| format!("while checking {}", task.node.display_name()))?;
        }

        let mut states: HashMap<TaskId, TaskState> = util::hash_map(tasks.len());
        states.extend(tasks.iter().map(|t| (t.node.id, t.state())));

        let mut outstanding = self.outstanding(tasks);
        while outstanding < self.max_jobs {
            let Some(i) = next_ready(tasks, &states) else {
                break;
            };
            let task = &mut tasks[i];
            let deps_ok = task
                .node
                .deps
                .iter()
                .all(|d| states.get(d).map_or(true, |s| *s == TaskState::FinishedSuccess));
            let force = self.refresh.applies_to(task.node.kind);

            task.run(self.env, &mut *self.executor, force, deps_ok)
                .with_context(|| format!("while starting {}", task.node.display_name()))?;
            if task.state().is_active() {
                outstanding += task.node.num_jobs;
            }
            states.insert(task.node.id, task.state());
        }
        Ok(())
    }

    /// Batch jobs currently held by active tasks.
    fn outstanding(&self, tasks: &[Task]) -> usize {
        tasks
            .iter()
            .filter(|t| t.state().is_active())
            .map(|t| t.node.num_jobs)
            .sum()
    }
}

/// First not-started task, in declaration order, whose dependencies are all terminal.
/// Dependencies outside `tasks` count as satisfied.
fn next_ready(tasks: &[Task], states: &HashMap<TaskId, TaskState>) -> Option<usize> {
    tasks.iter().position(|t| {
        t.state() == TaskState::NotStarted
            && t
                .node
                .deps
                .iter()
                .all(|d| states.get(d).map_or(true, |s| s.is_terminal()))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_refresh() {
        let none = Refresh::default();
        assert!(!none.applies_to(StageKind::Sim));

        let all = Refresh {
            all: true,
            from: None,
        };
        assert!(all.applies_to(StageKind::DataPrep));

        let from = Refresh {
            all: false,
            from: Some(StageKind::BiasCor),
        };
        assert!(!from.applies_to(StageKind::Merge));
        assert!(from.applies_to(StageKind::BiasCor));
        assert!(from.applies_to(StageKind::Analyse));
    }
}
