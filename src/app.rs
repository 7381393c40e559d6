use std::collections::BTreeSet;

use anyhow::{Context, Result};
use colored::Colorize;

use graph::{BuildContext, Graph};
use workflow::{PipelineConfig, StageKind};

use crate::config::ExecutorKind;
use crate::exec::{BatchExecutor, LocalExecutor, Report, Scheduler, SlurmExecutor};
use crate::fs::Fs;
use crate::invalidate::Invalidator;
use crate::settings::Settings;
use crate::task::{DoneMarker, JobTemplates, RunEnv, Task};
use crate::ui::{Planned, Ui};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} task(s) failed")]
    TasksFailed(usize),
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let fs = Fs::new(&settings.output, settings.dry_run);
        let ui = Ui::new(&settings);
        Self { settings, fs, ui }
    }

    /// Run the app, using settings to determine what to do.
    /// Fails if any task finished with failure.
    pub fn run(self) -> Result<()> {
        match self.run_with(None)? {
            Some(report) if report.failed() > 0 => Err(Error::TasksFailed(report.failed()).into()),
            _ => Ok(()),
        }
    }

    /// Like `run`, but submits jobs through `executor` instead of the one named
    /// in the global config. Returns `None` if nothing was executed.
    pub fn run_with(mut self, executor: Option<&mut dyn BatchExecutor>) -> Result<Option<Report>> {
        if self.ui.verbose {
            eprintln!("Using output directory {:?}", self.settings.output);
        }
        self.fs.ensure_output_dir_exists(self.ui.verbose)?;

        let config = self.read_config()?;
        let graph = self.build_graph(&config)?;

        if self.settings.invalidate {
            let invalidator = Invalidator::new(&self.settings, &self.ui, &self.fs);
            let n = invalidator.invalidate(&graph)?;
            log::info!("invalidated {n} task(s)");
            return Ok(None);
        }

        if graph.is_empty() {
            eprintln!("{}", "No tasks in pipeline; exiting.".green());
            return Ok(None);
        }

        let templates = self.load_templates(&graph)?;
        let env = RunEnv {
            fs: &self.fs,
            global: &self.settings.global,
            templates: &templates,
        };
        let mut tasks: Vec<Task> = graph.nodes().map(Task::new).collect();

        let plan = self.plan(env, &tasks)?;
        self.ui.print_plan(&plan);
        let any_to_run = plan.iter().any(|(_, p)| *p == Planned::Run);
        if self.settings.dry_run {
            return Ok(None);
        }
        if any_to_run && !self.ui.confirm("Proceed?")? {
            return Ok(None);
        }

        let mut own_executor: Box<dyn BatchExecutor>;
        let executor: &mut dyn BatchExecutor = match executor {
            Some(executor) => executor,
            None => {
                own_executor = self.make_executor()?;
                own_executor.as_mut()
            }
        };

        eprintln!("\n{}.\n", "Starting pipeline execution".magenta());
        let report = Scheduler::new(executor, env, self.settings.refresh_policy())
            .run(&mut tasks)
            .context("while running pipeline")?;
        self.ui.print_report(&report);
        Ok(Some(report))
    }

    fn read_config(&self) -> Result<PipelineConfig> {
        let path = &self.settings.config;
        self.ui.verbose_progress_debug("Reading pipeline config", path);
        let mut text = String::with_capacity(0);
        self.fs
            .read_to_buf(path, &mut text)
            .with_context(|| format!("while reading pipeline config {path:?}"))?;
        let config = PipelineConfig::from_yaml(&text)
            .with_context(|| format!("while parsing pipeline config {path:?}"))?;
        self.ui.done();
        Ok(config)
    }

    fn build_graph(&mut self, config: &PipelineConfig) -> Result<Graph> {
        let ctx = BuildContext::new(self.fs.output_prefix(), &self.settings.config)?;

        self.ui.verbose_progress("Building task graph");
        self.ui.start_timer();
        let graph = Graph::build(config, &ctx, self.settings.finish)?;
        self.ui.done();
        self.ui.print_elapsed("Building task graph");

        log::info!(
            "built {} tasks for pipeline {}",
            graph.len(),
            ctx.pipeline_name
        );
        Ok(graph)
    }

    fn load_templates(&self, graph: &Graph) -> Result<JobTemplates> {
        let global = &self.settings.global;
        let templates = JobTemplates::load(global, &self.fs)?;
        let kinds: BTreeSet<StageKind> = graph.nodes().map(|n| n.kind).collect();
        templates.validate(global, kinds)?;
        Ok(templates)
    }

    /// Decide, without changing anything, which tasks a run would regenerate.
    fn plan(&self, env: RunEnv, tasks: &[Task]) -> Result<Vec<(String, Planned)>> {
        let refresh = self.settings.refresh_policy();
        let mut plan = Vec::with_capacity(tasks.len());
        for task in tasks {
            let job = task.job(env)?;
            let stale = task.is_stale(env, &job, refresh.applies_to(task.node.kind))?;
            let failed_before = DoneMarker::read(env.fs, &task.paths().done)? == DoneMarker::Failure;
            let planned = if stale || failed_before {
                Planned::Run
            } else {
                Planned::UpToDate
            };
            plan.push((task.node.display_name(), planned));
        }
        Ok(plan)
    }

    fn make_executor(&self) -> Result<Box<dyn BatchExecutor>> {
        Ok(match self.settings.global.batch.executor {
            ExecutorKind::Slurm => Box::new(SlurmExecutor::new()?),
            ExecutorKind::Local => Box::new(LocalExecutor::new()),
        })
    }
}
