/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Global config file
mod config;
/// Batch systems and the scheduler
mod exec;
/// Filesystem operations
mod fs;
/// Effective hashes and where they are stored
mod hash;
/// Removing stored hashes so tasks regenerate
mod invalidate;
/// Combined command-line and config file run settings
mod settings;
/// Per-kind runtime hooks
mod stages;
/// Runtime task state machine
mod task;
/// Text UI
mod ui;

// exported for tests:
pub use app::{App, Error};
pub use args::Args;
pub use config::{ExecutorKind, FailureKind, GlobalConfig, StageConfig};
pub use exec::{BatchExecutor, LocalExecutor, Refresh, Report, Scheduler, SlurmExecutor};
pub use fs::{Fs, TaskPaths};
pub use hash::effective_hash;
pub use settings::Settings;
pub use task::{JobTemplates, RunEnv, Task, TaskState};

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;

    let log_level = match settings.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logging::log_to_stderr(log_level);

    // RUN THE THING /////////////////
    let app = App::new(settings);
    app.run()?;

    Ok(())
}
