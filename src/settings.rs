use std::path::PathBuf;

use anyhow::{Context, Result};

use workflow::StageKind;

use crate::args::Args;
use crate::config::GlobalConfig;
use crate::exec::Refresh;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Pipeline config file not found: {0}")]
    ConfigNotFound(String),
    #[error("--task (-t) is required with --invalidate (-x)")]
    NoTasksToInvalidate,
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in and the global config is loaded.
#[derive(Debug)]
pub struct Settings {
    pub config: PathBuf,
    pub output: PathBuf,
    pub global: GlobalConfig,
    pub yes: bool,
    pub verbose: u8,
    pub dry_run: bool,

    /// force every task to regenerate
    pub refresh: bool,
    /// force tasks of this kind and later to regenerate
    pub start: Option<StageKind>,
    /// don't build kinds after this one
    pub finish: Option<StageKind>,

    /// with `invalidate`, the tasks to invalidate
    pub tasks: Vec<String>,
    /// invalidate `tasks` instead of running the pipeline
    pub invalidate: bool,
}

impl Settings {
    /// Which tasks regenerate regardless of their stored hash.
    pub fn refresh_policy(&self) -> Refresh {
        Refresh {
            all: self.refresh,
            from: self.start,
        }
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let config = PathBuf::from(&args.config);
        if !config.is_file() {
            return Err(Error::ConfigNotFound(args.config).into());
        }
        let config = config.canonicalize()?;

        let global = match &args.global {
            Some(path) => GlobalConfig::load(path.as_ref())?,
            None => GlobalConfig::default(),
        };

        let start = args
            .start
            .as_deref()
            .map(str::parse::<StageKind>)
            .transpose()
            .context("while reading --start")?;
        let finish = args
            .finish
            .as_deref()
            .map(str::parse::<StageKind>)
            .transpose()
            .context("while reading --finish")?;

        if args.invalidate && args.tasks.is_empty() {
            return Err(Error::NoTasksToInvalidate.into());
        }

        Ok(Self {
            config,
            output: PathBuf::from(&args.output),
            global,
            yes: args.yes,
            verbose: args.verbose,
            dry_run: args.dry_run,

            refresh: args.refresh,
            start,
            finish,

            tasks: args.tasks,
            invalidate: args.invalidate,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(config: &str) -> Args {
        Args {
            config: config.to_owned(),
            global: None,
            output: "output".to_owned(),
            refresh: false,
            start: Some("biascor".to_owned()),
            finish: None,
            tasks: Vec::with_capacity(0),
            invalidate: false,
            yes: false,
            verbose: 0,
            dry_run: false,
        }
    }

    #[test]
    fn test_try_from_args() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = dir.path().join("pipe.yml");
        std::fs::write(&config, "SIM:\n  SIM_A:\n")?;
        let config = config.to_string_lossy().into_owned();

        let settings = Settings::try_from(args(&config))?;
        assert_eq!(settings.start, Some(StageKind::BiasCor));
        assert!(settings.refresh_policy().applies_to(StageKind::CosmoFit));
        assert!(!settings.refresh_policy().applies_to(StageKind::Merge));

        let mut bad_stage = args(&config);
        bad_stage.start = Some("NOPE".to_owned());
        assert!(Settings::try_from(bad_stage).is_err());

        let mut no_tasks = args(&config);
        no_tasks.invalidate = true;
        assert!(Settings::try_from(no_tasks).is_err());

        assert!(Settings::try_from(args("/no/such/pipeline.yml")).is_err());
        Ok(())
    }
}
