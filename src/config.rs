use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use workflow::StageKind;

/// Site-wide settings shared by every pipeline: how to reach the batch system,
/// what command each stage kind runs, and what fatal log lines look like.
/// Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub batch: BatchConfig,
    /// keyed by stage kind, e.g. `LCFIT`
    pub stages: BTreeMap<String, StageConfig>,
    pub fatal_patterns: FatalPatterns,
}

impl GlobalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading global config {path:?}"))?;
        Self::from_yaml(&text).with_context(|| format!("while parsing global config {path:?}"))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // an empty file deserializes to null:
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        for key in config.stages.keys() {
            key.parse::<StageKind>()?;
        }
        Ok(config)
    }

    /// Settings for one stage kind, or the defaults if none were given.
    pub fn stage(&self, kind: StageKind) -> StageConfig {
        self.stages
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(kind.key()))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    #[default]
    Slurm,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub executor: ExecutorKind,
    /// ceiling on jobs outstanding at once
    pub max_jobs: usize,
    pub poll_interval_secs: u64,
    /// extra lines added to the top of every job script
    pub header: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::Slurm,
            max_jobs: 100,
            poll_interval_secs: 30,
            header: Vec::with_capacity(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    /// shell command the job runs; may use the same placeholders as job templates
    pub command: Option<String>,
    pub walltime: String,
    pub mem: String,
    /// custom job script template, replacing the built-in one
    pub template: Option<PathBuf>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            command: None,
            walltime: "01:00:00".to_owned(),
            mem: "2GB".to_owned(),
            template: None,
        }
    }
}

/// How a failed job died, as far as its logs can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fatal,
    QueueLimit,
    TimeLimit,
}

impl FailureKind {
    pub fn describe(self) -> &'static str {
        match self {
            FailureKind::Fatal => "the job reported a fatal error",
            FailureKind::QueueLimit => "the batch system rejected the job (submission limit reached)",
            FailureKind::TimeLimit => "the job was killed for exceeding its walltime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FatalPattern {
    /// literal substring to look for
    pub pattern: String,
    pub kind: FailureKind,
}

/// Known fatal log lines. Defaults cover the common batch-system failures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FatalPatterns(pub Vec<FatalPattern>);

impl Default for FatalPatterns {
    fn default() -> Self {
        let p = |pattern: &str, kind| FatalPattern {
            pattern: pattern.to_owned(),
            kind,
        };
        Self(vec![
            p("FATAL ERROR ABORT", FailureKind::Fatal),
            p("QOSMaxSubmitJobPerUserLimit", FailureKind::QueueLimit),
            p("DUE TO TIME LIMIT", FailureKind::TimeLimit),
        ])
    }
}
