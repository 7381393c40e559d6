use std::collections::BTreeMap;

use anyhow::{Context, Result};

use graph::TaskNode;
use template::Template;
use workflow::{Errors, StageKind};

use crate::config::{GlobalConfig, StageConfig};
use crate::fs::{Fs, TaskPaths};
use crate::hash::effective_hash;

/// Built-in job script. The job must leave `SUCCESS` or `FAILURE` in its done file;
/// the `#SBATCH` lines are plain comments to anything but slurm.
pub const DEFAULT_TEMPLATE: &str = "#!/bin/bash
#SBATCH --job-name={job_name}
#SBATCH --time={walltime}
#SBATCH --mem={mem}
#SBATCH --output={log_file}
{header}
cd {output_dir}
{command}
if [ $? -eq 0 ]; then
    echo SUCCESS > {done_file}
else
    echo FAILURE > {done_file}
fi
";

/// Placeholders available to job templates. `command` is not available to commands.
pub const TEMPLATE_VARS: [&str; 12] = [
    "name",
    "label",
    "kind",
    "job_name",
    "output_dir",
    "input",
    "log_file",
    "done_file",
    "walltime",
    "mem",
    "header",
    "command",
];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No command configured for {0} tasks (set stages.{0}.command in the global config)")]
    NoCommand(StageKind),
    #[error("Unknown placeholder {{{var}}} in {what}")]
    UnknownVar { var: String, what: String },
}

/// What gets written to a task's dir and handed to the batch system.
/// Rendering is pure, so the hash and the submitted job always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// contents of the input file
    pub input: String,
    /// contents of the job script
    pub script: String,
}

impl JobSpec {
    pub fn hash(&self) -> String {
        effective_hash(&self.input, &self.script)
    }
}

/// Job script template text for each stage kind.
#[derive(Debug)]
pub struct JobTemplates {
    texts: Vec<String>,
}

impl Default for JobTemplates {
    fn default() -> Self {
        Self {
            texts: vec![DEFAULT_TEMPLATE.to_owned(); StageKind::ALL.len()],
        }
    }
}

impl JobTemplates {
    /// Load custom template files named in the global config.
    pub fn load(global: &GlobalConfig, fs: &Fs) -> Result<Self> {
        let mut templates = Self::default();
        for kind in StageKind::ALL {
            if let Some(path) = global.stage(kind).template {
                let text = &mut templates.texts[kind.index()];
                fs.read_to_buf(&path, text)
                    .with_context(|| format!("while reading {kind} job template {path:?}"))?;
            }
        }
        Ok(templates)
    }

    pub fn get(&self, kind: StageKind) -> &str {
        &self.texts[kind.index()]
    }

    /// Check the template and command of every kind in `kinds`,
    /// collecting every problem before failing.
    pub fn validate(
        &self,
        global: &GlobalConfig,
        kinds: impl IntoIterator<Item = StageKind>,
    ) -> Result<()> {
        let mut errors = Errors::default();
        for kind in kinds {
            if let Err(e) = check_vars(self.get(kind), &TEMPLATE_VARS) {
                errors.add_context(e, format!("while checking {kind} job template"));
            }
            match global.stage(kind).command {
                None => errors.add(Error::NoCommand(kind)),
                Some(cmd) => {
                    if let Err(e) = check_vars(&cmd, &TEMPLATE_VARS[..TEMPLATE_VARS.len() - 1]) {
                        errors.add_context(e, format!("while checking {kind} command"));
                    }
                }
            }
        }
        errors.print_recap("checking job templates")?;
        Ok(())
    }
}

fn check_vars(text: &str, allowed: &[&str]) -> Result<()> {
    let template = Template::parse(text)?;
    for var in template.vars() {
        if !allowed.contains(&var) {
            return Err(Error::UnknownVar {
                var: var.to_owned(),
                what: text.lines().next().unwrap_or_default().to_owned(),
            }
            .into());
        }
    }
    Ok(())
}

/// Render the input file and job script for `node`.
pub fn render(
    node: &TaskNode,
    paths: &TaskPaths,
    stage: &StageConfig,
    header: &[String],
    template_text: &str,
) -> Result<JobSpec> {
    let mut input = serde_json::to_string_pretty(&node.config)?;
    input.push('\n');

    let path_str = |p: &std::path::Path| p.to_string_lossy().into_owned();
    let mut vars: BTreeMap<&str, String> = BTreeMap::new();
    vars.insert("name", node.name.clone());
    vars.insert("label", node.label.clone());
    vars.insert("kind", node.kind.key().to_owned());
    vars.insert("job_name", node.job_name.clone());
    vars.insert("output_dir", path_str(&paths.dir));
    vars.insert("input", path_str(&paths.input));
    vars.insert("log_file", path_str(&paths.log));
    vars.insert("done_file", path_str(&paths.done));
    vars.insert("walltime", stage.walltime.clone());
    vars.insert("mem", stage.mem.clone());
    vars.insert("header", header.join("\n"));

    let command = stage
        .command
        .as_deref()
        .ok_or(Error::NoCommand(node.kind))?;
    let command = Template::parse(command)?
        .render(&vars)
        .with_context(|| format!("while rendering {} command", node.kind))?;
    vars.insert("command", command);

    let script = Template::parse(template_text)?
        .render(&vars)
        .with_context(|| format!("while rendering {} job script", node.kind))?;
    Ok(JobSpec { input, script })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;

    use graph::{BuildContext, Graph};
    use workflow::PipelineConfig;

    fn lcfit_node() -> Result<TaskNode> {
        let yaml = "SIM:\n  SIM_A:\nLCFIT:\n  FIT:\n    OPTS: {FITOPTS: [a]}\n";
        let config = PipelineConfig::from_yaml(yaml)?;
        let ctx = BuildContext::new(Path::new("/out"), Path::new("p.yml"))?;
        let graph = Graph::build(&config, &ctx, None)?;
        let node = graph.find(StageKind::LcFit, "FIT_SIM_A").cloned();
        Ok(node.ok_or_else(|| anyhow::anyhow!("missing node"))?)
    }

    fn stage(command: &str) -> StageConfig {
        StageConfig {
            command: Some(command.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_default() -> Result<()> {
        let node = lcfit_node()?;
        let paths = TaskPaths::new(&node.output_dir);
        let job = render(
            &node,
            &paths,
            &stage("snlc_fit.exe {input}"),
            &["#SBATCH --partition=broadwl".to_owned()],
            DEFAULT_TEMPLATE,
        )?;
        assert!(job.script.contains("#SBATCH --job-name=BF_p_LCFIT_FIT_SIM_A\n"));
        assert!(job
            .script
            .contains("snlc_fit.exe /out/p/2_LCFIT/FIT_SIM_A/input.json\n"));
        assert!(job.script.contains("#SBATCH --partition=broadwl\n"));
        assert!(job
            .script
            .contains("echo SUCCESS > /out/p/2_LCFIT/FIT_SIM_A/done.txt"));
        assert!(job.input.contains("\"FITOPTS\""));

        // rendering is pure:
        let again = render(
            &node,
            &paths,
            &stage("snlc_fit.exe {input}"),
            &["#SBATCH --partition=broadwl".to_owned()],
            DEFAULT_TEMPLATE,
        )?;
        assert_eq!(job.hash(), again.hash());
        Ok(())
    }

    #[test]
    fn test_render_escapes_and_unbound() -> Result<()> {
        let node = lcfit_node()?;
        let paths = TaskPaths::new(&node.output_dir);
        let job = render(
            &node,
            &paths,
            &stage("awk '{{print $1}}' {name}.txt"),
            &[],
            "{command}\n",
        )?;
        assert_eq!(job.script, "awk '{print $1}' FIT_SIM_A.txt\n");

        let err = render(&node, &paths, &stage("run {nope}"), &[], "{command}").unwrap_err();
        assert!(format!("{err:?}").contains("nope"), "{err:?}");
        Ok(())
    }

    #[test]
    fn test_validate() -> Result<()> {
        let mut global = GlobalConfig::default();
        let templates = JobTemplates::default();
        assert!(templates.validate(&global, [StageKind::Sim]).is_err());

        global.stages.insert("SIM".to_owned(), stage("sim {input}"));
        templates.validate(&global, [StageKind::Sim])?;

        global.stages.insert("SIM".to_owned(), stage("sim {command}"));
        assert!(templates.validate(&global, [StageKind::Sim]).is_err());
        Ok(())
    }
}
