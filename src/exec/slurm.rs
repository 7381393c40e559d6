use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

use util::HashSet;

use super::run_cmd::run_cmd;
use super::{job_dir, BatchExecutor, Error};

/// Submits jobs with `sbatch` and polls them with `squeue`.
#[derive(Debug)]
pub struct SlurmExecutor {
    user: String,
}

impl SlurmExecutor {
    /// Use the current user's queue.
    pub fn new() -> Result<Self> {
        let user = std::env::var("USER").map_err(|_| Error::NoUser)?;
        Ok(Self::for_user(user))
    }

    pub fn for_user(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl BatchExecutor for SlurmExecutor {
    fn submit(&mut self, job_name: &str, script: &Path) -> Result<()> {
        let out = run_cmd(
            Command::new("sbatch")
                .current_dir(job_dir(script)?)
                .arg(script),
        )
        .with_context(|| format!("while submitting {job_name} with sbatch"))?;
        log::debug!("sbatch: {}", out.trim());
        Ok(())
    }

    fn live_job_names(&mut self) -> Result<HashSet<String>> {
        let out = run_cmd(Command::new("squeue").args(["-h", "-o", "%j", "-u", &self.user]))
            .context("while polling squeue")?;
        Ok(parse_squeue(&out))
    }

    fn cancel(&mut self, job_name: &str) -> Result<()> {
        run_cmd(Command::new("scancel").args(["--name", job_name, "-u", &self.user]))
            .with_context(|| format!("while cancelling {job_name}"))?;
        log::info!("cancelled {job_name}");
        Ok(())
    }
}

/// One job name per line; blank lines ignored.
fn parse_squeue(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_squeue() {
        let live = parse_squeue("BF_p_SIM_A\n  BF_p_LCFIT_FIT_A  \n\nBF_p_SIM_A\n");
        assert_eq!(live.len(), 2);
        assert!(live.contains("BF_p_SIM_A"));
        assert!(live.contains("BF_p_LCFIT_FIT_A"));
    }
}
