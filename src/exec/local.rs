use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};

use util::{HashMap, HashSet};

use super::{job_dir, BatchExecutor};

/// Log file a local job writes to, beside its script.
const LOG_FILE: &str = "output.log";

/// Runs each job as a background `bash` process on this machine.
#[derive(Debug, Default)]
pub struct LocalExecutor {
    children: HashMap<String, Child>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchExecutor for LocalExecutor {
    fn submit(&mut self, job_name: &str, script: &Path) -> Result<()> {
        let dir = job_dir(script)?;
        let log = File::create(dir.join(LOG_FILE))
            .with_context(|| format!("while creating log file for {job_name}"))?;
        let err_log = log.try_clone()?;

        let child = Command::new("bash")
            .arg(script)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log))
            .spawn()
            .with_context(|| format!("failed to start {job_name}"))?;
        log::debug!("started {job_name} as pid {}", child.id());

        if let Some(mut old) = self.children.insert(job_name.to_owned(), child) {
            // a resubmission replaces whatever was running under this name:
            let _ = old.kill();
            let _ = old.wait();
        }
        Ok(())
    }

    fn live_job_names(&mut self) -> Result<HashSet<String>> {
        let mut live = util::hash_set(self.children.len());
        let mut exited = Vec::new();
        for (name, child) in &mut self.children {
            match child.try_wait()? {
                None => {
                    live.insert(name.clone());
                }
                Some(status) => {
                    log::debug!("{name} exited with {status}");
                    exited.push(name.clone());
                }
            }
        }
        for name in exited {
            self.children.remove(&name);
        }
        Ok(live)
    }

    fn cancel(&mut self, job_name: &str) -> Result<()> {
        if let Some(mut child) = self.children.remove(job_name) {
            child
                .kill()
                .with_context(|| format!("while killing {job_name}"))?;
            child.wait()?;
            log::info!("cancelled {job_name}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_until_gone(exec: &mut LocalExecutor, name: &str) -> Result<bool> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(10) {
            if !exec.live_job_names()?.contains(name) {
                return Ok(true);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        Ok(false)
    }

    #[test]
    fn test_local_run_and_cancel() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let script = dir.path().join("job.sh");
        std::fs::write(&script, "echo hello\necho SUCCESS > done.txt\n")?;

        let mut exec = LocalExecutor::new();
        exec.submit("quick", &script)?;
        assert!(wait_until_gone(&mut exec, "quick")?);
        assert_eq!(std::fs::read_to_string(dir.path().join("done.txt"))?, "SUCCESS\n");
        assert_eq!(std::fs::read_to_string(dir.path().join(LOG_FILE))?, "hello\n");

        let slow = dir.path().join("slow.sh");
        std::fs::write(&slow, "sleep 30\n")?;
        exec.submit("slow", &slow)?;
        assert!(exec.live_job_names()?.contains("slow"));
        exec.cancel("slow")?;
        assert!(!exec.live_job_names()?.contains("slow"));

        // cancelling an unknown job is not an error:
        exec.cancel("nope")?;
        Ok(())
    }
}
