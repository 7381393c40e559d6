use std::process::Command;

use anyhow::{Context, Result};

use super::Error;

/// Run a batch system command to completion and return its stdout.
/// A nonzero exit status is an error carrying the command's stderr.
pub fn run_cmd(cmd: &mut Command) -> Result<String> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    log::trace!("running {:?} {:?}", program, cmd.get_args());

    let output = cmd
        .output()
        .with_context(|| format!("failed to execute {program}"))?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        }
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_run_cmd() -> Result<()> {
        let out = run_cmd(Command::new("sh").args(["-c", "echo hi; echo ignored >&2"]))?;
        assert_eq!(out, "hi\n");

        let err = run_cmd(Command::new("sh").args(["-c", "echo bad news >&2; exit 3"]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad news"), "{msg}");
        Ok(())
    }
}
