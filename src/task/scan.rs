use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{FailureKind, FatalPatterns};

/// A log line matching a known fatal pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: FailureKind,
    pub file: PathBuf,
    /// 1-based
    pub line_no: usize,
    pub line: String,
}

/// Scan `files` line by line for any of `patterns`. Files that don't exist are skipped.
pub fn scan_logs(files: &[PathBuf], patterns: &FatalPatterns) -> Result<Vec<Finding>> {
    let mut findings = Vec::with_capacity(0);
    for file in files {
        if !file.is_file() {
            log::trace!("no log file at {file:?}");
            continue;
        }
        scan_file(file, patterns, &mut findings)
            .with_context(|| format!("while scanning log file {file:?}"))?;
    }
    Ok(findings)
}

fn scan_file(file: &Path, patterns: &FatalPatterns, findings: &mut Vec<Finding>) -> Result<()> {
    let mut reader = BufReader::new(File::open(file)?);
    let mut buf = Vec::with_capacity(256);
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        // logs from scientific codes aren't always valid utf-8:
        let line = String::from_utf8_lossy(&buf);
        for p in &patterns.0 {
            if line.contains(&p.pattern) {
                findings.push(Finding {
                    kind: p.kind,
                    file: file.to_path_buf(),
                    line_no,
                    line: line.trim_end().to_owned(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scan_logs() -> Result<()> {
        let dir = tempdir()?;
        let log = dir.path().join("output.log");
        std::fs::write(
            &log,
            "starting\nslurmstepd: *** JOB 12 CANCELLED DUE TO TIME LIMIT ***\nok\n\
             FATAL ERROR ABORT: bad input\n",
        )?;
        let missing = dir.path().join("missing.log");

        let findings = scan_logs(&[missing, log.clone()], &FatalPatterns::default())?;
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind, FailureKind::TimeLimit);
        assert_eq!(findings[0].line_no, 2);
        assert_eq!(findings[1].kind, FailureKind::Fatal);
        assert_eq!(findings[1].line, "FATAL ERROR ABORT: bad input");
        assert_eq!(findings[1].file, log);
        Ok(())
    }
}
