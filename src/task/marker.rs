use std::path::Path;

use anyhow::Result;

use crate::fs::Fs;

const SUCCESS: &str = "SUCCESS";
const FAILURE: &str = "FAIL";

/// What a job's done file says about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneMarker {
    /// no file, or an empty one: the job hasn't finished
    Missing,
    Success,
    Failure,
}

impl DoneMarker {
    pub fn parse(text: Option<&str>) -> Self {
        let text = match text.map(str::trim) {
            None | Some("") => return DoneMarker::Missing,
            Some(text) => text,
        };
        if text == SUCCESS {
            DoneMarker::Success
        } else if text.contains(FAILURE) {
            DoneMarker::Failure
        } else {
            log::warn!("unrecognized done marker {text:?}; treating it as a failure");
            DoneMarker::Failure
        }
    }

    pub fn read(fs: &Fs, path: &Path) -> Result<Self> {
        Ok(Self::parse(fs.read_if_exists(path)?.as_deref()))
    }
}
