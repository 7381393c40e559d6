use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::fs::Fs;

/// Effective hash of a task: sha256 over its input file, then its job script.
/// Both are pure renderings of the task's resolved configuration, so the hash
/// changes exactly when what the job would do changes.
pub fn effective_hash(input: &str, script: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.update(script.as_bytes());
    hex::encode(hasher.finalize())
}

/// Persists the last effective hash of one task.
/// No stored hash means the task has never been set up successfully.
#[derive(Debug, Clone)]
pub struct HashStore {
    path: PathBuf,
}

impl HashStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self, fs: &Fs) -> Result<Option<String>> {
        Ok(fs
            .read_if_exists(&self.path)?
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty()))
    }

    pub fn save(&self, fs: &Fs, hash: &str) -> Result<()> {
        log::debug!("saving hash {hash} to {:?}", self.path);
        fs.write_file(&self.path, hash)
    }

    /// Remove the stored hash, if any.
    pub fn clear(&self, fs: &Fs) -> Result<()> {
        if fs.exists(&self.path) {
            log::debug!("removing hash file {:?}", self.path);
            fs.delete_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_effective_hash() {
        let a = effective_hash("{\"x\": 1}", "echo hi");
        assert_eq!(a.len(), 64);
        assert_eq!(a, effective_hash("{\"x\": 1}", "echo hi"));
        assert_ne!(a, effective_hash("{\"x\": 2}", "echo hi"));
        assert_ne!(a, effective_hash("{\"x\": 1}", "echo bye"));
    }

    #[test]
    fn test_store() -> Result<()> {
        let dir = tempdir()?;
        let mut fs = Fs::new(dir.path(), false);
        fs.ensure_output_dir_exists(false)?;
        let store = HashStore::new(&fs.output_prefix().join("hash.txt"));

        assert_eq!(store.load(&fs)?, None);
        store.save(&fs, "abc123")?;
        assert_eq!(store.load(&fs)?.as_deref(), Some("abc123"));
        store.clear(&fs)?;
        assert_eq!(store.load(&fs)?, None);
        // clearing twice is fine:
        store.clear(&fs)?;
        Ok(())
    }
}
