use std::path::{Path, PathBuf};
use std::{fs, io};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Utility fns
mod ops;

/// Files owned by each task
mod paths;
pub use paths::TaskPaths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Path is neither file nor symlink: {0}")]
    UnknownPathType(String),
    #[error("Specified output directory \"{0}\" is not a directory")]
    NotDirectory(String),
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
}

/// All file operations in the crate should go through this struct.
///
/// All destructive operations check that the path in question is a child of the
/// single whitelisted prefix (the output dir), otherwise they will not be performed.
/// Note that stage commands can break this rule; it is up to the user
/// to make sure that the commands don't have unintended consequences.
#[derive(Debug)]
pub struct Fs {
    /// The directory we are allowed to modify
    output_prefix: PathBuf,
    /// if true, prevents all destructive operations
    dry_run: bool,
}

impl Fs {
    /// Create a new `Fs` with the given output directory.
    pub fn new(output_prefix: &Path, dry_run: bool) -> Self {
        Self {
            output_prefix: output_prefix.to_path_buf(),
            dry_run,
        }
    }

    /// The output directory; canonical once `ensure_output_dir_exists` has been called.
    pub fn output_prefix(&self) -> &Path {
        &self.output_prefix
    }

    /// Check whether output dir exists, and create it if not.
    pub fn ensure_output_dir_exists(&mut self, verbose: bool) -> Result<()> {
        if !self.output_prefix.exists() {
            if self.dry_run {
                eprintln!(
                    "Dry run. Not creating output directory {:?}",
                    self.output_prefix
                );
                return Ok(());
            }
            eprintln!(
                "Output directory {:?} doesn't exist. Creating.",
                self.output_prefix
            );
            fs::create_dir_all(&self.output_prefix).context("creating output directory")?;
        } else if !self.output_prefix.is_dir() {
            return Err(Error::NotDirectory(
                self.output_prefix
                    .to_str()
                    .ok_or(PathEncodingError)?
                    .to_string(),
            )
            .into());
        } else if verbose {
            eprintln!(
                "Output directory {:?} already exists. Not creating.",
                self.output_prefix
            );
        }

        self.output_prefix = self.output_prefix.canonicalize()?;
        Ok(())
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).with_context(|| format!("creating dir {path:?}"))?;
        Ok(())
    }

    /// Delete a directory if it exists, then create it empty.
    pub fn recreate_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        if path.is_dir() {
            fs::remove_dir_all(path).with_context(|| format!("deleting dir {path:?}"))?;
        }
        fs::create_dir_all(path).with_context(|| format!("creating dir {path:?}"))?;
        Ok(())
    }

    /// Write entire str to a file.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::write(path, text).with_context(|| format!("writing file {path:?}"))?;
        Ok(())
    }

    /// Delete a file.
    pub fn delete_file<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_file(path).with_context(|| format!("deleting file {path:?}"))?;
        Ok(())
    }

    /// Symlink `symlink` to `tgt`.
    pub fn symlink<T: AsRef<Path>, U: AsRef<Path>>(&self, tgt: T, symlink: U) -> Result<()> {
        let (tgt, symlink) = (tgt.as_ref(), symlink.as_ref());
        self.check_whitelist(symlink)?;
        ops::symlink(tgt, symlink)
            .with_context(|| format!("symlinking {:?} to {:?}", symlink, tgt))?;
        Ok(())
    }

    /// Copy file `src` to `tgt`.
    pub fn copy<T: AsRef<Path>, U: AsRef<Path>>(&self, src: T, tgt: U) -> Result<()> {
        let (src, tgt) = (src.as_ref(), tgt.as_ref());
        self.check_whitelist(tgt)?;
        ops::copy(src, tgt).with_context(|| format!("copying {src:?} to {tgt:?}"))?;
        Ok(())
    }

    /// Read entire file into a String.
    pub fn read_to_buf<T: AsRef<Path>>(&self, path: T, strbuf: &mut String) -> Result<()> {
        use std::io::Read;
        let path = path.as_ref();
        strbuf.clear();
        let cap = fs::metadata(path)?.len() as usize;
        if cap > strbuf.len() {
            strbuf.reserve(cap - strbuf.len());
        }
        let mut f = fs::File::open(path)?;
        f.read_to_string(strbuf)?;
        Ok(())
    }

    /// Read a small file that may not exist yet.
    pub fn read_if_exists<T: AsRef<Path>>(&self, path: T) -> Result<Option<String>> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading file {path:?}")),
        }
    }

    /// Files in `dir` named `{prefix}*{suffix}`, sorted by name.
    pub fn list_files<T: AsRef<Path>>(
        &self,
        dir: T,
        prefix: &str,
        suffix: &str,
    ) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        ops::list_files(dir, prefix, suffix).with_context(|| format!("listing files in {dir:?}"))
    }

    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        path.as_ref().starts_with(&self.output_prefix)
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if self.dry_run || !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_whitelist() -> Result<()> {
        let dir = tempdir()?;
        let mut fs = Fs::new(&dir.path().join("out"), false);
        fs.ensure_output_dir_exists(false)?;

        let task_dir = fs.output_prefix().join("pipeline/1_SIM/SIM_A");
        fs.recreate_dir(&task_dir)?;
        fs.write_file(task_dir.join("a.txt"), "a")?;
        assert_eq!(fs.read_if_exists(task_dir.join("a.txt"))?.as_deref(), Some("a"));
        assert_eq!(fs.read_if_exists(task_dir.join("b.txt"))?, None);

        // recreating wipes old contents:
        fs.recreate_dir(&task_dir)?;
        assert!(!fs.exists(task_dir.join("a.txt")));

        assert!(fs.write_file(dir.path().join("outside.txt"), "x").is_err());
        Ok(())
    }

    #[test]
    fn test_dry_run_blocks_writes() -> Result<()> {
        let dir = tempdir()?;
        let mut fs = Fs::new(dir.path(), true);
        fs.ensure_output_dir_exists(false)?;
        assert!(fs.write_file(fs.output_prefix().join("a.txt"), "a").is_err());
        Ok(())
    }
}
