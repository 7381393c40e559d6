use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use util::PathEncodingError;

use super::Error;

/// Copy the file at `src` to `tgt`. Symlinks are copied as links to the same target.
pub fn copy(src: &Path, tgt: &Path) -> Result<()> {
    if src.is_symlink() {
        let link_tgt = fs::read_link(src)?;
        symlink(&link_tgt, tgt)?;
    } else if src.is_file() {
        fs::copy(src, tgt)?;
    } else {
        return Err(
            Error::UnknownPathType(src.to_str().ok_or(PathEncodingError)?.to_owned()).into(),
        );
    }
    Ok(())
}

/// Symlink the given `link` to `tgt`; works for unix and windows.
pub fn symlink(tgt: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(tgt, link)?;

    #[cfg(windows)]
    if tgt.is_dir() {
        std::os::windows::fs::symlink_dir(tgt, link)?;
    } else {
        std::os::windows::fs::symlink_file(tgt, link)?;
    }
    Ok(())
}

/// Files directly in `dir` whose names start with `prefix` and end with `suffix`,
/// sorted by name. A missing dir has no files.
pub fn list_files(dir: &Path, prefix: &str, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::with_capacity(0));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_str().ok_or(PathEncodingError)?;
        if name.starts_with(prefix) && name.ends_with(suffix) && !entry.file_type()?.is_dir() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_copy_file() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::write(&src, "text to copy")?;

        let tgt = dir.path().join("tgt");
        copy(&src, &tgt)?;

        assert!(tgt.exists());
        assert_eq!(fs::read_to_string(&tgt)?, "text to copy");
        Ok(())
    }

    #[test]
    fn test_copy_symlink() -> Result<()> {
        let dir = tempdir()?;
        let link = dir.path().join("link");
        symlink(Path::new("/dev/null"), &link)?;

        let tgt = dir.path().join("tgt");
        copy(&link, &tgt)?;
        assert!(tgt.is_symlink());
        assert_eq!(fs::read_link(&tgt)?, Path::new("/dev/null"));
        Ok(())
    }

    #[test]
    fn test_list_files() -> Result<()> {
        let dir = tempdir()?;
        for name in ["wfit_b.COSPAR", "wfit_a.COSPAR", "wfit_c.txt", "other.COSPAR"] {
            fs::write(dir.path().join(name), "")?;
        }
        fs::create_dir(dir.path().join("wfit_dir.COSPAR"))?;

        let files = list_files(dir.path(), "wfit_", ".COSPAR")?;
        let names: Vec<_> = files.iter().filter_map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["wfit_a.COSPAR", "wfit_b.COSPAR"]);

        assert!(list_files(&dir.path().join("missing"), "", "")?.is_empty());
        Ok(())
    }
}
