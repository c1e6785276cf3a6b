//! Per-commit scratch workspace
//!
//! Modified files are materialized in old/new pairs under
//! `<workspace>/<project>/competence/<seq>/` so the external similarity
//! tool can compare them. Directories are keyed by commit sequence
//! number, so concurrent workers never collide. The whole subtree is
//! removed when the scratch handle drops; directories orphaned by a
//! killed process are not swept up.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Scratch directory for one commit's materialized file versions.
pub struct CommitScratch {
    root: PathBuf,
}

impl CommitScratch {
    /// Create `<workspace>/<project>/competence/<seq>/`.
    pub fn create(workspace: &Path, project: &str, seq: usize) -> Result<Self> {
        let root = workspace
            .join(project)
            .join("competence")
            .join(seq.to_string());
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create scratch directory {:?}", root))?;
        Ok(Self { root })
    }

    /// Flatten a repo-relative path into a single file name.
    pub fn flat_name(path: &str) -> String {
        path.replace('/', "_")
    }

    pub fn new_dir(&self) -> PathBuf {
        self.root.join("new")
    }

    pub fn old_dir(&self) -> PathBuf {
        self.root.join("old")
    }

    /// Write the new-version bytes of a modified file.
    pub fn write_new(&self, delta_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        Self::write_into(self.new_dir(), delta_path, bytes)
    }

    /// Write the old-version bytes of a modified file.
    pub fn write_old(&self, delta_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        Self::write_into(self.old_dir(), delta_path, bytes)
    }

    fn write_into(dir: PathBuf, delta_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create scratch subdirectory {:?}", dir))?;
        let target = dir.join(Self::flat_name(delta_path));
        fs::write(&target, bytes)
            .with_context(|| format!("Failed to materialize blob at {:?}", target))?;
        Ok(target)
    }

    /// True when both the old and new side have materialized files.
    pub fn has_pairs(&self) -> bool {
        self.new_dir().is_dir() && self.old_dir().is_dir()
    }

    /// All materialized new-version files.
    pub fn new_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(self.new_dir())
            .into_iter()
            .flatten()
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        files
    }

    /// Find the old-version counterpart of a new-version file name.
    pub fn old_counterpart(&self, file_name: &OsStr) -> Option<PathBuf> {
        let candidate = self.old_dir().join(file_name);
        candidate.is_file().then_some(candidate)
    }
}

impl Drop for CommitScratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flat_name() {
        assert_eq!(CommitScratch::flat_name("src/a/b.py"), "src_a_b.py");
        assert_eq!(CommitScratch::flat_name("top.py"), "top.py");
    }

    #[test]
    fn test_materialize_and_pair() -> Result<()> {
        let ws = tempdir()?;
        let scratch = CommitScratch::create(ws.path(), "proj", 7)?;
        assert!(!scratch.has_pairs());

        let new = scratch.write_new("src/m.py", b"new\n")?;
        scratch.write_old("src/m.py", b"old\n")?;
        assert!(scratch.has_pairs());

        let files = scratch.new_files();
        assert_eq!(files, vec![new.clone()]);
        let old = scratch.old_counterpart(new.file_name().unwrap()).unwrap();
        assert_eq!(fs::read(old)?, b"old\n");
        assert!(scratch.old_counterpart(OsStr::new("other.py")).is_none());
        Ok(())
    }

    #[test]
    fn test_drop_removes_subtree() -> Result<()> {
        let ws = tempdir()?;
        let root = {
            let scratch = CommitScratch::create(ws.path(), "proj", 3)?;
            scratch.write_new("a.py", b"x\n")?;
            scratch.root.clone()
        };
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn test_sequence_keyed_isolation() -> Result<()> {
        let ws = tempdir()?;
        let s1 = CommitScratch::create(ws.path(), "proj", 1)?;
        let s2 = CommitScratch::create(ws.path(), "proj", 2)?;
        s1.write_new("f.py", b"1\n")?;
        s2.write_new("f.py", b"2\n")?;
        assert_ne!(s1.new_files(), s2.new_files());
        Ok(())
    }
}
