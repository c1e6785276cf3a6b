//! File-tracking collaborator
//!
//! The engine never decides on its own which files exist; it resolves
//! every delta path through a [`FileRegistry`]. The default
//! implementation sweeps the work tree once with the `ignore` walker and
//! hands out stable ids derived from the repo-relative path.

use crate::models::{FileHandle, FileId};
use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::warn;
use xxhash_rust::xxh3::xxh3_64;

/// Resolves repo-relative paths to tracked file handles.
pub trait FileRegistry: Send + Sync {
    fn resolve(&self, path: &str) -> Option<FileHandle>;
}

/// Stable file id for a repo-relative path.
pub fn file_id_for(path: &str) -> FileId {
    xxh3_64(path.as_bytes())
}

/// Registry backed by a one-time sweep of the repository work tree.
///
/// Respects .gitignore. Unreadable entries are skipped with a warning;
/// the rest of the sweep proceeds.
pub struct WorkdirRegistry {
    files: FxHashMap<String, FileHandle>,
}

impl WorkdirRegistry {
    pub fn sweep(root: &Path) -> Self {
        let mut files = FxHashMap::default();

        for entry in ignore::WalkBuilder::new(root).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry during registry sweep: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let rel = match entry.path().strip_prefix(root) {
                Ok(r) => r.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            files.insert(
                rel.clone(),
                FileHandle {
                    id: file_id_for(&rel),
                    path: rel,
                },
            );
        }

        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileRegistry for WorkdirRegistry {
    fn resolve(&self, path: &str) -> Option<FileHandle> {
        self.files.get(path).cloned()
    }
}
