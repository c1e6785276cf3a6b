//! VCS read capability over libgit2
//!
//! [`RepoReader`] is the narrow boundary the engine consumes: open a
//! repository, walk commit ids from head in topological + chronological
//! order, load commit metadata, diff a commit against its first parent,
//! blame a path at a revision, read blobs, and visit trees through the
//! [`TreeVisit`] capability interface. Nothing else of libgit2 leaks out.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use git2::{BlameOptions, ObjectType, Oid, Repository, Sort, TreeWalkMode, TreeWalkResult};
use std::path::Path;
use tracing::debug;

/// Commit author signature at the reader boundary.
#[derive(Debug, Clone)]
pub struct AuthorSig {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Author timestamp, seconds since epoch.
    pub when_secs: i64,
}

/// Delta status, reduced to what the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Added,
    Deleted,
    Modified,
    Other,
}

impl From<git2::Delta> for DeltaKind {
    fn from(status: git2::Delta) -> Self {
        match status {
            git2::Delta::Added => DeltaKind::Added,
            git2::Delta::Deleted => DeltaKind::Deleted,
            // A rename is content carried forward under a new path; the
            // engine treats it as a modification of the new-side file.
            git2::Delta::Modified | git2::Delta::Renamed => DeltaKind::Modified,
            _ => DeltaKind::Other,
        }
    }
}

/// One delta record from a tree-to-tree diff.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub status: DeltaKind,
    pub old_path: Option<String>,
    /// New-side path; falls back to the old path for deletions.
    pub new_path: String,
}

/// One blame hunk: a contiguous line range attributed to the commit that
/// last modified it.
#[derive(Debug, Clone)]
pub struct BlameSpan {
    pub lines: usize,
    pub commit_id: Oid,
    /// Hunk final signature email, when libgit2 provides one.
    pub author_email: Option<String>,
}

/// Tree entry passed to a [`RepoReader::walk_tree`] visitor.
#[derive(Debug, Clone)]
pub struct TreeEntryInfo {
    /// Full path of the entry within the tree.
    pub path: String,
    pub id: Oid,
    pub is_blob: bool,
}

/// Visitor verdict for a tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeVisit {
    Continue,
    Stop,
    SkipSubtree,
}

/// Read-only repository access for the mining engine.
pub struct RepoReader {
    repo: Repository,
}

impl RepoReader {
    /// Open a git repository at `path` (or any subdirectory).
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to open git repository at {:?}", path))?;
        debug!("Opened git repository at {:?}", repo.path());
        Ok(Self { repo })
    }

    /// Get the repository root path.
    pub fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .context("Repository has no working directory (bare repo?)")
    }

    /// All commit ids reachable from head, topological + chronological
    /// order, newest first. Ties fall back to libgit2's native ordering.
    pub fn head_commits(&self) -> Result<Vec<Oid>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push_head()?;

        let mut oids = Vec::new();
        for oid_result in revwalk {
            oids.push(oid_result?);
        }
        Ok(oids)
    }

    /// Author signature of a commit.
    pub fn commit_author(&self, oid: Oid) -> Result<AuthorSig> {
        let commit = self.repo.find_commit(oid)?;
        let author = commit.author();
        Ok(AuthorSig {
            name: author.name().map(str::to_string),
            email: author.email().map(str::to_string),
            when_secs: author.when().seconds(),
        })
    }

    /// First parent of a commit, if any. Later parents of merge commits
    /// are never considered.
    pub fn first_parent(&self, oid: Oid) -> Result<Option<Oid>> {
        let commit = self.repo.find_commit(oid)?;
        Ok(commit.parent_ids().next())
    }

    /// Diff a commit's tree against its first parent's tree.
    ///
    /// Returns `None` for parentless (root) commits; the delta list may
    /// be empty for commits that changed nothing tree-wise.
    pub fn diff_against_parent(&self, oid: Oid) -> Result<Option<Vec<DiffEntry>>> {
        let commit = self.repo.find_commit(oid)?;
        let parent = match commit.parent(0) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };

        let tree = commit.tree()?;
        let parent_tree = parent.tree()?;
        let mut diff = self
            .repo
            .diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)?;
        // Pair renames up instead of reporting delete + add, so the
        // new-side path carries the delta.
        diff.find_similar(None)?;

        let mut entries = Vec::with_capacity(diff.deltas().len());
        for delta in diff.deltas() {
            let old_path = delta
                .old_file()
                .path()
                .map(|p| p.to_string_lossy().to_string());
            let new_path = delta
                .new_file()
                .path()
                .map(|p| p.to_string_lossy().to_string())
                .or_else(|| old_path.clone());
            let Some(new_path) = new_path else {
                continue;
            };
            entries.push(DiffEntry {
                status: delta.status().into(),
                old_path,
                new_path,
            });
        }
        Ok(Some(entries))
    }

    /// Line-blame for `path` with `newest` as the newest considered
    /// revision, yielding one span per hunk.
    pub fn blame_at(&self, path: &str, newest: Oid) -> Result<Vec<BlameSpan>> {
        let mut opts = BlameOptions::new();
        opts.newest_commit(newest);

        let blame = self
            .repo
            .blame_file(Path::new(path), Some(&mut opts))
            .with_context(|| format!("Failed to blame {} at {}", path, newest))?;

        let mut spans = Vec::with_capacity(blame.len());
        for hunk in blame.iter() {
            spans.push(BlameSpan {
                lines: hunk.lines_in_hunk(),
                commit_id: hunk.final_commit_id(),
                author_email: hunk.final_signature().email().map(str::to_string),
            });
        }
        Ok(spans)
    }

    /// Walk a commit's tree pre-order, driving the visitor with each
    /// entry. The visitor steers the walk through [`TreeVisit`].
    pub fn walk_tree<F>(&self, commit: Oid, mut visit: F) -> Result<()>
    where
        F: FnMut(&TreeEntryInfo) -> TreeVisit,
    {
        let commit = self.repo.find_commit(commit)?;
        let tree = commit.tree()?;

        let result = tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            let mut path = String::with_capacity(dir.len() + 16);
            path.push_str(dir);
            path.push_str(entry.name().unwrap_or(""));
            let info = TreeEntryInfo {
                path,
                id: entry.id(),
                is_blob: entry.kind() == Some(ObjectType::Blob),
            };
            match visit(&info) {
                TreeVisit::Continue => TreeWalkResult::Ok,
                TreeVisit::Stop => TreeWalkResult::Abort,
                TreeVisit::SkipSubtree => TreeWalkResult::Skip,
            }
        });

        match result {
            Ok(()) => Ok(()),
            // Visitor-requested stop surfaces as GIT_EUSER.
            Err(e) if e.code() == git2::ErrorCode::User => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Raw bytes of a blob.
    pub fn read_blob(&self, id: Oid) -> Result<Vec<u8>> {
        let blob = self.repo.find_blob(id)?;
        Ok(blob.content().to_vec())
    }

    /// Locate the blob for an exact path in a commit's tree, pruning
    /// subtrees that cannot contain it.
    pub fn blob_for_path(&self, commit: Oid, path: &str) -> Result<Option<Vec<u8>>> {
        let mut found: Option<Oid> = None;
        self.walk_tree(commit, |entry| {
            if entry.is_blob {
                if entry.path == path {
                    found = Some(entry.id);
                    return TreeVisit::Stop;
                }
                TreeVisit::Continue
            } else if path.starts_with(&format!("{}/", entry.path)) {
                TreeVisit::Continue
            } else {
                TreeVisit::SkipSubtree
            }
        })?;

        match found {
            Some(id) => Ok(Some(self.read_blob(id)?)),
            None => Ok(None),
        }
    }
}

/// Format a git timestamp as ISO 8601.
pub fn format_git_time(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => "1970-01-01T00:00:00Z".to_string(),
    }
}
