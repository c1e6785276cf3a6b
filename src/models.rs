//! Shared record types emitted through the persistence gateway.

use serde::{Deserialize, Serialize};

/// Stable identifier for a tracked file (xxh3 of its repo-relative path).
pub type FileId = u64;

/// Handle to a tracked file, resolved through the file registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub id: FileId,
    /// Repo-relative path, forward slashes.
    pub path: String,
}

/// One file's occurrence count from the sampling pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleRecord {
    pub file_id: FileId,
    pub path: String,
    /// Number of stride-selected commits whose diff touched this file.
    pub occurrences: usize,
}

/// Per-commit, per-author blame attribution for one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributionRecord {
    pub file_id: FileId,
    pub author_email: String,
    /// Lines whose blame-final commit equals the attributed commit.
    pub committed_lines: usize,
    /// All blamed lines of the file at that revision.
    pub total_lines: usize,
    /// Commit author timestamp, RFC 3339.
    pub committed_at: String,
}

/// Final best-observed competence score for one (file, author) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub file_id: FileId,
    pub path: String,
    pub author_email: String,
    pub best_strength: f64,
}

/// Organization assignment for a discovered author email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyRecord {
    pub email: String,
    pub company: String,
}
