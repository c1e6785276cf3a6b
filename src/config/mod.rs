//! Engine configuration
//!
//! Everything the mining run consumes: worker count, workspace root,
//! project name, commit-count cap, pass switches, and the similarity
//! tool command. Validation happens at construction, before any
//! repository work begins.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration errors, raised before any repository is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("commit count must be at least 1 (got {0})")]
    CommitCountTooSmall(i64),
}

/// Policy for selecting which commits the sampling pass visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StridePolicy {
    /// Sample every commit (stride 1).
    #[default]
    EveryCommit,
    /// Sample every ceil(sqrt(total))-th commit.
    SqrtOfTotal,
}

impl StridePolicy {
    /// Compute the sample stride for a history of `total_commits`.
    /// Always at least 1.
    pub fn stride(&self, total_commits: usize) -> usize {
        match self {
            StridePolicy::EveryCommit => 1,
            StridePolicy::SqrtOfTotal => ((total_commits as f64).sqrt().ceil() as usize).max(1),
        }
    }
}

/// Configuration for one mining run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of commit-processing workers.
    pub workers: usize,
    /// Workspace root; per-commit scratch directories live under
    /// `<workspace>/<project>/competence/<seq>/`.
    pub workspace: PathBuf,
    /// Project name, used for the scratch subtree and the gateway purge.
    pub project: String,
    /// Cap on commits processed by the main walk. `None` means all.
    pub max_commit_count: Option<usize>,
    /// Skip the file-occurrence sampling pass.
    pub skip_sampling: bool,
    /// Skip the competence pass (sampling only).
    pub skip_competence: bool,
    /// Similarity tool command prefix, e.g.
    /// `["java", "-jar", "jplag.jar", "-t", "1", "-vq"]`.
    /// `None` disables similarity scoring entirely.
    pub similarity_tool: Option<Vec<String>>,
    /// Sampling stride policy.
    pub sample_stride: StridePolicy,
    /// Similarity percentage at or above which a file is treated as
    /// copied and excluded from attribution.
    pub similarity_reject_threshold: f64,
}

impl EngineConfig {
    pub fn new(workers: usize, workspace: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            workers: workers.max(1),
            workspace: workspace.into(),
            project: project.into(),
            max_commit_count: None,
            skip_sampling: false,
            skip_competence: false,
            similarity_tool: None,
            sample_stride: StridePolicy::default(),
            similarity_reject_threshold: 100.0,
        }
    }

    /// Cap the main walk at `count` commits. Values below 1 are a fatal
    /// configuration error.
    pub fn with_max_commit_count(mut self, count: i64) -> Result<Self, ConfigError> {
        if count < 1 {
            return Err(ConfigError::CommitCountTooSmall(count));
        }
        self.max_commit_count = Some(count as usize);
        Ok(self)
    }

    pub fn with_similarity_tool(mut self, command: Vec<String>) -> Self {
        self.similarity_tool = Some(command);
        self
    }

    pub fn with_sample_stride(mut self, policy: StridePolicy) -> Self {
        self.sample_stride = policy;
        self
    }

    pub fn skip_sampling(mut self, skip: bool) -> Self {
        self.skip_sampling = skip;
        self
    }

    pub fn skip_competence(mut self, skip: bool) -> Self {
        self.skip_competence = skip;
        self
    }
}
