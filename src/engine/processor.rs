//! Per-commit processing pipeline
//!
//! One invocation per [`CommitJob`], run on a pool worker. The pipeline
//! is a state machine terminal at the first applicable soft failure:
//! author validation, first-parent resolution, tree diff, scratch
//! materialization, similarity scoring, then per-file blame attribution
//! merged into the shared competence state. Faulty commits contribute
//! nothing and the walk proceeds.

use crate::config::EngineConfig;
use crate::engine::pool::CommitJob;
use crate::engine::scratch::CommitScratch;
use crate::engine::state::CompetenceState;
use crate::git::{format_git_time, DeltaKind, RepoReader};
use crate::models::AttributionRecord;
use crate::persist::PersistenceGateway;
use crate::registry::FileRegistry;
use crate::similarity::{self, SimilarityScorer};
use rustc_hash::FxHashMap;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

/// Worker body shared by the whole pool for one run.
pub struct CommitProcessor<'a> {
    config: &'a EngineConfig,
    registry: &'a dyn FileRegistry,
    scorer: Option<&'a SimilarityScorer>,
    state: &'a CompetenceState,
    gateway: &'a dyn PersistenceGateway,
    total_commits: usize,
}

impl<'a> CommitProcessor<'a> {
    pub fn new(
        config: &'a EngineConfig,
        registry: &'a dyn FileRegistry,
        scorer: Option<&'a SimilarityScorer>,
        state: &'a CompetenceState,
        gateway: &'a dyn PersistenceGateway,
        total_commits: usize,
    ) -> Self {
        Self {
            config,
            registry,
            scorer,
            state,
            gateway,
            total_commits,
        }
    }

    fn fault(&self) {
        self.state
            .counters
            .faulty_commits
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Process one commit. All failures are soft; the job simply stops
    /// contributing at the first one.
    pub fn process(&self, job: &CommitJob) {
        info!(
            "Parsing {}/{} of version control history",
            job.seq, self.total_commits
        );
        debug!("Commit {} under {:?}", job.oid, job.root);

        let reader = match RepoReader::open(&job.repo_path) {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not reopen repository for commit {}: {}", job.oid, e);
                self.fault();
                return;
            }
        };

        // Author validation: a missing signature name, or a first
        // character that is not printable, marks the commit faulty.
        let author = match reader.commit_author(job.oid) {
            Ok(a) => a,
            Err(e) => {
                warn!("Could not load commit {}: {}", job.oid, e);
                self.fault();
                return;
            }
        };
        let author_valid = author
            .name
            .as_ref()
            .and_then(|n| n.chars().next())
            .map(|c| c.is_ascii_graphic())
            .unwrap_or(false);
        if !author_valid {
            info!(
                "{}/{} commit author is invalid",
                job.seq, self.total_commits
            );
            self.fault();
            return;
        }

        // Parent resolution + tree diff. Root commits and empty diffs
        // are faulty; only the first parent is ever considered.
        let deltas = match reader.diff_against_parent(job.oid) {
            Ok(Some(d)) => d,
            Ok(None) => {
                self.fault();
                return;
            }
            Err(e) => {
                warn!("Diff failed for commit {}: {}", job.oid, e);
                self.fault();
                return;
            }
        };
        if deltas.is_empty() {
            self.fault();
            return;
        }

        // Materialize modified files into the per-commit scratch
        // directory; added files are pre-registered as "not flagged".
        let scratch = match CommitScratch::create(
            &self.config.workspace,
            &self.config.project,
            job.seq,
        ) {
            Ok(s) => s,
            Err(e) => {
                warn!("Scratch setup failed for commit {}: {}", job.oid, e);
                self.fault();
                return;
            }
        };

        let mut similarity_scores: FxHashMap<String, f64> = FxHashMap::default();
        let mut has_modified = false;
        for delta in &deltas {
            match delta.status {
                DeltaKind::Modified => {
                    has_modified = true;
                    self.materialize_pair(&reader, job, &scratch, &delta.new_path);
                }
                DeltaKind::Added => {
                    // Pre-register as "not flagged" so the attribution
                    // lookup below finds an entry. Without a tool no
                    // file gets a similarity value at all.
                    if self.scorer.is_some() {
                        similarity_scores.insert(CommitScratch::flat_name(&delta.new_path), 0.0);
                    }
                }
                _ => {}
            }
        }

        // Similarity scoring over the materialized pairs.
        if let Some(scorer) = self.scorer {
            if has_modified && scratch.has_pairs() {
                for new_file in scratch.new_files() {
                    let ext = new_file.extension().and_then(|e| e.to_str()).unwrap_or("");
                    let Some(language) = similarity::language_for(ext) else {
                        debug!(
                            "Similarity tool does not support file type: {:?}",
                            new_file.file_name()
                        );
                        self.state
                            .counters
                            .unsupported_files
                            .fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    let name = new_file.file_name().unwrap_or_default();
                    let Some(old_file) = scratch.old_counterpart(name) else {
                        // Known overbroad scope: one unmatched file
                        // abandons the rest of this commit.
                        warn!(
                            "No old-version counterpart for {:?}; abandoning commit {}",
                            name, job.seq
                        );
                        return;
                    };
                    if let Some(value) = scorer.score_pair(language, &new_file, &old_file) {
                        similarity_scores.insert(name.to_string_lossy().to_string(), value);
                    }
                }
            }
        }
        // Scoring is done with the materialized files.
        drop(scratch);

        // Attribution over every delta.
        let committed_at = format_git_time(author.when_secs);
        let mut flagged = 0usize;
        for delta in &deltas {
            let Some(file) = self.registry.resolve(&delta.new_path) else {
                self.state
                    .counters
                    .unresolved_files
                    .fetch_add(1, Ordering::Relaxed);
                continue;
            };

            let plag = if has_modified
                && matches!(delta.status, DeltaKind::Added | DeltaKind::Modified)
            {
                similarity_scores
                    .get(&CommitScratch::flat_name(&delta.new_path))
                    .copied()
            } else {
                None
            };
            if let Some(value) = plag {
                if value >= self.config.similarity_reject_threshold {
                    info!(
                        "Commit {}/{}: {} flagged at {:.1}%, excluded from attribution",
                        job.seq, self.total_commits, file.path, value
                    );
                    flagged += 1;
                    continue;
                }
            }

            // Blame the file at this revision.
            let spans = match reader.blame_at(&delta.new_path, job.oid) {
                Ok(s) => s,
                Err(e) => {
                    debug!("Blame failed for {} at {}: {}", delta.new_path, job.oid, e);
                    self.state
                        .counters
                        .unresolved_files
                        .fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            let mut total_lines = 0usize;
            let mut per_author: FxHashMap<String, usize> = FxHashMap::default();
            for span in &spans {
                if span.commit_id != job.oid {
                    total_lines += span.lines;
                    continue;
                }
                let email = span
                    .author_email
                    .clone()
                    .or_else(|| {
                        if span.commit_id.is_zero() {
                            None
                        } else {
                            reader
                                .commit_author(span.commit_id)
                                .ok()
                                .and_then(|a| a.email)
                        }
                    })
                    .unwrap_or_default();
                if !per_author.contains_key(&email) {
                    self.state.note_email(&email);
                }
                *per_author.entry(email).or_insert(0) += span.lines;
                total_lines += span.lines;
            }

            for (email, lines) in &per_author {
                let record = AttributionRecord {
                    file_id: file.id,
                    author_email: email.clone(),
                    committed_lines: *lines,
                    total_lines,
                    committed_at: committed_at.clone(),
                };
                if let Err(e) = self.gateway.persist_attribution(&record) {
                    warn!("Failed to persist attribution for {}: {}", file.path, e);
                }
            }

            for (email, lines) in &per_author {
                if *lines == 0 {
                    continue;
                }
                let strength = match plag {
                    None => *lines as f64 / total_lines as f64,
                    // Inherited scale mismatch, kept for output
                    // compatibility: similarity-scored files land on a
                    // 0..100 scale instead of the ownership ratio.
                    Some(value) => 100.0 - value,
                };
                self.state.record_strength(&file, email, strength);
            }
        }

        if flagged == deltas.len() {
            self.state
                .counters
                .fully_flagged_commits
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                "{}/{}: every file of commit {} was fully flagged",
                job.seq, self.total_commits, job.oid
            );
        }
        info!("Finished parsing {}/{}", job.seq, self.total_commits);
    }

    /// Write the old and new blob of a modified file into the scratch
    /// pair directories. The old side is located by the same new path
    /// in the parent tree; a rename therefore produces no counterpart.
    fn materialize_pair(
        &self,
        reader: &RepoReader,
        job: &CommitJob,
        scratch: &CommitScratch,
        path: &str,
    ) {
        match reader.blob_for_path(job.oid, path) {
            Ok(Some(bytes)) => {
                if let Err(e) = scratch.write_new(path, &bytes) {
                    warn!("{}", e);
                }
            }
            Ok(None) => debug!("No blob for {} in commit {}", path, job.oid),
            Err(e) => warn!("Tree walk failed for {}: {}", path, e),
        }

        let parent = match reader.first_parent(job.oid) {
            Ok(Some(p)) => p,
            _ => return,
        };
        match reader.blob_for_path(parent, path) {
            Ok(Some(bytes)) => {
                if let Err(e) = scratch.write_old(path, &bytes) {
                    warn!("{}", e);
                }
            }
            Ok(None) => debug!("No blob for {} in parent of {}", path, job.oid),
            Err(e) => warn!("Tree walk failed for {}: {}", path, e),
        }
    }
}
