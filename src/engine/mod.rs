//! Mining engine orchestration
//!
//! One [`CompetenceEngine::run`] per repository: purge prior output,
//! run the sampling pass, fan the commit history out over the worker
//! pool, wait for the drain barrier, then flush final scores,
//! discovered emails, and company assignments through the gateway.

mod pool;
mod processor;
mod sampler;
mod scratch;
mod state;

pub use pool::CommitJob;
pub use scratch::CommitScratch;
pub use state::{AuthorStanding, CompetenceState, CounterSnapshot, FileEdition, RunCounters};

use crate::company::CompanyResolver;
use crate::config::EngineConfig;
use crate::git::RepoReader;
use crate::models::ScoreRecord;
use crate::persist::PersistenceGateway;
use crate::registry::FileRegistry;
use crate::similarity::SimilarityScorer;
use anyhow::Result;
use processor::CommitProcessor;
use std::path::Path;
use tracing::info;

/// Summary of one finished run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Commits dispatched to the worker pool.
    pub commits_walked: usize,
    /// Files with a nonzero sample occurrence count.
    pub files_sampled: usize,
    /// Files with at least one final score.
    pub files_scored: usize,
    /// Distinct author emails discovered.
    pub authors_discovered: usize,
    pub counters: CounterSnapshot,
}

/// The version-control mining and competence scoring engine.
pub struct CompetenceEngine {
    config: EngineConfig,
}

impl CompetenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full pipeline against one repository.
    pub fn run(
        &self,
        repo_path: &Path,
        registry: &dyn FileRegistry,
        gateway: &dyn PersistenceGateway,
    ) -> Result<RunStats> {
        self.run_with_progress(repo_path, registry, gateway, &|| {})
    }

    /// Like [`run`](Self::run), invoking `tick` once per finished
    /// commit job (drives progress reporting in the CLI).
    pub fn run_with_progress(
        &self,
        repo_path: &Path,
        registry: &dyn FileRegistry,
        gateway: &dyn PersistenceGateway,
        tick: &(dyn Fn() + Sync),
    ) -> Result<RunStats> {
        let reader = RepoReader::open(repo_path)?;
        let root = reader.workdir()?.to_path_buf();

        // Fresh per repository; discarded after the flush below.
        let state = CompetenceState::new();
        let mut stats = RunStats::default();

        // Full recompute: drop prior final scores and discovered emails.
        gateway.purge_project(&self.config.project)?;

        if !self.config.skip_sampling {
            let records = sampler::sample_history(&reader, registry, self.config.sample_stride)?;
            stats.files_sampled = records.len();
            for record in &records {
                gateway.persist_sample(record)?;
            }
        }

        if !self.config.skip_competence {
            let oids = reader.head_commits()?;
            let cap = self.config.max_commit_count.unwrap_or(usize::MAX);
            let jobs: Vec<CommitJob> = oids
                .into_iter()
                .take(cap)
                .enumerate()
                .map(|(index, oid)| CommitJob {
                    repo_path: repo_path.to_path_buf(),
                    root: root.clone(),
                    oid,
                    seq: index + 1,
                })
                .collect();
            stats.commits_walked = jobs.len();
            info!(
                "Walking {} commits of version control history with {} workers",
                jobs.len(),
                self.config.workers
            );

            let scorer = self
                .config
                .similarity_tool
                .as_ref()
                .map(|command| SimilarityScorer::new(command.clone()));
            let processor = CommitProcessor::new(
                &self.config,
                registry,
                scorer.as_ref(),
                &state,
                gateway,
                jobs.len(),
            );
            // run_jobs blocks until every job drained; nothing below
            // starts before all attributions are visible.
            pool::run_jobs(self.config.workers, jobs, |job| {
                processor.process(&job);
                tick();
            });
        }

        // Final flush, in stable order so reruns produce identical
        // output streams.
        let mut scores: Vec<ScoreRecord> = Vec::new();
        for entry in state.editions.iter() {
            for (email, standing) in &entry.editions {
                scores.push(ScoreRecord {
                    file_id: *entry.key(),
                    path: entry.path.clone(),
                    author_email: email.clone(),
                    best_strength: standing.best_strength,
                });
            }
            stats.files_scored += 1;
        }
        scores.sort_by(|a, b| (&a.path, &a.author_email).cmp(&(&b.path, &b.author_email)));
        for score in &scores {
            gateway.persist_final_score(score)?;
        }

        let mut emails: Vec<String> = state
            .discovered_emails
            .iter()
            .map(|e| e.key().clone())
            .collect();
        emails.sort();
        stats.authors_discovered = emails.len();
        gateway.upsert_discovered_emails(&emails)?;

        let resolver = CompanyResolver::default();
        for email in &emails {
            if let Some(company) = resolver.resolve(email) {
                gateway.update_company(email, company)?;
            }
        }

        stats.counters = state.counters.snapshot();
        info!(
            "Run finished: {} commits, {} files scored, {} authors; faulty {}, unsupported {}, flagged {}, unresolved {}",
            stats.commits_walked,
            stats.files_scored,
            stats.authors_discovered,
            stats.counters.faulty_commits,
            stats.counters.unsupported_files,
            stats.counters.fully_flagged_commits,
            stats.counters.unresolved_files
        );
        Ok(stats)
    }
}
