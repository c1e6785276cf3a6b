//! Shared aggregation state for one mining run
//!
//! Workers merge per-commit observations into sharded maps; no global
//! mutex. The state is created fresh for every processed repository and
//! discarded after the final flush — never a cross-run singleton.

use crate::models::{FileHandle, FileId};
use dashmap::{DashMap, DashSet};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Best-observed competence of one author for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorStanding {
    /// Monotonically non-decreasing across the run.
    pub best_strength: f64,
    /// Number of times `best_strength` was set (insert counts as one).
    pub update_count: u32,
}

/// In-memory aggregate for one tracked file across the processed history.
#[derive(Debug, Default)]
pub struct FileEdition {
    pub path: String,
    /// At most one entry per author.
    pub editions: FxHashMap<String, AuthorStanding>,
}

/// Soft-failure counters, observability only. Updated from any worker.
#[derive(Debug, Default)]
pub struct RunCounters {
    pub faulty_commits: AtomicUsize,
    pub unsupported_files: AtomicUsize,
    pub fully_flagged_commits: AtomicUsize,
    pub unresolved_files: AtomicUsize,
}

/// Plain snapshot of [`RunCounters`] taken after the drain barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub faulty_commits: usize,
    pub unsupported_files: usize,
    pub fully_flagged_commits: usize,
    pub unresolved_files: usize,
}

impl RunCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            faulty_commits: self.faulty_commits.load(Ordering::Relaxed),
            unsupported_files: self.unsupported_files.load(Ordering::Relaxed),
            fully_flagged_commits: self.fully_flagged_commits.load(Ordering::Relaxed),
            unresolved_files: self.unresolved_files.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide state for one top-level run over one repository.
#[derive(Default)]
pub struct CompetenceState {
    /// file id -> per-author best strengths.
    pub editions: DashMap<FileId, FileEdition>,
    /// Author emails first seen during this run.
    pub discovered_emails: DashSet<String>,
    pub counters: RunCounters,
}

impl CompetenceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed strength. Replaces the author's best only on
    /// strict increase, bumping the update count on replacement.
    pub fn record_strength(&self, file: &FileHandle, email: &str, strength: f64) {
        let mut edition = self.editions.entry(file.id).or_insert_with(|| FileEdition {
            path: file.path.clone(),
            editions: FxHashMap::default(),
        });
        match edition.editions.get_mut(email) {
            Some(standing) => {
                if strength > standing.best_strength {
                    standing.best_strength = strength;
                    standing.update_count += 1;
                }
            }
            None => {
                edition.editions.insert(
                    email.to_string(),
                    AuthorStanding {
                        best_strength: strength,
                        update_count: 1,
                    },
                );
            }
        }
    }

    /// Note an author email; returns true the first time it is seen.
    pub fn note_email(&self, email: &str) -> bool {
        self.discovered_emails.insert(email.to_string())
    }
}
