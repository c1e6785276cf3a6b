//! Commit sampling pass
//!
//! Independent of competence scoring: walks the history once to count
//! commits, derives the stride from the configured policy, then
//! re-visits every stride-boundary commit and counts which tracked
//! files its diff touched. Root commits have no usable parent and are
//! skipped.

use crate::config::StridePolicy;
use crate::git::RepoReader;
use crate::models::{FileId, SampleRecord};
use crate::registry::FileRegistry;
use anyhow::Result;
use rustc_hash::FxHashMap;
use tracing::{info, warn};

/// Build the per-file occurrence table for the repository's history.
pub fn sample_history(
    reader: &RepoReader,
    registry: &dyn FileRegistry,
    policy: StridePolicy,
) -> Result<Vec<SampleRecord>> {
    let oids = reader.head_commits()?;
    let stride = policy.stride(oids.len());
    info!(
        "Sampling {} commits in git repository, stride {}",
        oids.len(),
        stride
    );

    let mut counts: FxHashMap<FileId, SampleRecord> = FxHashMap::default();
    for (index, oid) in oids.iter().enumerate() {
        if (index + 1) % stride != 0 {
            continue;
        }
        let deltas = match reader.diff_against_parent(*oid) {
            Ok(Some(deltas)) => deltas,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping commit {} during sampling: {}", oid, e);
                continue;
            }
        };
        for delta in &deltas {
            let Some(file) = registry.resolve(&delta.new_path) else {
                continue;
            };
            counts
                .entry(file.id)
                .and_modify(|r| r.occurrences += 1)
                .or_insert(SampleRecord {
                    file_id: file.id,
                    path: file.path,
                    occurrences: 1,
                });
        }
    }

    let mut records: Vec<SampleRecord> = counts.into_values().collect();
    records.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(records)
}
