//! End-to-end tests for the mining engine
//!
//! Each test builds a real git repository with git2 in a temp directory
//! and runs the full pipeline against an in-memory gateway.

use anyhow::Result;
use git2::{Oid, Repository, Signature};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

use tenure::persist::MemoryGateway;
use tenure::{CompetenceEngine, EngineConfig, WorkdirRegistry};

struct FixtureRepo {
    dir: TempDir,
    repo: Repository,
}

impl FixtureRepo {
    fn new() -> Result<Self> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        Ok(Self { dir, repo })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit a set of (path, content) pairs as the given author.
    fn commit(&self, files: &[(&str, &str)], name: &str, email: &str) -> Result<Oid> {
        self.commit_full(files, &[], name, email)
    }

    /// Commit with both additions and removals (covers renames).
    fn commit_full(
        &self,
        files: &[(&str, &str)],
        removals: &[&str],
        name: &str,
        email: &str,
    ) -> Result<Oid> {
        for path in removals {
            fs::remove_file(self.dir.path().join(path))?;
        }
        for (path, content) in files {
            let full = self.dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full, content)?;
        }
        let sig = Signature::now(name, email)?;
        let tree_id = {
            let mut index = self.repo.index()?;
            for path in removals {
                index.remove_path(Path::new(path))?;
            }
            for (path, _) in files {
                index.add_path(Path::new(path))?;
            }
            index.write()?;
            index.write_tree()?
        };
        let tree = self.repo.find_tree(tree_id)?;
        let parents: Vec<git2::Commit> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parent_refs)?;
        Ok(oid)
    }
}

const TEN_LINES: &str = "l1\nl2\nl3\nl4\nl5\nl6\nl7\nl8\nl9\nl10\n";
const TEN_LINES_EDITED: &str = "l1\nl2\nCHANGED\nl4\nl5\nl6\nEDITED\nl8\nl9\nl10\n";

/// C1 (root, excluded) <- C2 (Alice adds 10 lines) <- C3 (Bob edits 2).
fn three_commit_history() -> Result<FixtureRepo> {
    let fixture = FixtureRepo::new()?;
    fixture.commit(&[("README.md", "readme\n")], "Carol", "carol@example.org")?;
    fixture.commit(&[("f.py", TEN_LINES)], "Alice", "alice@ibm.com")?;
    fixture.commit(&[("f.py", TEN_LINES_EDITED)], "Bob", "bob@example.com")?;
    Ok(fixture)
}

fn engine_for(workspace: &Path) -> CompetenceEngine {
    CompetenceEngine::new(EngineConfig::new(2, workspace, "proj"))
}

#[cfg(unix)]
fn write_fake_similarity_tool(dir: &Path, reported: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let tool = dir.join("fake-similarity.sh");
    fs::write(&tool, format!("#!/bin/sh\necho \"result: {}\"\n", reported)).unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    tool
}

#[test]
fn test_end_to_end_best_scores() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let stats = engine_for(workspace.path()).run(fixture.path(), &registry, &gateway)?;

    // Root commit C1 is faulty by design; C2 and C3 contribute.
    assert_eq!(stats.commits_walked, 3);
    assert_eq!(stats.counters.faulty_commits, 1);

    let scores = gateway.scores();
    assert_eq!(scores.len(), 2, "scores: {:?}", scores);
    assert!(scores.iter().all(|s| s.path == "f.py"));

    let alice = scores
        .iter()
        .find(|s| s.author_email == "alice@ibm.com")
        .unwrap();
    let bob = scores
        .iter()
        .find(|s| s.author_email == "bob@example.com")
        .unwrap();
    assert!((alice.best_strength - 1.0).abs() < 1e-9);
    assert!((bob.best_strength - 0.2).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_attributions_respect_line_totals() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    engine_for(workspace.path()).run(fixture.path(), &registry, &gateway)?;

    let attributions = gateway.attributions();
    assert_eq!(attributions.len(), 2, "attributions: {:?}", attributions);
    assert!(attributions
        .iter()
        .all(|a| a.committed_lines <= a.total_lines));

    let alice = attributions
        .iter()
        .find(|a| a.author_email == "alice@ibm.com")
        .unwrap();
    assert_eq!((alice.committed_lines, alice.total_lines), (10, 10));

    let bob = attributions
        .iter()
        .find(|a| a.author_email == "bob@example.com")
        .unwrap();
    assert_eq!((bob.committed_lines, bob.total_lines), (2, 10));
    Ok(())
}

#[test]
fn test_sampling_counts_touching_commits_and_skips_root() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    engine_for(workspace.path()).run(fixture.path(), &registry, &gateway)?;

    let samples = gateway.samples();
    // README.md is only touched by the root commit and never sampled.
    assert_eq!(samples.len(), 1, "samples: {:?}", samples);
    assert_eq!(samples[0].path, "f.py");
    assert_eq!(samples[0].occurrences, 2);
    Ok(())
}

#[test]
fn test_discovered_emails_and_company_assignment() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let stats = engine_for(workspace.path()).run(fixture.path(), &registry, &gateway)?;

    let emails = gateway.emails();
    assert_eq!(stats.authors_discovered, 2);
    assert!(emails.contains(&"alice@ibm.com".to_string()));
    assert!(emails.contains(&"bob@example.com".to_string()));
    // Carol only authored the excluded root commit.
    assert!(!emails.contains(&"carol@example.org".to_string()));

    let companies = gateway.companies();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].email, "alice@ibm.com");
    assert_eq!(companies[0].company, "IBM");
    Ok(())
}

#[test]
fn test_rerun_after_purge_is_deterministic() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());
    let engine = engine_for(workspace.path());

    engine.run(fixture.path(), &registry, &gateway)?;
    let first = gateway.scores();

    // Second run purges prior scores and recomputes from scratch.
    engine.run(fixture.path(), &registry, &gateway)?;
    let second = gateway.scores();

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_commit_count_caps_the_walk() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let config = EngineConfig::new(2, workspace.path(), "proj").with_max_commit_count(1)?;
    let stats = CompetenceEngine::new(config).run(fixture.path(), &registry, &gateway)?;

    // Only the newest commit (Bob's edit) is processed.
    assert_eq!(stats.commits_walked, 1);
    let scores = gateway.scores();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].author_email, "bob@example.com");
    Ok(())
}

#[test]
fn test_pass_switches() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let registry = WorkdirRegistry::sweep(fixture.path());

    let gateway = MemoryGateway::new();
    let config = EngineConfig::new(2, workspace.path(), "proj").skip_competence(true);
    CompetenceEngine::new(config).run(fixture.path(), &registry, &gateway)?;
    assert!(gateway.scores().is_empty());
    assert!(!gateway.samples().is_empty());

    let gateway = MemoryGateway::new();
    let config = EngineConfig::new(2, workspace.path(), "proj").skip_sampling(true);
    CompetenceEngine::new(config).run(fixture.path(), &registry, &gateway)?;
    assert!(gateway.samples().is_empty());
    assert!(!gateway.scores().is_empty());
    Ok(())
}

#[test]
fn test_root_only_repository_scores_nothing() -> Result<()> {
    let fixture = FixtureRepo::new()?;
    fixture.commit(&[("only.py", "x = 1\n")], "Solo", "solo@example.org")?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let stats = engine_for(workspace.path()).run(fixture.path(), &registry, &gateway)?;

    assert_eq!(stats.commits_walked, 1);
    assert_eq!(stats.counters.faulty_commits, 1);
    assert!(gateway.scores().is_empty());
    assert!(gateway.samples().is_empty());
    assert!(gateway.attributions().is_empty());
    Ok(())
}

#[test]
fn test_added_files_use_ownership_ratio_without_similarity_tool() -> Result<()> {
    let fixture = FixtureRepo::new()?;
    fixture.commit(&[("README.md", "readme\n")], "Carol", "carol@example.org")?;
    fixture.commit(&[("f.py", TEN_LINES)], "Alice", "alice@ibm.com")?;
    // Mixed commit: modifies f.py and adds g.py, no tool configured.
    fixture.commit(
        &[("f.py", TEN_LINES_EDITED), ("g.py", "a\nb\nc\nd\n")],
        "Bob",
        "bob@example.com",
    )?;
    let workspace = tempdir()?;
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    engine_for(workspace.path()).run(fixture.path(), &registry, &gateway)?;

    // Every strength stays an ownership ratio; the 100-minus-similarity
    // scale never applies when no tool is configured.
    let scores = gateway.scores();
    assert!(
        scores.iter().all(|s| s.best_strength <= 1.0),
        "scores: {:?}",
        scores
    );
    let g = scores.iter().find(|s| s.path == "g.py").unwrap();
    assert_eq!(g.author_email, "bob@example.com");
    assert!((g.best_strength - 1.0).abs() < 1e-9);
    let f_bob = scores
        .iter()
        .find(|s| s.path == "f.py" && s.author_email == "bob@example.com")
        .unwrap();
    assert!((f_bob.best_strength - 0.2).abs() < 1e-9);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_rename_without_counterpart_abandons_whole_commit() -> Result<()> {
    let fixture = FixtureRepo::new()?;
    fixture.commit(&[("README.md", "readme\n")], "Carol", "carol@example.org")?;
    fixture.commit(
        &[("f.py", TEN_LINES), ("m.py", "1\n2\n3\n4\n5\n")],
        "Alice",
        "alice@ibm.com",
    )?;
    // Bob renames f.py and edits m.py in the same commit. The renamed
    // file has no old-version counterpart, which abandons every
    // remaining file of the commit, m.py included.
    fixture.commit_full(
        &[("g.py", TEN_LINES), ("m.py", "1\n2\nX\n4\n5\n")],
        &["f.py"],
        "Bob",
        "bob@example.com",
    )?;
    let workspace = tempdir()?;
    let tool = write_fake_similarity_tool(workspace.path(), "10");
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let config = EngineConfig::new(2, workspace.path(), "proj")
        .with_similarity_tool(vec![tool.to_string_lossy().to_string()]);
    CompetenceEngine::new(config).run(fixture.path(), &registry, &gateway)?;

    // Nothing from Bob's commit survives.
    assert!(gateway
        .attributions()
        .iter()
        .all(|a| a.author_email == "alice@ibm.com"));
    let scores = gateway.scores();
    assert!(
        scores.iter().all(|s| s.author_email == "alice@ibm.com"),
        "scores: {:?}",
        scores
    );
    // Alice's f.py no longer resolves in the work tree; m.py remains.
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].path, "m.py");
    assert!((scores[0].best_strength - 1.0).abs() < 1e-9);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_similarity_at_threshold_excludes_file_from_attribution() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let tool = write_fake_similarity_tool(workspace.path(), "100");
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let config = EngineConfig::new(2, workspace.path(), "proj")
        .with_similarity_tool(vec![tool.to_string_lossy().to_string()]);
    let stats = CompetenceEngine::new(config).run(fixture.path(), &registry, &gateway)?;

    // Bob's edit is fully flagged: no attribution, no score for him.
    let scores = gateway.scores();
    assert_eq!(scores.len(), 1, "scores: {:?}", scores);
    assert_eq!(scores[0].author_email, "alice@ibm.com");
    assert!(gateway
        .attributions()
        .iter()
        .all(|a| a.author_email != "bob@example.com"));
    assert_eq!(stats.counters.fully_flagged_commits, 1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_similarity_below_threshold_uses_percentage_scale() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let tool = write_fake_similarity_tool(workspace.path(), "40");
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let config = EngineConfig::new(2, workspace.path(), "proj")
        .with_similarity_tool(vec![tool.to_string_lossy().to_string()]);
    CompetenceEngine::new(config).run(fixture.path(), &registry, &gateway)?;

    // Similarity-scored files land on the inherited 100-minus scale.
    let bob = gateway
        .scores()
        .into_iter()
        .find(|s| s.author_email == "bob@example.com")
        .unwrap();
    assert!((bob.best_strength - 60.0).abs() < 1e-9);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_scratch_workspace_is_cleaned_up() -> Result<()> {
    let fixture = three_commit_history()?;
    let workspace = tempdir()?;
    let tool = write_fake_similarity_tool(workspace.path(), "10");
    let gateway = MemoryGateway::new();
    let registry = WorkdirRegistry::sweep(fixture.path());

    let config = EngineConfig::new(2, workspace.path(), "proj")
        .with_similarity_tool(vec![tool.to_string_lossy().to_string()]);
    CompetenceEngine::new(config).run(fixture.path(), &registry, &gateway)?;

    let scratch_root = workspace.path().join("proj").join("competence");
    let leftovers: Vec<_> = fs::read_dir(&scratch_root)
        .into_iter()
        .flatten()
        .flatten()
        .collect();
    assert!(leftovers.is_empty(), "leftover scratch: {:?}", leftovers);
    Ok(())
}
