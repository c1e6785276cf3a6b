//! CLI definition and run handler
//!
//! Thin glue: flags map straight onto [`EngineConfig`], the registry
//! sweep and gateway are constructed here, and the engine does the rest.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::config::{EngineConfig, StridePolicy};
use crate::engine::CompetenceEngine;
use crate::persist::JsonLinesGateway;
use crate::registry::WorkdirRegistry;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Tenure - git authorship competence mining
///
/// Walks a repository's commit history, blames every touched file, and
/// scores how well each author knows each file.
#[derive(Parser, Debug)]
#[command(name = "tenure")]
#[command(
    version,
    about = "Mine git history into per-file, per-author competence scores",
    after_help = "\
Examples:
  tenure .                                   Mine the current repository
  tenure /path/to/repo --commit-count 500    Only the 500 newest commits
  tenure . --skip-sampling                   Competence pass only
  tenure . --similarity-tool 'java -jar jplag.jar -t 1 -vq'
                                             Enable plagiarism-aware scoring"
)]
pub struct Cli {
    /// Path to repository (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64)
    #[arg(long, default_value = "8", value_parser = parse_workers)]
    pub workers: usize,

    /// Workspace root for per-commit scratch directories
    /// (default: the system temp directory)
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Project name (default: repository directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Maximum number of commits to process (must be at least 1;
    /// default: all commits)
    #[arg(long)]
    pub commit_count: Option<i64>,

    /// Skip the file-occurrence sampling pass
    #[arg(long)]
    pub skip_sampling: bool,

    /// Skip the competence pass (sampling only)
    #[arg(long)]
    pub skip_competence: bool,

    /// External similarity tool command prefix, whitespace-separated
    /// (paths with spaces are not supported)
    #[arg(long)]
    pub similarity_tool: Option<String>,

    /// Commit sampling stride policy
    #[arg(long, default_value = "every", value_parser = ["every", "sqrt"])]
    pub sample_stride: String,

    /// Output file for JSON-lines records
    /// (default: <workspace>/<name>/records.jsonl)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Run the CLI.
pub fn run(cli: Cli) -> Result<()> {
    let repo_path = cli
        .path
        .canonicalize()
        .with_context(|| format!("Repository path {:?} does not exist", cli.path))?;

    let project = match cli.name {
        Some(name) => name,
        None => repo_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string()),
    };
    let workspace = cli
        .workspace
        .unwrap_or_else(|| std::env::temp_dir().join("tenure"));

    let mut config = EngineConfig::new(cli.workers, &workspace, &project)
        .skip_sampling(cli.skip_sampling)
        .skip_competence(cli.skip_competence)
        .with_sample_stride(match cli.sample_stride.as_str() {
            "sqrt" => StridePolicy::SqrtOfTotal,
            _ => StridePolicy::EveryCommit,
        });
    if let Some(count) = cli.commit_count {
        // Fatal before any repository work.
        config = config.with_max_commit_count(count)?;
    }
    if let Some(tool) = cli.similarity_tool {
        let command: Vec<String> = tool.split_whitespace().map(str::to_string).collect();
        if command.is_empty() {
            bail!("--similarity-tool must name a command");
        }
        config = config.with_similarity_tool(command);
    }

    let output = cli
        .output
        .unwrap_or_else(|| workspace.join(&project).join("records.jsonl"));
    let gateway = JsonLinesGateway::create(&output)?;
    let registry = WorkdirRegistry::sweep(&repo_path);

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {pos} commits processed")
            .expect("valid progress template"),
    );
    let engine = CompetenceEngine::new(config);
    let stats = engine.run_with_progress(&repo_path, &registry, &gateway, &|| bar.inc(1))?;
    bar.finish_and_clear();

    println!(
        "Processed {} commits: {} files scored, {} authors discovered ({} faulty commits, {} unresolved files)",
        stats.commits_walked,
        stats.files_scored,
        stats.authors_discovered,
        stats.counters.faulty_commits,
        stats.counters.unresolved_files
    );
    println!("Records written to {}", output.display());
    Ok(())
}
