use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use walkdir::WalkDir;

use crate::config::ArborConfig;
use crate::git::GitRepo;
use crate::storage::WorktreeStorage;

pub struct CreateOptions {
    /// Run the package-manager install step in each new worktree
    pub install_deps: bool,
    /// Copy environment files from the main tree into each new worktree
    pub copy_env: bool,
    /// Suppress per-file copy output
    pub quiet: bool,
}

/// Outcome of an environment-file copy pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub skipped: usize,
}

pub fn create_worktrees(branches: &[String], options: &CreateOptions) -> Result<()> {
    if branches.is_empty() {
        anyhow::bail!(
            "No branches specified\nUsage: arbor create [--install-deps] [--no-env] [--quiet] <branch>..."
        );
    }

    let current_dir = std::env::current_dir()?;
    let git_repo = GitRepo::open(&current_dir)?;
    let storage = WorktreeStorage::new()?;
    create_worktrees_with(&git_repo, &storage, branches, options)
}

/// Creates a worktree per branch; a failure on one branch is reported and
/// the batch continues
///
/// # Errors
/// Returns an error only for invocation-wide preconditions (repository name,
/// config read); per-branch failures never propagate
pub fn create_worktrees_with(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    branches: &[String],
    options: &CreateOptions,
) -> Result<()> {
    let repo_path = git_repo.workdir().to_path_buf();
    let repo_name = WorktreeStorage::get_repo_name(&repo_path)?;
    let config = ArborConfig::load_from_repo(&repo_path)?;

    for branch in branches {
        if let Err(e) = create_one(git_repo, storage, &config, &repo_path, &repo_name, branch, options)
        {
            eprintln!("✗ Skipping '{}': {:#}", branch, e);
        }
    }

    Ok(())
}

fn create_one(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    config: &ArborConfig,
    repo_path: &Path,
    repo_name: &str,
    branch: &str,
    options: &CreateOptions,
) -> Result<()> {
    let worktree_path = storage.worktree_path(repo_name, branch);
    let worktree_name = WorktreeStorage::worktree_dir_name(repo_name, branch);

    if worktree_path.exists() || git_repo.worktree_registered(&worktree_name)? {
        anyhow::bail!(
            "a worktree already exists at {}",
            worktree_path.display()
        );
    }

    if !git_repo.branch_exists(branch)? {
        if git_repo.remote_branch_exists(branch)? {
            println!("Fetching '{}' from origin", branch);
            git_repo.fetch_remote_branch(branch)?;
            git_repo.create_tracking_branch(branch)?;
        } else {
            println!("Creating new branch '{}' from the current HEAD", branch);
            git_repo.create_branch_from_head(branch)?;
        }
    }

    println!(
        "Creating worktree for branch '{}' at: {}",
        branch,
        worktree_path.display()
    );
    git_repo.add_worktree(branch, &worktree_path)?;

    if options.copy_env {
        let report = copy_env_files(repo_path, &worktree_path, config, options.quiet)?;
        if report.copied == 0 && report.skipped == 0 {
            println!("  No environment files found");
        } else {
            println!(
                "  Environment files: {} copied, {} skipped",
                report.copied, report.skipped
            );
        }
    }

    if options.install_deps {
        if let Err(e) = install_dependencies(&worktree_path, config) {
            eprintln!("⚠ Dependency install failed for '{}': {:#}", branch, e);
        }
    }

    println!("✓ Worktree ready!");
    println!("  Branch: {}", branch);
    println!("  Path: {}", worktree_path.display());

    open_worktree(&worktree_path, config);

    Ok(())
}

/// Copies every environment file found under `source_path` to the same
/// relative location under `target_path`.
///
/// A file counts as an environment file when its name starts with the
/// configured prefix. Excluded directories are never descended into, and a
/// file already present at the destination is skipped, not overwritten.
///
/// # Errors
/// Returns an error if the walk or a copy fails
pub fn copy_env_files(
    source_path: &Path,
    target_path: &Path,
    config: &ArborConfig,
    quiet: bool,
) -> Result<CopyReport> {
    let prefix = config.env_prefix();
    let matchers = build_exclude_matchers(&config.exclude_dirs())?;
    let mut report = CopyReport::default();

    let walker = WalkDir::new(source_path)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry.file_name(), &matchers));

    for entry in walker {
        let entry = entry.context("Failed while scanning for environment files")?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !file_name.starts_with(prefix) {
            continue;
        }

        let relative_path = entry.path().strip_prefix(source_path)?;
        let target_file = target_path.join(relative_path);

        if target_file.exists() {
            report.skipped += 1;
            if !quiet {
                println!("  Skipped (already present): {}", relative_path.display());
            }
            continue;
        }

        if let Some(parent) = target_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::copy(entry.path(), &target_file)
            .with_context(|| format!("Failed to copy {}", relative_path.display()))?;
        report.copied += 1;
        if !quiet {
            println!("  Copied: {}", relative_path.display());
        }
    }

    Ok(report)
}

enum ExcludeMatcher {
    Literal(String),
    Glob(glob::Pattern),
}

fn build_exclude_matchers(patterns: &[String]) -> Result<Vec<ExcludeMatcher>> {
    patterns
        .iter()
        .map(|pattern| {
            if pattern.contains('*') {
                Ok(ExcludeMatcher::Glob(glob::Pattern::new(pattern)?))
            } else {
                Ok(ExcludeMatcher::Literal(pattern.clone()))
            }
        })
        .collect()
}

fn is_excluded(file_name: &std::ffi::OsStr, matchers: &[ExcludeMatcher]) -> bool {
    let Some(name) = file_name.to_str() else {
        return false;
    };

    matchers.iter().any(|matcher| match matcher {
        ExcludeMatcher::Literal(literal) => name == literal,
        ExcludeMatcher::Glob(pattern) => pattern.matches(name),
    })
}

fn install_dependencies(worktree_path: &Path, config: &ArborConfig) -> Result<()> {
    let command_line = config.install_command();
    let mut parts = command_line.split_whitespace();
    let program = parts.next().context("Install command is empty")?;

    println!("  Running '{}' in {}", command_line, worktree_path.display());

    let status = Command::new(program)
        .args(parts)
        .current_dir(worktree_path)
        .status()
        .with_context(|| format!("Failed to run '{}'", command_line))?;

    if !status.success() {
        anyhow::bail!("'{}' exited with {}", command_line, status);
    }

    Ok(())
}

/// Best-effort: hand the new worktree path to the configured opener command.
/// Failures are ignored; no opener configured means no-op.
fn open_worktree(worktree_path: &Path, config: &ArborConfig) {
    let Some(command_line) = config.open_command() else {
        return;
    };
    let mut parts = command_line.split_whitespace();
    let Some(program) = parts.next() else {
        return;
    };

    let _ = Command::new(program)
        .args(parts)
        .arg(worktree_path)
        .spawn();
}
