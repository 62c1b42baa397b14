use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::git::{self, GitRepo, MainlineRelation, UpstreamStatus};
use crate::prompt::{PromptProvider, RealPromptProvider};
use crate::storage::WorktreeStorage;

pub struct ListOptions {
    /// Classify each worktree against the main line
    pub show_status: bool,
    /// Dump raw records after the listing
    pub debug: bool,
}

/// What a worktree's pending/committed state looks like relative to the
/// main line. Pending changes short-circuit the tip comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainlineStatus {
    /// Unstaged (possibly plus staged) modifications present
    Uncommitted,
    /// Only staged modifications present
    Staged,
    Identical,
    Ahead(usize),
    Behind(usize),
    Diverged { ahead: usize, behind: usize },
    /// Branch could not be determined or status was not requested
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    LocalOnly,
    Tracked { unpushed: usize },
    Unknown,
}

/// Snapshot of one secondary worktree, built fresh on every run
#[derive(Debug, Clone)]
pub struct WorktreeRecord {
    /// Worktree name as registered with git (the directory base name)
    pub name: String,
    pub path: PathBuf,
    pub branch: Option<String>,
    pub is_current: bool,
    pub mainline: MainlineStatus,
    pub remote: RemoteStatus,
}

impl WorktreeRecord {
    fn display_branch(&self) -> &str {
        self.branch.as_deref().unwrap_or("unknown")
    }
}

/// Result of scanning the repository's registered worktrees
pub struct WorktreeScan {
    pub main_path: PathBuf,
    pub main_branch: Option<String>,
    pub main_is_current: bool,
    pub records: Vec<WorktreeRecord>,
    /// Entries on the default branch, excluded from the actionable list
    pub protected: usize,
    /// Entries outside the managed parent directory
    pub unmanaged: usize,
}

pub fn list_worktrees(options: &ListOptions) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let git_repo = GitRepo::open(&current_dir)?;
    let storage = WorktreeStorage::new()?;
    list_worktrees_with(&git_repo, &storage, &current_dir, options, &RealPromptProvider)
}

/// List worktrees with a custom prompt provider (for testing)
///
/// # Errors
/// Returns an error if the repository cannot be scanned or the prompt fails
pub fn list_worktrees_with(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    invoking_dir: &Path,
    options: &ListOptions,
    prompt: &dyn PromptProvider,
) -> Result<()> {
    let repo_name = WorktreeStorage::get_repo_name(git_repo.workdir())?;
    let default_branch = git_repo.default_branch()?;
    let scan = scan_worktrees(
        git_repo,
        storage,
        invoking_dir,
        &repo_name,
        &default_branch,
        options.show_status,
    )?;

    print_scan(&repo_name, &default_branch, &scan, options);

    run_cleanup(
        git_repo,
        storage,
        &scan,
        &repo_name,
        &default_branch,
        invoking_dir,
        prompt,
    )
}

/// Builds the worktree records for one run.
///
/// The main tree is reported separately and never as a record. Secondary
/// entries on the default branch or outside the managed parent directory
/// are counted but dropped from the actionable list.
///
/// # Errors
/// Returns an error if git operations fail
pub fn scan_worktrees(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    invoking_dir: &Path,
    repo_name: &str,
    default_branch: &str,
    with_status: bool,
) -> Result<WorktreeScan> {
    let main_path = git_repo.workdir().to_path_buf();
    let main_branch = git_repo.current_branch()?;

    let mut records = Vec::new();
    let mut protected = 0;
    let mut unmanaged = 0;

    for (name, path) in git_repo.worktree_records()? {
        // Branch discovery chain: live HEAD query, then the directory-name
        // convention, then unknown.
        let branch = git::worktree_branch(&path)
            .or_else(|| WorktreeStorage::branch_from_dir_name(repo_name, &name));

        if !storage.manages(&path) {
            unmanaged += 1;
            continue;
        }

        if branch.as_deref() == Some(default_branch) {
            protected += 1;
            continue;
        }

        let is_current = is_within(invoking_dir, &path);
        let (mainline, remote) = if with_status {
            match classify(git_repo, &path, branch.as_deref(), default_branch) {
                Ok(pair) => pair,
                Err(e) => {
                    eprintln!("⚠ Could not read status for {}: {}", path.display(), e);
                    (MainlineStatus::Unknown, RemoteStatus::Unknown)
                }
            }
        } else {
            (MainlineStatus::Unknown, RemoteStatus::Unknown)
        };

        records.push(WorktreeRecord {
            name,
            path,
            branch,
            is_current,
            mainline,
            remote,
        });
    }

    Ok(WorktreeScan {
        main_is_current: is_within(invoking_dir, &main_path),
        main_path,
        main_branch,
        records,
        protected,
        unmanaged,
    })
}

fn classify(
    git_repo: &GitRepo,
    path: &Path,
    branch: Option<&str>,
    default_branch: &str,
) -> Result<(MainlineStatus, RemoteStatus)> {
    let remote = match branch {
        Some(branch) => match git_repo.upstream_status(branch)? {
            UpstreamStatus::LocalOnly => RemoteStatus::LocalOnly,
            UpstreamStatus::Tracked { unpushed } => RemoteStatus::Tracked { unpushed },
        },
        None => RemoteStatus::Unknown,
    };

    let changes = git::worktree_changes(path)?;
    if changes.unstaged {
        return Ok((MainlineStatus::Uncommitted, remote));
    }
    if changes.staged {
        return Ok((MainlineStatus::Staged, remote));
    }

    let Some(branch) = branch else {
        return Ok((MainlineStatus::Unknown, remote));
    };

    let mainline = match git_repo.mainline_relation(branch, default_branch)? {
        MainlineRelation::Identical => MainlineStatus::Identical,
        MainlineRelation::Ahead(n) => MainlineStatus::Ahead(n),
        MainlineRelation::Behind(n) => MainlineStatus::Behind(n),
        MainlineRelation::Diverged { ahead, behind } => MainlineStatus::Diverged { ahead, behind },
    };

    Ok((mainline, remote))
}

fn print_scan(repo_name: &str, default_branch: &str, scan: &WorktreeScan, options: &ListOptions) {
    println!("Worktrees for repository: {}", repo_name);
    println!("{}", "=".repeat(40));

    let current_marker = if scan.main_is_current { " [current]" } else { "" };
    println!(
        "  ● {} ({}) [main]{}",
        scan.main_branch.as_deref().unwrap_or("unknown"),
        scan.main_path.display(),
        current_marker
    );

    for record in &scan.records {
        let current_marker = if record.is_current { " [current]" } else { "" };
        let status = if options.show_status {
            format!(" - {}", describe_record(record, default_branch))
        } else {
            String::new()
        };

        println!(
            "  ○ {} ({}){}{}",
            record.display_branch(),
            record.path.display(),
            current_marker,
            status
        );
    }

    if scan.records.is_empty() {
        println!("  No secondary worktrees found.");
    }

    if scan.protected > 0 {
        println!(
            "  ({} worktree(s) on '{}' are protected and not listed)",
            scan.protected, default_branch
        );
    }
    if scan.unmanaged > 0 {
        println!(
            "  ({} worktree(s) outside the managed directory were ignored)",
            scan.unmanaged
        );
    }

    if options.debug {
        println!();
        println!("Raw records:");
        for record in &scan.records {
            println!("  {:?}", record);
        }
    }
}

fn describe_record(record: &WorktreeRecord, default_branch: &str) -> String {
    let mainline = match record.mainline {
        MainlineStatus::Uncommitted => "uncommitted changes".to_string(),
        MainlineStatus::Staged => "staged changes".to_string(),
        MainlineStatus::Identical => format!("identical to {}", default_branch),
        MainlineStatus::Ahead(n) => format!("ahead, {} new commit(s)", n),
        MainlineStatus::Behind(n) => format!("behind {} by {} commit(s)", default_branch, n),
        MainlineStatus::Diverged { ahead, behind } => format!(
            "diverged from {} (+{}/-{})",
            default_branch, ahead, behind
        ),
        MainlineStatus::Unknown => "status unknown".to_string(),
    };

    let remote = match record.remote {
        RemoteStatus::LocalOnly => "local only",
        RemoteStatus::Tracked { unpushed: 0 } => "tracked",
        RemoteStatus::Tracked { .. } => "tracked, unpushed commits",
        RemoteStatus::Unknown => return mainline,
    };

    format!("{}, {}", mainline, remote)
}

/// Prompts for branches to remove and tears each one down.
///
/// Individual failures are reported and do not abort the loop. An empty
/// answer skips cleanup entirely.
///
/// # Errors
/// Returns an error if the prompt itself fails
pub fn run_cleanup(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    scan: &WorktreeScan,
    repo_name: &str,
    default_branch: &str,
    invoking_dir: &Path,
    prompt: &dyn PromptProvider,
) -> Result<()> {
    if scan.records.is_empty() {
        return Ok(());
    }

    println!();
    let answer = prompt.input("Branches to remove (space-separated, empty to skip):")?;
    let selected: Vec<&str> = answer.split_whitespace().collect();
    if selected.is_empty() {
        return Ok(());
    }

    for branch in selected {
        if let Err(e) = remove_worktree(
            git_repo,
            storage,
            scan,
            repo_name,
            default_branch,
            invoking_dir,
            branch,
            prompt,
        ) {
            eprintln!("✗ Could not remove '{}': {:#}", branch, e);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn remove_worktree(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    scan: &WorktreeScan,
    repo_name: &str,
    default_branch: &str,
    invoking_dir: &Path,
    branch: &str,
    prompt: &dyn PromptProvider,
) -> Result<()> {
    if branch == default_branch || branch == "main" || branch == "master" {
        anyhow::bail!("'{}' is protected and cannot be removed", branch);
    }

    // Resolve via the scan records, falling back to the naming convention
    let record = scan
        .records
        .iter()
        .find(|record| record.branch.as_deref() == Some(branch));
    let path = record
        .map(|record| record.path.clone())
        .unwrap_or_else(|| storage.worktree_path(repo_name, branch));

    if record.is_some_and(|record| record.is_current) || is_within(invoking_dir, &path) {
        anyhow::bail!("it is the currently active worktree");
    }

    if !path.exists() {
        anyhow::bail!("no worktree found at {}", path.display());
    }

    let dirty = git::worktree_changes(&path)
        .map(|changes| changes.any())
        .unwrap_or(false);
    if dirty {
        println!("⚠ '{}' has uncommitted changes", branch);
        if !prompt.confirm(&format!("Remove '{}' anyway?", branch))? {
            println!("  Skipped '{}'", branch);
            return Ok(());
        }
    }

    let worktree_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(branch);

    if let Err(e) = git_repo.prune_worktree(worktree_name) {
        eprintln!(
            "⚠ Failed to deregister '{}' ({}); deleting the directory directly",
            worktree_name, e
        );
    }

    if path.exists() {
        fs::remove_dir_all(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }

    match git_repo.delete_branch(branch) {
        Ok(()) => {}
        Err(e) => eprintln!("⚠ Warning: Failed to delete branch '{}': {}", branch, e),
    }

    println!("✓ Removed worktree for '{}'", branch);
    Ok(())
}

/// Whether `dir` is `root` or lives underneath it.
///
/// Canonicalizes both sides to handle symlinks; paths that no longer exist
/// are compared as-is.
fn is_within(dir: &Path, root: &Path) -> bool {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    dir.starts_with(&root)
}
