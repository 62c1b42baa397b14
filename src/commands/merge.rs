use anyhow::{Context, Result};
use std::fs;

use crate::git::{self, GitRepo, MergeOutcome};
use crate::storage::WorktreeStorage;

const AUTO_COMMIT_MESSAGE: &str = "Auto-commit pending worktree changes";

pub fn merge_worktree(branch: Option<&str>, cleanup_all: bool) -> Result<()> {
    let Some(branch) = branch else {
        anyhow::bail!("No branch specified\nUsage: arbor merge <branch> [--cleanup-all]");
    };

    let current_dir = std::env::current_dir()?;
    let git_repo = GitRepo::open(&current_dir)?;
    let storage = WorktreeStorage::new()?;
    merge_worktree_with(&git_repo, &storage, branch, cleanup_all)
}

/// Merges a worktree's branch back into the default branch.
///
/// Pending changes in the worktree are committed first; the merge itself
/// fast-forwards when possible. Conflicts abort with an instruction to
/// resolve manually.
///
/// # Errors
/// Returns an error if the worktree is missing, the auto-commit fails, the
/// default branch cannot be checked out, or the merge conflicts
pub fn merge_worktree_with(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    branch: &str,
    cleanup_all: bool,
) -> Result<()> {
    let repo_name = WorktreeStorage::get_repo_name(git_repo.workdir())?;

    let worktree_path = storage.worktree_path(&repo_name, branch);
    if !worktree_path.exists() {
        anyhow::bail!(
            "No worktree found for '{}' at {}",
            branch,
            worktree_path.display()
        );
    }

    let changes = git::worktree_changes(&worktree_path)?;
    if changes.any() {
        println!("Committing pending changes in '{}'", branch);
        git::stage_and_commit_all(&worktree_path, AUTO_COMMIT_MESSAGE)
            .with_context(|| format!("Failed to commit pending changes in '{}'", branch))?;
    }

    let default_branch = git_repo.default_branch()?;
    println!("Switching to '{}'", default_branch);
    git_repo
        .checkout_branch(&default_branch)
        .with_context(|| format!("Failed to switch to '{}'", default_branch))?;

    match git_repo.merge_into_head(branch)? {
        MergeOutcome::Conflict => {
            anyhow::bail!(
                "Merging '{}' into '{}' hit conflicts; resolve them manually in {}",
                branch,
                default_branch,
                git_repo.workdir().display()
            );
        }
        MergeOutcome::UpToDate => {
            println!("'{}' is already merged into '{}'", branch, default_branch);
        }
        MergeOutcome::FastForward => {
            println!("✓ Fast-forwarded '{}' to '{}'", default_branch, branch);
        }
        MergeOutcome::Merged => {
            println!("✓ Merged '{}' into '{}'", branch, default_branch);
        }
    }

    if cleanup_all {
        cleanup_all_worktrees(git_repo, storage, &repo_name, &default_branch);
    }

    Ok(())
}

/// Tears down every managed worktree and its branch, skipping the default
/// branch. Individual failures are reported and the loop continues.
fn cleanup_all_worktrees(
    git_repo: &GitRepo,
    storage: &WorktreeStorage,
    repo_name: &str,
    default_branch: &str,
) {
    let records = match git_repo.worktree_records() {
        Ok(records) => records,
        Err(e) => {
            eprintln!("⚠ Could not enumerate worktrees for cleanup: {}", e);
            return;
        }
    };

    println!("Cleaning up worktrees...");

    for (name, path) in records {
        if !storage.manages(&path) {
            continue;
        }
        if WorktreeStorage::branch_from_dir_name(repo_name, &name).is_none() {
            continue;
        }

        let branch = git::worktree_branch(&path)
            .or_else(|| WorktreeStorage::branch_from_dir_name(repo_name, &name));
        if branch.as_deref() == Some(default_branch) {
            continue;
        }

        if let Err(e) = git_repo.prune_worktree(&name) {
            eprintln!("⚠ Failed to deregister '{}': {}", name, e);
        }

        if path.exists() {
            if let Err(e) = fs::remove_dir_all(&path) {
                eprintln!("⚠ Failed to remove {}: {}", path.display(), e);
                continue;
            }
        }

        if let Some(branch) = branch {
            match git_repo.delete_branch(&branch) {
                Ok(()) => println!("  ✓ Removed '{}'", branch),
                Err(e) => eprintln!("⚠ Warning: Failed to delete branch '{}': {}", branch, e),
            }
        } else {
            println!("  ✓ Removed {}", path.display());
        }
    }
}
