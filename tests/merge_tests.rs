#![allow(clippy::unwrap_used)] // Tests use unwrap for simplicity

//! Integration tests for the merge command
//!
//! Covers the auto-commit of pending changes, fast-forward and merge-commit
//! paths, conflict surfacing, the missing-worktree precondition, and the
//! --cleanup-all teardown loop.

use anyhow::Result;
use assert_fs::prelude::*;
use predicates::prelude::*;

mod test_helpers;
use test_helpers::{CliTestEnvironment, commit_file_in, git_in};

/// Pending changes are auto-committed, then the branch fast-forwards into
/// main; the success message names both branches
#[test]
fn test_merge_auto_commits_and_fast_forwards() -> Result<()> {
    let env = CliTestEnvironment::new()?;
    env.run_command(&["create", "feature-x"])?.assert().success();

    // Leave uncommitted work in the feature worktree
    env.worktree_path("feature-x")
        .child("feature.txt")
        .write_str("new feature")?;

    env.run_command(&["merge", "feature-x"])?
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Committing pending changes in 'feature-x'",
        ))
        .stdout(predicate::str::contains("feature-x").and(predicate::str::contains("main")));

    // The auto-commit landed and main's working tree has the file
    let log = env.git(&["log", "--format=%s", "-3"])?;
    assert!(log.contains("Auto-commit pending worktree changes"));
    env.repo_dir
        .child("feature.txt")
        .assert(predicate::str::contains("new feature"));

    Ok(())
}

/// Divergent histories produce a merge commit with the fixed message
#[test]
fn test_merge_creates_merge_commit_when_diverged() -> Result<()> {
    let env = CliTestEnvironment::new()?;
    env.run_command(&["create", "feature-x"])?.assert().success();

    env.commit_file("main-side.txt", "main work", "Main-side commit")?;
    let worktree = env.worktree_path("feature-x");
    commit_file_in(worktree.path(), "branch-side.txt", "branch work", "Branch-side commit")?;

    env.run_command(&["merge", "feature-x"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 'feature-x' into 'main'"));

    let subject = env.git(&["log", "-1", "--format=%s"])?;
    assert_eq!(subject.trim(), "Merge branch 'feature-x'");

    // Both sides of the history are present on main
    env.repo_dir
        .child("main-side.txt")
        .assert(predicate::path::exists());
    env.repo_dir
        .child("branch-side.txt")
        .assert(predicate::path::exists());

    Ok(())
}

/// Conflicting changes fail the merge with a manual-resolution instruction
#[test]
fn test_merge_conflict_fails_with_instruction() -> Result<()> {
    let env = CliTestEnvironment::new()?;
    env.commit_file("shared.txt", "base", "Add shared file")?;
    env.run_command(&["create", "feature-x"])?.assert().success();

    env.commit_file("shared.txt", "main version", "Main-side edit")?;
    let worktree = env.worktree_path("feature-x");
    commit_file_in(worktree.path(), "shared.txt", "branch version", "Branch-side edit")?;

    env.run_command(&["merge", "feature-x"])?
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("resolve them manually"));

    Ok(())
}

/// A branch without a registered worktree fails immediately; nothing is
/// committed, switched, or merged
#[test]
fn test_merge_missing_worktree_fails_immediately() -> Result<()> {
    let env = CliTestEnvironment::new()?;

    let tip_before = env.git(&["rev-parse", "HEAD"])?;

    env.run_command(&["merge", "ghost-branch"])?
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No worktree found for 'ghost-branch'"));

    let tip_after = env.git(&["rev-parse", "HEAD"])?;
    assert_eq!(tip_before, tip_after);

    Ok(())
}

/// merge with no branch prints usage and exits non-zero
#[test]
fn test_merge_requires_a_branch() -> Result<()> {
    let env = CliTestEnvironment::new()?;

    env.run_command(&["merge"])?
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage: arbor merge"));

    Ok(())
}

/// --cleanup-all tears down every managed worktree and branch after the
/// merge, not just the merged one
#[test]
fn test_merge_cleanup_all_removes_all_managed_worktrees() -> Result<()> {
    let env = CliTestEnvironment::new()?;
    env.run_command(&["create", "feature-a", "feature-b"])?
        .assert()
        .success();

    let worktree = env.worktree_path("feature-a");
    git_in(
        worktree.path(),
        &["commit", "--allow-empty", "-m", "feature work"],
    )?;

    env.run_command(&["merge", "feature-a", "--cleanup-all"])?
        .assert()
        .success();

    env.worktree_path("feature-a")
        .assert(predicate::path::missing());
    env.worktree_path("feature-b")
        .assert(predicate::path::missing());

    let branches = env.git(&["branch", "--format=%(refname:short)"])?;
    assert!(!branches.contains("feature-a"));
    assert!(!branches.contains("feature-b"));
    assert!(branches.contains("main"));

    Ok(())
}
