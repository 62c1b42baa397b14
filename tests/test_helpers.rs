#![allow(clippy::unwrap_used)] // Tests use unwrap for simplicity
#![allow(dead_code)] // Each integration-test crate uses a subset of the helpers

use anyhow::{Context, Result};
use assert_fs::TempDir;
use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Test environment with a real git repository (named `app`, default branch
/// `main`) and a dedicated worktree storage directory pinned per command.
pub struct CliTestEnvironment {
    pub temp_dir: TempDir,
    pub repo_dir: assert_fs::fixture::ChildPath,
    pub storage_dir: assert_fs::fixture::ChildPath,
}

impl CliTestEnvironment {
    /// Creates a new test environment with an initial commit on `main`
    ///
    /// # Errors
    /// Returns an error if:
    /// - Failed to create temporary directory
    /// - Failed to initialize git repository
    /// - Failed to configure git settings
    /// - Failed to create initial commit
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
        let repo_dir = temp_dir.child("app");
        let storage_dir = temp_dir.child("worktrees");

        repo_dir.create_dir_all()?;
        storage_dir.create_dir_all()?;

        git_in(repo_dir.path(), &["init", "-b", "main"])?;
        git_in(repo_dir.path(), &["config", "user.name", "Test User"])?;
        git_in(repo_dir.path(), &["config", "user.email", "test@example.com"])?;

        repo_dir.child("README.md").write_str("# Test Repo")?;
        git_in(repo_dir.path(), &["add", "."])?;
        git_in(repo_dir.path(), &["commit", "-m", "Initial commit"])?;

        Ok(Self {
            temp_dir,
            repo_dir,
            storage_dir,
        })
    }

    /// Run a git command in the repository directory, returning stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        git_in(self.repo_dir.path(), args)
    }

    /// Execute an arbor CLI command with the storage root pinned to this
    /// environment
    ///
    /// # Errors
    /// Returns an error if the binary cannot be located
    pub fn run_command(&self, args: &[&str]) -> Result<assert_cmd::Command> {
        let mut cmd = assert_cmd::Command::cargo_bin("arbor")
            .context("Failed to find arbor binary")?;

        cmd.current_dir(self.repo_dir.path())
            .env("ARBOR_WORKTREE_ROOT", self.storage_dir.path())
            .env_remove("ARBOR_OPEN_CMD");

        cmd.args(args);
        Ok(cmd)
    }

    /// Path a worktree for `branch_name` gets under the storage directory
    pub fn worktree_path(&self, branch_name: &str) -> assert_fs::fixture::ChildPath {
        let sanitized = branch_name.replace('/', "-");
        self.storage_dir.child(format!("app-{sanitized}"))
    }

    /// Write a file in the main repository and commit it
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> Result<()> {
        commit_file_in(self.repo_dir.path(), name, content, message)
    }

    /// Creates a local bare clone of the repository and wires it up as the
    /// `origin` remote, so remote-branch flows run without a network
    pub fn add_origin(&self) -> Result<PathBuf> {
        let origin_path = self.temp_dir.path().join("origin.git");

        let output = Command::new("git")
            .args([
                "clone",
                "--bare",
                &self.repo_dir.path().to_string_lossy(),
                &origin_path.to_string_lossy(),
            ])
            .current_dir(self.temp_dir.path())
            .output()
            .context("Failed to create bare clone")?;
        if !output.status.success() {
            anyhow::bail!(
                "git clone --bare failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        self.git(&["remote", "add", "origin", &origin_path.to_string_lossy()])?;
        Ok(origin_path)
    }
}

/// Run a git command in an arbitrary directory, returning stdout
pub fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .context("Failed to execute git command")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Git command {:?} failed: {}", args, stderr);
    }

    Ok(String::from_utf8(output.stdout)?)
}

/// Write a file in `dir` and commit it there
pub fn commit_file_in(dir: &Path, name: &str, content: &str, message: &str) -> Result<()> {
    std::fs::write(dir.join(name), content)?;
    git_in(dir, &["add", "."])?;
    git_in(dir, &["commit", "-m", message])?;
    Ok(())
}
