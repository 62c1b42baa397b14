use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolves where secondary worktrees live on disk.
///
/// All worktrees for all repositories share a single parent directory
/// (`~/.worktrees` by default). A worktree's directory name is
/// `<repo-name>-<branch-name>`, with unsafe characters in the branch name
/// replaced. That naming convention is the only link between a branch and
/// its on-disk tree; nothing else is persisted.
pub struct WorktreeStorage {
    root_dir: PathBuf,
}

impl WorktreeStorage {
    /// Creates a storage handle rooted at `$ARBOR_WORKTREE_ROOT` or
    /// `~/.worktrees`, creating the directory if needed
    ///
    /// # Errors
    /// Returns an error if:
    /// - Failed to determine home directory
    /// - Failed to create the parent directory (e.g. permission denied)
    pub fn new() -> Result<Self> {
        let root_dir = if let Ok(custom_root) = std::env::var("ARBOR_WORKTREE_ROOT") {
            PathBuf::from(custom_root)
        } else {
            dirs::home_dir()
                .context("Failed to get user home directory")?
                .join(".worktrees")
        };

        Self::with_root(root_dir)
    }

    /// Creates a storage handle rooted at an explicit directory
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created
    pub fn with_root(root_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root_dir).with_context(|| {
            format!(
                "Failed to create worktree parent directory: {}",
                root_dir.display()
            )
        })?;

        Ok(Self { root_dir })
    }

    /// Extracts the repository short name from its root path
    ///
    /// # Errors
    /// Returns an error if the path doesn't have a valid file name
    pub fn get_repo_name(repo_path: &Path) -> Result<String> {
        if let Some(name) = repo_path.file_name() {
            Ok(name.to_string_lossy().to_string())
        } else {
            anyhow::bail!("Could not determine repository name from path")
        }
    }

    fn sanitize_branch_name(branch_name: &str) -> String {
        branch_name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "-")
    }

    /// Directory name a worktree gets under the parent directory
    #[must_use]
    pub fn worktree_dir_name(repo_name: &str, branch_name: &str) -> String {
        format!("{}-{}", repo_name, Self::sanitize_branch_name(branch_name))
    }

    #[must_use]
    pub fn worktree_path(&self, repo_name: &str, branch_name: &str) -> PathBuf {
        self.root_dir
            .join(Self::worktree_dir_name(repo_name, branch_name))
    }

    /// Recovers a (sanitized) branch name from a worktree directory name by
    /// stripping the repository prefix. Returns `None` when the directory
    /// doesn't follow the naming convention.
    #[must_use]
    pub fn branch_from_dir_name(repo_name: &str, dir_name: &str) -> Option<String> {
        dir_name
            .strip_prefix(&format!("{repo_name}-"))
            .filter(|rest| !rest.is_empty())
            .map(ToString::to_string)
    }

    /// Whether a path lives under the managed parent directory.
    ///
    /// Canonicalizes both sides to handle symlinks (e.g. /var -> /private/var
    /// on macOS); paths that no longer exist are compared as-is.
    #[must_use]
    pub fn manages(&self, path: &Path) -> bool {
        let root = self
            .root_dir
            .canonicalize()
            .unwrap_or_else(|_| self.root_dir.clone());
        let candidate = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        candidate.starts_with(&root)
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_worktree_path_uses_naming_convention() {
        let storage =
            WorktreeStorage::with_root(std::env::temp_dir().join("arbor-naming")).unwrap();
        let path = storage.worktree_path("app", "feature-x");
        assert!(path.ends_with("app-feature-x"));
    }

    #[test]
    fn test_sanitizes_slashes_and_special_characters() {
        assert_eq!(
            WorktreeStorage::worktree_dir_name("app", "feature/login"),
            "app-feature-login"
        );
        assert_eq!(
            WorktreeStorage::worktree_dir_name("app", "fix\\odd:name?"),
            "app-fix-odd-name-"
        );
    }

    #[test]
    fn test_branch_from_dir_name_strips_repo_prefix() {
        assert_eq!(
            WorktreeStorage::branch_from_dir_name("app", "app-feature-x"),
            Some("feature-x".to_string())
        );
        assert_eq!(
            WorktreeStorage::branch_from_dir_name("app", "other-dir"),
            None
        );
        assert_eq!(WorktreeStorage::branch_from_dir_name("app", "app-"), None);
    }

    #[test]
    fn test_manages_only_paths_under_root() {
        let root = std::env::temp_dir().join("arbor-manages");
        let storage = WorktreeStorage::with_root(root.clone()).unwrap();
        assert!(storage.manages(&root.join("app-feature-x")));
        assert!(!storage.manages(Path::new("/somewhere/else")));
    }
}
