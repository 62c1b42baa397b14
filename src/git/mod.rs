use anyhow::{Context, Result};
use git2::{BranchType, Direction, ErrorCode, Repository};
use std::path::{Path, PathBuf};

/// How a branch's tip relates to the main line's tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainlineRelation {
    Identical,
    Ahead(usize),
    Behind(usize),
    Diverged { ahead: usize, behind: usize },
}

/// How a local branch relates to its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStatus {
    /// No remote-tracking branch is configured
    LocalOnly,
    Tracked { unpushed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    UpToDate,
    FastForward,
    Merged,
    Conflict,
}

/// Pending-change summary for a working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorktreeChanges {
    pub unstaged: bool,
    pub staged: bool,
}

impl WorktreeChanges {
    #[must_use]
    pub fn any(&self) -> bool {
        self.unstaged || self.staged
    }
}

/// Handle on the main repository.
///
/// Discovery from inside a linked worktree resolves back to the main
/// repository via the common git dir, so every command compares against and
/// mutates the same reference point no matter where it was invoked.
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Opens the main repository containing `path`
    ///
    /// # Errors
    /// Returns an error if no repository is found at or above `path`
    pub fn open(path: &Path) -> Result<Self> {
        let discovered =
            Repository::discover(path).context("Not inside a git repository")?;

        let repo = if discovered.is_worktree() {
            let common = discovered.commondir().to_path_buf();
            Repository::open(common).context("Failed to open main repository")?
        } else {
            discovered
        };

        Ok(Self { repo })
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        self.repo.workdir().unwrap_or_else(|| self.repo.path())
    }

    /// Checks if a local branch exists
    ///
    /// # Errors
    /// Returns an error if git operations fail
    pub fn branch_exists(&self, branch_name: &str) -> Result<bool> {
        match self.repo.find_branch(branch_name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Name of the branch checked out in the main working tree, if any
    ///
    /// # Errors
    /// Returns an error if HEAD cannot be read
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().map(ToString::to_string))
        } else {
            Ok(None)
        }
    }

    /// Creates a new local branch at the current HEAD commit
    ///
    /// # Errors
    /// Returns an error if HEAD cannot be resolved or the branch exists
    pub fn create_branch_from_head(&self, branch_name: &str) -> Result<()> {
        let head_commit = self.repo.head()?.peel_to_commit()?;
        self.repo
            .branch(branch_name, &head_commit, false)
            .with_context(|| format!("Failed to create branch '{}'", branch_name))?;
        Ok(())
    }

    /// Asks the `origin` remote whether it has a branch with this name.
    ///
    /// Lists the live remote refs; a repository without an `origin` remote
    /// reports no remote branches rather than failing.
    ///
    /// # Errors
    /// Returns an error if the remote exists but cannot be contacted
    pub fn remote_branch_exists(&self, branch_name: &str) -> Result<bool> {
        let mut remote = match self.repo.find_remote("origin") {
            Ok(remote) => remote,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let connection = remote
            .connect_auth(Direction::Fetch, None, None)
            .context("Failed to contact the 'origin' remote")?;

        let wanted = format!("refs/heads/{branch_name}");
        Ok(connection.list()?.iter().any(|head| head.name() == wanted))
    }

    /// Fetches a single branch from `origin` into its remote-tracking ref
    ///
    /// # Errors
    /// Returns an error if the fetch fails
    pub fn fetch_remote_branch(&self, branch_name: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote("origin")
            .context("No 'origin' remote configured")?;

        let refspec = format!("+refs/heads/{branch_name}:refs/remotes/origin/{branch_name}");
        remote
            .fetch(&[refspec.as_str()], None, None)
            .with_context(|| format!("Failed to fetch '{}' from origin", branch_name))?;
        Ok(())
    }

    /// Creates a local branch at `origin/<branch>` and sets it as upstream
    ///
    /// # Errors
    /// Returns an error if the remote-tracking ref is missing or branch
    /// creation fails
    pub fn create_tracking_branch(&self, branch_name: &str) -> Result<()> {
        let remote_name = format!("origin/{branch_name}");
        let remote_branch = self
            .repo
            .find_branch(&remote_name, BranchType::Remote)
            .with_context(|| format!("Remote-tracking branch '{}' not found", remote_name))?;
        let target = remote_branch.get().peel_to_commit()?;

        let mut branch = self
            .repo
            .branch(branch_name, &target, false)
            .with_context(|| format!("Failed to create branch '{}'", branch_name))?;
        branch.set_upstream(Some(&remote_name))?;
        Ok(())
    }

    /// Registers and materializes a worktree for an existing local branch
    ///
    /// # Errors
    /// Returns an error if the branch is missing or the worktree cannot be
    /// created (including the branch being checked out elsewhere)
    pub fn add_worktree(&self, branch_name: &str, worktree_path: &Path) -> Result<()> {
        let branch = self
            .repo
            .find_branch(branch_name, BranchType::Local)
            .with_context(|| format!("Failed to find branch '{}'", branch_name))?;

        // Use the directory name as the worktree name to avoid filesystem conflicts
        let worktree_name = worktree_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(branch_name);

        let mut opts = git2::WorktreeAddOptions::new();
        opts.reference(Some(branch.get()));

        self.repo
            .worktree(worktree_name, worktree_path, Some(&opts))
            .with_context(|| {
                format!("Failed to create worktree at {}", worktree_path.display())
            })?;

        Ok(())
    }

    /// Checks whether a worktree name is registered with the repository
    ///
    /// # Errors
    /// Returns an error if git operations fail
    pub fn worktree_registered(&self, worktree_name: &str) -> Result<bool> {
        let names = self.repo.worktrees()?;
        Ok(names.iter().flatten().any(|name| name == worktree_name))
    }

    /// Lists registered secondary worktrees as (name, path) pairs.
    ///
    /// The main working tree is not included; callers get it from
    /// [`GitRepo::workdir`].
    ///
    /// # Errors
    /// Returns an error if git operations fail
    pub fn worktree_records(&self) -> Result<Vec<(String, PathBuf)>> {
        let names = self.repo.worktrees()?;
        let mut records = Vec::new();

        for name in names.iter().flatten() {
            let worktree = self.repo.find_worktree(name)?;
            records.push((name.to_string(), worktree.path().to_path_buf()));
        }

        Ok(records)
    }

    /// Removes a worktree's registration from the repository
    ///
    /// # Errors
    /// Returns an error if git operations fail
    pub fn prune_worktree(&self, worktree_name: &str) -> Result<()> {
        let worktree = self.repo.find_worktree(worktree_name)?;
        worktree.prune(Some(git2::WorktreePruneOptions::new().valid(true)))?;
        Ok(())
    }

    /// Deletes a local branch
    ///
    /// # Errors
    /// Returns an error if the branch doesn't exist or deletion fails
    pub fn delete_branch(&self, branch_name: &str) -> Result<()> {
        let mut branch = self.repo.find_branch(branch_name, BranchType::Local)?;
        branch.delete()?;
        Ok(())
    }

    /// Determines the repository's default branch.
    ///
    /// Order: the symbolic target of `origin/HEAD` when it names an existing
    /// local branch, then `main`, then `master`.
    ///
    /// # Errors
    /// Returns an error if none of the candidates resolves
    pub fn default_branch(&self) -> Result<String> {
        if let Ok(reference) = self.repo.find_reference("refs/remotes/origin/HEAD") {
            if let Some(name) = reference
                .symbolic_target()
                .and_then(|target| target.strip_prefix("refs/remotes/origin/"))
            {
                if self.branch_exists(name)? {
                    return Ok(name.to_string());
                }
            }
        }

        for candidate in ["main", "master"] {
            if self.branch_exists(candidate)? {
                return Ok(candidate.to_string());
            }
        }

        anyhow::bail!("Could not determine the default branch (tried origin/HEAD, main, master)")
    }

    /// Checks out a local branch in the main working tree
    ///
    /// # Errors
    /// Returns an error if the branch is missing or the checkout would
    /// overwrite local changes
    pub fn checkout_branch(&self, branch_name: &str) -> Result<()> {
        let refname = format!("refs/heads/{branch_name}");
        let obj = self
            .repo
            .revparse_single(&refname)
            .with_context(|| format!("Failed to resolve branch '{}'", branch_name))?;

        self.repo.checkout_tree(&obj, None)?;
        self.repo.set_head(&refname)?;
        Ok(())
    }

    fn branch_tip(&self, branch_name: &str) -> Result<git2::Oid> {
        let branch = self
            .repo
            .find_branch(branch_name, BranchType::Local)
            .with_context(|| format!("Failed to find branch '{}'", branch_name))?;
        branch
            .get()
            .target()
            .with_context(|| format!("Branch '{}' has no commits", branch_name))
    }

    /// Classifies a branch's tip against the main line's tip
    ///
    /// # Errors
    /// Returns an error if either branch cannot be resolved
    pub fn mainline_relation(&self, branch_name: &str, mainline: &str) -> Result<MainlineRelation> {
        let tip = self.branch_tip(branch_name)?;
        let main_tip = self.branch_tip(mainline)?;

        if tip == main_tip {
            return Ok(MainlineRelation::Identical);
        }

        let (ahead, behind) = self.repo.graph_ahead_behind(tip, main_tip)?;
        Ok(match (ahead, behind) {
            (0, 0) => MainlineRelation::Identical,
            (ahead, 0) => MainlineRelation::Ahead(ahead),
            (0, behind) => MainlineRelation::Behind(behind),
            (ahead, behind) => MainlineRelation::Diverged { ahead, behind },
        })
    }

    /// Reports whether a branch tracks a remote branch and how many commits
    /// it has not pushed there.
    ///
    /// A failed ahead/behind computation degrades to a zero count.
    ///
    /// # Errors
    /// Returns an error if the local branch cannot be resolved
    pub fn upstream_status(&self, branch_name: &str) -> Result<UpstreamStatus> {
        let branch = self
            .repo
            .find_branch(branch_name, BranchType::Local)
            .with_context(|| format!("Failed to find branch '{}'", branch_name))?;

        let upstream = match branch.upstream() {
            Ok(upstream) => upstream,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(UpstreamStatus::LocalOnly),
            Err(e) => return Err(e.into()),
        };

        let unpushed = match (branch.get().target(), upstream.get().target()) {
            (Some(local), Some(remote)) => self
                .repo
                .graph_ahead_behind(local, remote)
                .unwrap_or((0, 0))
                .0,
            _ => 0,
        };

        Ok(UpstreamStatus::Tracked { unpushed })
    }

    /// Merges a local branch into the currently checked-out branch.
    ///
    /// Fast-forwards when possible; otherwise creates a merge commit with
    /// the message `Merge branch '<name>'`. On conflict the merge state is
    /// left in place for manual resolution.
    ///
    /// # Errors
    /// Returns an error if the branch cannot be resolved or git operations
    /// fail outright (a conflicting merge is an `Ok(Conflict)` outcome)
    pub fn merge_into_head(&self, branch_name: &str) -> Result<MergeOutcome> {
        let branch = self
            .repo
            .find_branch(branch_name, BranchType::Local)
            .with_context(|| format!("Failed to find branch '{}'", branch_name))?;
        let annotated = self.repo.reference_to_annotated_commit(branch.get())?;

        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.contains(git2::MergeAnalysis::ANALYSIS_UP_TO_DATE) {
            return Ok(MergeOutcome::UpToDate);
        }

        if analysis.contains(git2::MergeAnalysis::ANALYSIS_FASTFORWARD) {
            let target = self.repo.find_commit(annotated.id())?;
            let mut head_ref = self.repo.head()?;
            head_ref.set_target(target.id(), "merge: fast-forward")?;
            self.repo.checkout_head(None)?;
            return Ok(MergeOutcome::FastForward);
        }

        self.repo.merge(&[&annotated], None, None)?;

        if self.repo.index()?.has_conflicts() {
            return Ok(MergeOutcome::Conflict);
        }

        self.commit_merge(branch_name)?;
        Ok(MergeOutcome::Merged)
    }

    fn commit_merge(&self, branch_name: &str) -> Result<()> {
        let mut index = self.repo.index()?;
        let oid = index.write_tree()?;
        let tree = self.repo.find_tree(oid)?;

        let head = self.repo.head()?.peel_to_commit()?;
        let branch = self.repo.find_branch(branch_name, BranchType::Local)?;
        let branch_commit = branch.get().peel_to_commit()?;

        let signature = self.repo.signature()?;
        let message = format!("Merge branch '{}'", branch_name);

        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &[&head, &branch_commit],
        )?;

        self.repo.cleanup_state()?;
        Ok(())
    }
}

/// Name of the branch checked out in the working tree at `path`.
///
/// Returns `None` for missing/invalid trees and detached HEADs; callers fall
/// back to the directory-name convention.
#[must_use]
pub fn worktree_branch(path: &Path) -> Option<String> {
    let repo = Repository::open(path).ok()?;
    let head = repo.head().ok()?;
    if head.is_branch() {
        head.shorthand().map(ToString::to_string)
    } else {
        None
    }
}

/// Summarizes staged and unstaged (including untracked) changes in the
/// working tree at `path`
///
/// # Errors
/// Returns an error if the tree cannot be opened or its status read
pub fn worktree_changes(path: &Path) -> Result<WorktreeChanges> {
    let repo = Repository::open(path)
        .with_context(|| format!("Failed to open worktree at {}", path.display()))?;

    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true);

    let statuses = repo.statuses(Some(&mut opts))?;
    let mut changes = WorktreeChanges::default();

    let staged_mask = git2::Status::INDEX_NEW
        | git2::Status::INDEX_MODIFIED
        | git2::Status::INDEX_DELETED
        | git2::Status::INDEX_RENAMED
        | git2::Status::INDEX_TYPECHANGE;
    let unstaged_mask = git2::Status::WT_NEW
        | git2::Status::WT_MODIFIED
        | git2::Status::WT_DELETED
        | git2::Status::WT_RENAMED
        | git2::Status::WT_TYPECHANGE;

    for entry in statuses.iter() {
        let status = entry.status();
        changes.staged |= status.intersects(staged_mask);
        changes.unstaged |= status.intersects(unstaged_mask);
    }

    Ok(changes)
}

/// Stages everything in the working tree at `path` and commits it
///
/// # Errors
/// Returns an error if staging or the commit fails (e.g. no committer
/// identity is configured)
pub fn stage_and_commit_all(path: &Path, message: &str) -> Result<()> {
    let repo = Repository::open(path)
        .with_context(|| format!("Failed to open worktree at {}", path.display()))?;

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
    // add_all picks up new and modified files; update_all records deletions
    index.update_all(["*"].iter(), None)?;
    index.write()?;

    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;

    let signature = repo.signature()?;
    let parent = repo.head()?.peel_to_commit()?;

    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &[&parent],
    )?;

    Ok(())
}
