//! # Arbor
//!
//! A CLI tool for working on many branches of one repository at once. Each
//! branch gets its own working tree under a single parent directory, with
//! environment files carried over and an optional dependency-install step,
//! so switching tasks never means stashing.
//!
//! ## Features
//!
//! - **Centralized Storage** - All worktrees live in `~/.worktrees/<repo>-<branch>/`
//! - **Batch Creation** - Create several worktrees in one invocation; one failure never aborts the rest
//! - **Branch Resolution** - Reuses local branches, tracks same-named remote branches, or starts from HEAD
//! - **Status Classification** - Each worktree is classified as identical/ahead/behind/diverged against the main line
//! - **Interactive Cleanup** - Remove worktrees and their branches straight from the listing
//! - **Merge-Back** - Auto-commit, merge into the default branch, and optionally tear everything down
//!
//! ## Quick Start
//!
//! ```bash
//! # Spin up worktrees for two branches at once
//! arbor create feature/auth feature/search
//!
//! # See where every worktree stands relative to main
//! arbor list
//!
//! # Merge a finished branch back and clean up
//! arbor merge feature/auth --cleanup-all
//! ```
//!
//! ## Module Structure
//!
//! - [`commands`] - Individual command implementations (create, list, merge)
//! - [`storage`] - The `~/.worktrees/<repo>-<branch>` naming convention
//! - [`config`] - Optional `.arbor.toml` for copy patterns and command hooks
//! - [`git`] - Git operations wrapper using the git2 crate
//! - [`prompt`] - Abstracts interactive prompts for testability

pub mod commands;
pub mod config;
pub mod git;
pub mod prompt;
pub mod storage;

pub use anyhow::Result;
