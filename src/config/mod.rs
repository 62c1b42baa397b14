//! Configuration for environment-file propagation and command hooks.
//!
//! Loaded from an optional `.arbor.toml` in the repository root:
//!
//! ```toml
//! [env-files]
//! prefix = ".env"
//! exclude = ["vendor", "coverage"]
//!
//! [commands]
//! install = "pnpm install"
//! open = "wezterm start --cwd"
//! ```
//!
//! Every field is optional. User exclude entries are added to the defaults;
//! a missing, empty, or syntactically invalid file falls back to defaults
//! with a warning rather than aborting the command.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_ENV_PREFIX: &str = ".env";
const DEFAULT_INSTALL_COMMAND: &str = "npm install";

/// Configuration loaded from `.arbor.toml`, or defaults when absent.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ArborConfig {
    /// Environment-file discovery settings
    #[serde(rename = "env-files", default)]
    pub env_files: EnvFilePatterns,

    /// External commands run on behalf of the user
    #[serde(default)]
    pub commands: CommandHooks,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EnvFilePatterns {
    /// File-name prefix that marks a file as an environment file
    #[serde(default)]
    pub prefix: Option<String>,

    /// Extra directory names (or glob patterns) never descended into,
    /// added to the built-in exclusions
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CommandHooks {
    /// Package-manager install step run with `--install-deps`
    #[serde(default)]
    pub install: Option<String>,

    /// Command invoked with a new worktree's path after creation
    #[serde(default)]
    pub open: Option<String>,
}

impl ArborConfig {
    /// Directory names excluded from the environment-file walk regardless of
    /// user configuration: dependency caches, git metadata, build and
    /// distribution output.
    fn default_exclude_dirs() -> Vec<String> {
        vec![
            "node_modules".to_string(),
            ".git".to_string(),
            "target".to_string(),
            "build".to_string(),
            "dist".to_string(),
        ]
    }

    /// Loads configuration from a repository root with robust error handling.
    ///
    /// # Errors
    ///
    /// Only returns an error if the file system operation fails (e.g.
    /// permission denied). TOML parsing errors are handled gracefully with a
    /// warning and fallback to defaults.
    pub fn load_from_repo(repo_path: &Path) -> Result<Self> {
        let config_path = repo_path.join(".arbor.toml");

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        match toml::from_str::<ArborConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("Warning: Invalid TOML syntax in .arbor.toml:");
                eprintln!("  {}", e);
                eprintln!("  Using default configuration. Please fix the syntax and try again.");
                Ok(Self::default())
            }
        }
    }

    #[must_use]
    pub fn env_prefix(&self) -> &str {
        self.env_files
            .prefix
            .as_deref()
            .unwrap_or(DEFAULT_ENV_PREFIX)
    }

    /// Built-in excluded directories plus any user additions, deduplicated
    #[must_use]
    pub fn exclude_dirs(&self) -> Vec<String> {
        let mut merged = Self::default_exclude_dirs();

        if let Some(user_excludes) = &self.env_files.exclude {
            for pattern in user_excludes {
                if !merged.contains(pattern) {
                    merged.push(pattern.clone());
                }
            }
        }

        merged
    }

    #[must_use]
    pub fn install_command(&self) -> &str {
        self.commands
            .install
            .as_deref()
            .unwrap_or(DEFAULT_INSTALL_COMMAND)
    }

    /// Opener command, if one is configured.
    ///
    /// `ARBOR_OPEN_CMD` overrides the config file; no PATH probing happens,
    /// so the behavior is reproducible against fixtures.
    #[must_use]
    pub fn open_command(&self) -> Option<String> {
        std::env::var("ARBOR_OPEN_CMD")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.commands.open.clone())
    }
}
