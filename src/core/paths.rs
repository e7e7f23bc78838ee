//! core::paths
//!
//! Centralized path routing for Lockstep storage locations.
//!
//! # Storage Layout
//!
//! All Lockstep data lives under one home directory:
//! - `config.toml` - App settings
//! - `workspaces.json` - Workspace registry (default name)
//! - `workspace.json` - Single-workspace export (default name)
//! - `locks/<workspace>.lock` - Per-workspace advisory lock files
//!
//! Registry and workspace file names can be overridden in settings; relative
//! overrides resolve against the home directory.
//!
//! # Example
//!
//! ```
//! use lockstep::core::paths::LockstepPaths;
//! use std::path::PathBuf;
//!
//! let paths = LockstepPaths::new(PathBuf::from("/home/me/.lockstep"));
//!
//! assert_eq!(
//!     paths.lock_path("Main Product"),
//!     PathBuf::from("/home/me/.lockstep/locks/Main_Product.lock")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Default registry file name.
pub const REGISTRY_FILE: &str = "workspaces.json";

/// Default single-workspace file name.
pub const WORKSPACE_FILE: &str = "workspace.json";

/// Settings file name.
pub const SETTINGS_FILE: &str = "config.toml";

/// Path routing rooted at the Lockstep home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockstepPaths {
    /// The home directory.
    pub home: PathBuf,
}

impl LockstepPaths {
    /// Create paths rooted at `home`.
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }

    /// `<home>/config.toml`
    pub fn settings_path(&self) -> PathBuf {
        self.home.join(SETTINGS_FILE)
    }

    /// Resolve a data file name against the home directory.
    ///
    /// Absolute names are returned unchanged.
    pub fn resolve(&self, name: &Path) -> PathBuf {
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.home.join(name)
        }
    }

    /// `<home>/locks`
    pub fn locks_dir(&self) -> PathBuf {
        self.home.join("locks")
    }

    /// `<home>/locks/<workspace>.lock`
    ///
    /// Characters that are not safe in a file name are replaced by `_`.
    pub fn lock_path(&self, workspace: &str) -> PathBuf {
        self.locks_dir()
            .join(format!("{}.lock", lock_file_stem(workspace)))
    }
}

/// File-name-safe form of a workspace name.
pub fn lock_file_stem(workspace: &str) -> String {
    let stem: String = workspace
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        stem
    }
}
