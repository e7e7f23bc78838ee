//! engine::errors
//!
//! Error taxonomy of workspace commands.
//!
//! # Propagation
//!
//! - [`ValidationError`] is checked once before any module is touched and
//!   aborts the whole command.
//! - [`ModuleError`] is scoped to one module: it is logged and recorded in
//!   the batch report, and the remaining modules still run.
//! - [`OrchestratorError`] collects everything that stops a command before
//!   or around the fan-out (validation, locking, selection, storage).

use std::path::PathBuf;

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::lock::LockError;
use crate::git::GitError;

/// A required input is missing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A command argument is empty.
    #[error("{field} is required")]
    Missing {
        /// The argument name
        field: &'static str,
    },

    /// A module configuration lacks a required field.
    #[error("module '{module}' has no {field}")]
    ModuleField {
        /// The module's repository name
        module: String,
        /// The missing field
        field: &'static str,
    },
}

/// Failure of one module within a batch.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// The local path is empty or does not exist.
    #[error("local path '{}' does not exist", .path.display())]
    PathMissing {
        /// The configured path
        path: PathBuf,
    },

    /// A configured remote is absent from the repository.
    #[error("remote '{remote}' is not configured in the repository")]
    RemoteNotFound {
        /// The remote name
        remote: String,
    },

    /// The branch to operate on does not exist.
    #[error("branch '{branch}' not found")]
    BranchNotFound {
        /// The branch name
        branch: String,
    },

    /// A merge stopped with conflicts; nothing was committed.
    #[error("merge of '{source_branch}' has conflicts in {} file(s)", .paths.len())]
    Conflict {
        /// The branch being merged
        source_branch: String,
        /// Conflicted paths
        paths: Vec<String>,
    },

    /// Any other engine failure (network, auth, transport, worktree).
    #[error(transparent)]
    Engine(GitError),
}

impl From<GitError> for ModuleError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::RemoteNotFound { name } => ModuleError::RemoteNotFound { remote: name },
            GitError::BranchNotFound { name } => ModuleError::BranchNotFound { branch: name },
            other => ModuleError::Engine(other),
        }
    }
}

/// Errors that stop a workspace command as a whole.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No workspace has been selected.
    #[error("no workspace selected")]
    NoWorkspaceSelected,

    /// The named workspace is not in the registry.
    #[error("workspace '{name}' not found in registry")]
    WorkspaceNotFound {
        /// The requested name
        name: String,
    },

    /// No workspace owns the path.
    #[error("no workspace has a module at '{}'", .path.display())]
    NoWorkspaceForPath {
        /// The path that was resolved
        path: PathBuf,
    },

    /// The background worker panicked or was cancelled.
    #[error("background worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_errors_map_to_module_errors() {
        let err: ModuleError = GitError::RemoteNotFound {
            name: "team".to_string(),
        }
        .into();
        assert!(matches!(err, ModuleError::RemoteNotFound { ref remote } if remote == "team"));

        let err: ModuleError = GitError::BranchNotFound {
            name: "dev".to_string(),
        }
        .into();
        assert!(matches!(err, ModuleError::BranchNotFound { .. }));

        let err: ModuleError = GitError::Network {
            message: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, ModuleError::Engine(GitError::Network { .. })));
        assert_eq!(err.to_string(), "network error: timeout");
    }

    #[test]
    fn display_formatting() {
        let err = ValidationError::Missing { field: "message" };
        assert_eq!(err.to_string(), "message is required");

        let err = ValidationError::ModuleField {
            module: "tools".to_string(),
            field: "primary remote url",
        };
        assert_eq!(err.to_string(), "module 'tools' has no primary remote url");

        let err = ModuleError::Conflict {
            source_branch: "team/main".to_string(),
            paths: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "merge of 'team/main' has conflicts in 2 file(s)"
        );
    }
}
