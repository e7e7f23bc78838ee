//! git::interface
//!
//! The git-engine capability consumed by the rest of Lockstep.
//!
//! # Architecture
//!
//! Lockstep never reimplements git. Everything it needs from a repository is
//! expressed by two traits:
//!
//! - [`GitEngine`]: opens an existing working tree or clones a new one
//! - [`Repository`]: one opened handle (remotes, fetch, merge, branches,
//!   checkout, stage/commit, push, status, ahead count)
//!
//! The production implementation lives in [`super::git2_engine`]; the
//! in-memory [`super::mock::MockEngine`] implements the same traits for tests.
//!
//! # Error Handling
//!
//! Engine failures are normalized into [`GitError`] variants so the module
//! layer can tell a missing remote from an authentication failure without
//! inspecting `git2` error codes.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from git-engine operations.
#[derive(Debug, Clone, Error)]
pub enum GitError {
    /// The path is not a git working tree.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// A configured remote does not exist in the repository.
    #[error("remote '{name}' not found")]
    RemoteNotFound {
        /// The remote name
        name: String,
    },

    /// A branch or ref could not be resolved.
    #[error("branch not found: {name}")]
    BranchNotFound {
        /// The branch name or ref that was looked up
        name: String,
    },

    /// Authentication was rejected by the remote.
    #[error("authentication failed: {message}")]
    AuthFailed {
        /// Message reported by the transport
        message: String,
    },

    /// Network or transport failure.
    #[error("network error: {message}")]
    Network {
        /// Message reported by the transport
        message: String,
    },

    /// The remote rejected one or more pushed refs.
    #[error("push rejected: {details}")]
    PushRejected {
        /// Rejection reasons as reported per ref
        details: String,
    },

    /// Working tree changes block the operation.
    #[error("working tree conflict: {message}")]
    WorktreeConflict {
        /// Description of the conflict
        message: String,
    },

    /// Any other engine error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with context about what was being done.
    pub(crate) fn from_git2(err: git2::Error, context: &str) -> Self {
        match (err.code(), err.class()) {
            (git2::ErrorCode::Auth, _) => GitError::AuthFailed {
                message: format!("{}: {}", context, err.message()),
            },
            (git2::ErrorCode::Conflict, _) | (git2::ErrorCode::Uncommitted, _) => {
                GitError::WorktreeConflict {
                    message: format!("{}: {}", context, err.message()),
                }
            }
            (_, git2::ErrorClass::Net)
            | (_, git2::ErrorClass::Http)
            | (_, git2::ErrorClass::Ssh)
            | (_, git2::ErrorClass::Ssl) => GitError::Network {
                message: format!("{}: {}", context, err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

/// Username/password pair handed to every authenticated transport call.
///
/// Debug output never includes the password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// User name presented to the remote
    pub user_name: String,
    /// Password or personal access token
    pub password: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Author/committer identity used for synthesized commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

/// Parameters for cloning a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneParams {
    /// Branch to check out after cloning (remote default when `None`)
    pub branch: Option<String>,
    /// Name given to the cloned-from remote
    pub remote_name: String,
}

/// A remote as configured in a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Remote name
    pub name: String,
    /// Fetch URL
    pub url: Option<String>,
    /// Explicit push URL, if one is configured
    pub push_url: Option<String>,
    /// Configured fetch refspecs
    pub fetch_refspecs: Vec<String>,
}

impl RemoteInfo {
    /// The URL pushes go to: the push URL when set, otherwise the fetch URL.
    pub fn effective_push_url(&self) -> Option<&str> {
        self.push_url.as_deref().or(self.url.as_deref())
    }
}

/// Result classification of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// Nothing to merge.
    UpToDate,
    /// The current branch was moved forward; no merge commit is needed.
    FastForward,
    /// A true merge was performed and is staged, waiting for a commit.
    NonFastForward,
    /// The merge stopped with conflicts in the working tree.
    Conflicts,
}

/// Outcome of [`Repository::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// How the merge resolved
    pub status: MergeStatus,
    /// Paths left in a conflicted state (empty unless `status` is `Conflicts`)
    pub conflicted: Vec<String>,
}

impl MergeOutcome {
    /// Outcome with the given status and no conflicts.
    pub fn with_status(status: MergeStatus) -> Self {
        Self {
            status,
            conflicted: Vec::new(),
        }
    }

    /// Outcome reporting conflicts on the given paths.
    pub fn conflicts(paths: Vec<String>) -> Self {
        Self {
            status: MergeStatus::Conflicts,
            conflicted: paths,
        }
    }

    /// Whether the merge stopped with conflicts.
    pub fn has_conflicts(&self) -> bool {
        self.status == MergeStatus::Conflicts
    }
}

/// How a checkout treats uncommitted changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Overwrite the working tree, discarding local modifications.
    Force,
    /// Refuse to overwrite local modifications.
    Safe,
}

/// Raw status classification of one path, as reported by the engine.
///
/// Index and working-tree variants are kept apart here; the domain layer
/// collapses them (see `core::changes::ChangeKind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    NewInIndex,
    ModifiedInIndex,
    DeletedFromIndex,
    RenamedInIndex,
    TypeChangeInIndex,
    NewInWorkdir,
    ModifiedInWorkdir,
    DeletedFromWorkdir,
    RenamedInWorkdir,
    TypeChangeInWorkdir,
    Ignored,
    Conflicted,
    Unaltered,
}

/// One entry of a status listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Path relative to the working tree root
    pub path: String,
    /// Dominant state of the path
    pub state: FileState,
}

impl StatusEntry {
    /// Create a status entry.
    pub fn new(path: impl Into<String>, state: FileState) -> Self {
        Self {
            path: path.into(),
            state,
        }
    }
}

/// Options for [`Repository::status`].
///
/// Unaltered entries are never reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusOptions {
    /// Report ignored files
    pub include_ignored: bool,
}

/// An opened repository handle.
///
/// Handles are exclusively owned by one module configuration and are not
/// shared across threads concurrently.
pub trait Repository: Send {
    /// Root of the working tree.
    fn work_dir(&self) -> &Path;

    /// All configured remotes.
    fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError>;

    /// Look up one remote; `Ok(None)` when it is not configured.
    fn find_remote(&self, name: &str) -> Result<Option<RemoteInfo>, GitError>;

    /// Add a remote.
    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), GitError>;

    /// Set the push URL of an existing remote.
    fn set_push_url(&mut self, name: &str, push_url: &str) -> Result<(), GitError>;

    /// Fetch the given refspecs from a remote, pruning stale tracking refs.
    fn fetch(
        &mut self,
        remote: &str,
        refspecs: &[String],
        credentials: &Credentials,
    ) -> Result<(), GitError>;

    /// Merge `source` (a branch friendly name such as `origin/main` or `main`)
    /// into the current branch. A clean non-fast-forward merge is left staged.
    fn merge(&mut self, source: &str, signature: &Signature) -> Result<MergeOutcome, GitError>;

    /// Friendly names of every local branch and remote-tracking branch
    /// (`main`, `origin/main`).
    fn branches(&self) -> Result<Vec<String>, GitError>;

    /// Whether a local branch with this name exists.
    fn local_branch_exists(&self, name: &str) -> Result<bool, GitError>;

    /// Name of the checked-out branch; `None` when HEAD is detached or unborn.
    fn head_branch(&self) -> Result<Option<String>, GitError>;

    /// Create a local branch starting at `start_point` (e.g. `origin/main`).
    fn create_branch(&mut self, name: &str, start_point: &str) -> Result<(), GitError>;

    /// Check out a local branch.
    fn checkout_branch(&mut self, name: &str, mode: CheckoutMode) -> Result<(), GitError>;

    /// Make `branch` track the same-named branch on `remote`.
    fn set_upstream(&mut self, branch: &str, remote: &str) -> Result<(), GitError>;

    /// Working tree and index status.
    fn status(&self, options: &StatusOptions) -> Result<Vec<StatusEntry>, GitError>;

    /// Stage paths (additions, modifications and deletions).
    fn stage(&mut self, paths: &[String]) -> Result<(), GitError>;

    /// Commit the index on the current branch; returns the new commit id.
    ///
    /// When a merge is in progress the merged commit becomes the second parent.
    fn commit(
        &mut self,
        message: &str,
        author: &Signature,
        committer: &Signature,
    ) -> Result<String, GitError>;

    /// Push a local branch to the same-named branch on `remote`.
    fn push(&mut self, remote: &str, branch: &str, credentials: &Credentials)
        -> Result<(), GitError>;

    /// Commits on the current branch not present on its upstream.
    /// `Ok(None)` when there is no upstream.
    fn ahead_count(&self) -> Result<Option<usize>, GitError>;
}

/// Opens and clones repositories.
pub trait GitEngine: Send + Sync {
    /// Open the working tree at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn Repository>, GitError>;

    /// Clone `url` into `path`.
    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        params: &CloneParams,
        credentials: &Credentials,
    ) -> Result<Box<dyn Repository>, GitError>;

    /// Working tree of the repository enclosing `path`, searching parent
    /// directories. `None` when `path` is not inside a non-bare repository.
    fn discover(&self, path: &Path) -> Option<PathBuf>;
}
