//! git::mock
//!
//! In-memory git engine for deterministic testing.
//!
//! # Design
//!
//! [`MockEngine`] implements [`GitEngine`] over a map of fake repositories
//! keyed by working-tree path. Handles returned by `open`/`clone_repo` share
//! the engine's state, so tests can inspect what a command did after the
//! fact. Remote servers are modeled as URL -> branch list; fetching from a
//! remote mirrors its server's branches into remote-tracking names and
//! pushing publishes a branch back to the server.
//!
//! Failures are injected per path and operation with [`MockEngine::fail_on`].
//!
//! # Example
//!
//! ```
//! use lockstep::git::mock::{MockEngine, MockRepoState};
//! use lockstep::git::GitEngine;
//! use std::path::Path;
//!
//! let engine = MockEngine::new();
//! engine.add_repo(
//!     "/ws/app",
//!     MockRepoState::on_branch("main").with_remote("origin", "https://example.com/app.git", &["main"]),
//! );
//!
//! let repo = engine.open(Path::new("/ws/app")).unwrap();
//! assert_eq!(repo.head_branch().unwrap().as_deref(), Some("main"));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::interface::{
    CheckoutMode, CloneParams, Credentials, FileState, GitEngine, GitError, MergeOutcome,
    MergeStatus, RemoteInfo, Repository, Signature, StatusEntry, StatusOptions,
};

/// Mock engine for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<MockEngineInner>>,
}

#[derive(Debug, Default)]
struct MockEngineInner {
    /// Repositories by working-tree path.
    repos: HashMap<PathBuf, MockRepoState>,
    /// Branches published by each remote URL, default branch first.
    servers: HashMap<String, Vec<String>>,
    /// Injected failures.
    failures: Vec<Failure>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

#[derive(Debug, Clone)]
struct Failure {
    path: PathBuf,
    op: GitOp,
    error: GitError,
}

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOp {
    Open,
    Clone,
    AddRemote,
    SetPushUrl,
    Fetch,
    Merge,
    CreateBranch,
    Checkout,
    SetUpstream,
    Status,
    Stage,
    Commit,
    Push,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Open {
        path: PathBuf,
    },
    Clone {
        url: String,
        path: PathBuf,
        remote_name: String,
        branch: Option<String>,
    },
    AddRemote {
        path: PathBuf,
        name: String,
        url: String,
    },
    SetPushUrl {
        path: PathBuf,
        name: String,
        push_url: String,
    },
    Fetch {
        path: PathBuf,
        remote: String,
        user_name: String,
    },
    Merge {
        path: PathBuf,
        source: String,
    },
    CreateBranch {
        path: PathBuf,
        name: String,
        start_point: String,
    },
    Checkout {
        path: PathBuf,
        branch: String,
        mode: CheckoutMode,
    },
    SetUpstream {
        path: PathBuf,
        branch: String,
        remote: String,
    },
    Stage {
        path: PathBuf,
        paths: Vec<String>,
    },
    Commit {
        path: PathBuf,
        message: String,
        author: Signature,
    },
    Push {
        path: PathBuf,
        remote: String,
        branch: String,
    },
}

impl MockOperation {
    /// Working tree the operation ran against.
    pub fn path(&self) -> &Path {
        match self {
            MockOperation::Open { path }
            | MockOperation::Clone { path, .. }
            | MockOperation::AddRemote { path, .. }
            | MockOperation::SetPushUrl { path, .. }
            | MockOperation::Fetch { path, .. }
            | MockOperation::Merge { path, .. }
            | MockOperation::CreateBranch { path, .. }
            | MockOperation::Checkout { path, .. }
            | MockOperation::SetUpstream { path, .. }
            | MockOperation::Stage { path, .. }
            | MockOperation::Commit { path, .. }
            | MockOperation::Push { path, .. } => path,
        }
    }
}

/// A commit recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCommit {
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
    /// Whether the commit concluded a merge
    pub merge: bool,
}

/// State of one fake repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockRepoState {
    pub remotes: Vec<RemoteInfo>,
    pub local_branches: Vec<String>,
    /// Remote-tracking branches as friendly names (`origin/main`)
    pub remote_branches: Vec<String>,
    pub head: Option<String>,
    pub status: Vec<StatusEntry>,
    pub staged: Vec<String>,
    pub ahead: Option<usize>,
    /// Scripted merge outcomes by merge source; unscripted merges are up to date
    pub merge_results: HashMap<String, MergeOutcome>,
    pub merging: Option<String>,
    pub commits: Vec<MockCommit>,
    /// Upstream remote by local branch
    pub upstreams: HashMap<String, String>,
}

impl MockRepoState {
    /// A repository with one local branch checked out.
    pub fn on_branch(branch: &str) -> Self {
        Self {
            local_branches: vec![branch.to_string()],
            head: Some(branch.to_string()),
            ..Self::default()
        }
    }

    /// Add a remote with remote-tracking branches.
    pub fn with_remote(mut self, name: &str, url: &str, branches: &[&str]) -> Self {
        self.remotes.push(RemoteInfo {
            name: name.to_string(),
            url: Some(url.to_string()),
            push_url: None,
            fetch_refspecs: vec![format!("+refs/heads/*:refs/remotes/{}/*", name)],
        });
        self.remote_branches
            .extend(branches.iter().map(|b| format!("{}/{}", name, b)));
        self
    }

    /// Add local branches.
    pub fn with_local_branches(mut self, branches: &[&str]) -> Self {
        for branch in branches {
            if !self.local_branches.iter().any(|b| b == branch) {
                self.local_branches.push(branch.to_string());
            }
        }
        self
    }

    /// Add a status entry.
    pub fn with_change(mut self, path: &str, state: FileState) -> Self {
        self.status.push(StatusEntry::new(path, state));
        self
    }

    /// Set the ahead count reported for the current branch.
    pub fn with_ahead(mut self, ahead: usize) -> Self {
        self.ahead = Some(ahead);
        self
    }

    /// Script the outcome of merging `source`.
    pub fn with_merge_result(mut self, source: &str, outcome: MergeOutcome) -> Self {
        self.merge_results.insert(source.to_string(), outcome);
        self
    }

    /// Look up a remote by name.
    pub fn remote(&self, name: &str) -> Option<&RemoteInfo> {
        self.remotes.iter().find(|r| r.name == name)
    }

    fn has_local(&self, name: &str) -> bool {
        self.local_branches.iter().any(|b| b == name)
    }

    fn has_ref(&self, name: &str) -> bool {
        self.has_local(name) || self.remote_branches.iter().any(|b| b == name)
    }

    fn require_remote(&self, name: &str) -> Result<&RemoteInfo, GitError> {
        self.remote(name).ok_or_else(|| GitError::RemoteNotFound {
            name: name.to_string(),
        })
    }

    fn dirty(&self) -> bool {
        self.status
            .iter()
            .any(|e| !matches!(e.state, FileState::Ignored | FileState::Unaltered))
    }
}

impl MockEngine {
    /// Create an empty mock engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository at `path`.
    pub fn add_repo(&self, path: impl Into<PathBuf>, state: MockRepoState) {
        self.inner.lock().unwrap().repos.insert(path.into(), state);
    }

    /// Register a remote server publishing `branches` (the first is the default).
    pub fn add_server(&self, url: &str, branches: &[&str]) {
        self.inner.lock().unwrap().servers.insert(
            url.to_string(),
            branches.iter().map(|b| b.to_string()).collect(),
        );
    }

    /// Make `op` fail with `error` for the repository at `path`.
    pub fn fail_on(&self, path: impl Into<PathBuf>, op: GitOp, error: GitError) {
        self.inner.lock().unwrap().failures.push(Failure {
            path: path.into(),
            op,
            error,
        });
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failures.clear();
    }

    /// Snapshot of the repository at `path`.
    pub fn repo(&self, path: &Path) -> Option<MockRepoState> {
        self.inner.lock().unwrap().repos.get(path).cloned()
    }

    /// Branches a server currently publishes.
    pub fn server_branches(&self, url: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .servers
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }
}

impl MockEngineInner {
    fn check(&self, path: &Path, op: GitOp) -> Result<(), GitError> {
        match self
            .failures
            .iter()
            .find(|f| f.op == op && f.path == path)
        {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }

    fn state(&self, path: &Path) -> Result<&MockRepoState, GitError> {
        self.repos.get(path).ok_or_else(|| GitError::NotARepo {
            path: path.to_path_buf(),
        })
    }

    fn state_mut(&mut self, path: &Path) -> Result<&mut MockRepoState, GitError> {
        self.repos.get_mut(path).ok_or_else(|| GitError::NotARepo {
            path: path.to_path_buf(),
        })
    }
}

impl GitEngine for MockEngine {
    fn open(&self, path: &Path) -> Result<Box<dyn Repository>, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Open {
            path: path.to_path_buf(),
        });
        inner.check(path, GitOp::Open)?;
        inner.state(path)?;
        Ok(Box::new(MockRepository {
            path: path.to_path_buf(),
            inner: Arc::clone(&self.inner),
        }))
    }

    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        params: &CloneParams,
        _credentials: &Credentials,
    ) -> Result<Box<dyn Repository>, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Clone {
            url: url.to_string(),
            path: path.to_path_buf(),
            remote_name: params.remote_name.clone(),
            branch: params.branch.clone(),
        });
        inner.check(path, GitOp::Clone)?;

        if inner.repos.contains_key(path) {
            return Err(GitError::Internal {
                message: format!("destination '{}' already exists", path.display()),
            });
        }
        let branches = inner
            .servers
            .get(url)
            .cloned()
            .ok_or_else(|| GitError::Network {
                message: format!("repository '{}' not found", url),
            })?;

        let checkout = match &params.branch {
            Some(branch) if branches.contains(branch) => Some(branch.clone()),
            Some(branch) => {
                return Err(GitError::BranchNotFound {
                    name: branch.clone(),
                })
            }
            None => branches.first().cloned(),
        };

        let refs: Vec<&str> = branches.iter().map(String::as_str).collect();
        let mut state = MockRepoState::default().with_remote(&params.remote_name, url, &refs);
        if let Some(branch) = checkout {
            state.local_branches.push(branch.clone());
            state
                .upstreams
                .insert(branch.clone(), params.remote_name.clone());
            state.head = Some(branch);
            state.ahead = Some(0);
        }

        std::fs::create_dir_all(path).map_err(|e| GitError::Internal {
            message: format!("create {}: {}", path.display(), e),
        })?;
        inner.repos.insert(path.to_path_buf(), state);

        Ok(Box::new(MockRepository {
            path: path.to_path_buf(),
            inner: Arc::clone(&self.inner),
        }))
    }

    fn discover(&self, path: &Path) -> Option<PathBuf> {
        let inner = self.inner.lock().unwrap();
        path.ancestors()
            .find(|dir| inner.repos.contains_key(*dir))
            .map(Path::to_path_buf)
    }
}

/// Handle onto one fake repository.
#[derive(Debug)]
pub struct MockRepository {
    path: PathBuf,
    inner: Arc<Mutex<MockEngineInner>>,
}

impl Repository for MockRepository {
    fn work_dir(&self) -> &Path {
        &self.path
    }

    fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.state(&self.path)?.remotes.clone())
    }

    fn find_remote(&self, name: &str) -> Result<Option<RemoteInfo>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.state(&self.path)?.remote(name).cloned())
    }

    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::AddRemote {
            path: self.path.clone(),
            name: name.to_string(),
            url: url.to_string(),
        });
        inner.check(&self.path, GitOp::AddRemote)?;

        let state = inner.state_mut(&self.path)?;
        if state.remote(name).is_some() {
            return Err(GitError::Internal {
                message: format!("remote '{}' already exists", name),
            });
        }
        state.remotes.push(RemoteInfo {
            name: name.to_string(),
            url: Some(url.to_string()),
            push_url: None,
            fetch_refspecs: vec![format!("+refs/heads/*:refs/remotes/{}/*", name)],
        });
        Ok(())
    }

    fn set_push_url(&mut self, name: &str, push_url: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::SetPushUrl {
            path: self.path.clone(),
            name: name.to_string(),
            push_url: push_url.to_string(),
        });
        inner.check(&self.path, GitOp::SetPushUrl)?;

        let state = inner.state_mut(&self.path)?;
        let remote = state
            .remotes
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| GitError::RemoteNotFound {
                name: name.to_string(),
            })?;
        remote.push_url = Some(push_url.to_string());
        Ok(())
    }

    fn fetch(
        &mut self,
        remote: &str,
        _refspecs: &[String],
        credentials: &Credentials,
    ) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Fetch {
            path: self.path.clone(),
            remote: remote.to_string(),
            user_name: credentials.user_name.clone(),
        });
        inner.check(&self.path, GitOp::Fetch)?;

        let url = inner
            .state(&self.path)?
            .require_remote(remote)?
            .url
            .clone()
            .unwrap_or_default();
        let Some(published) = inner.servers.get(&url).cloned() else {
            return Ok(());
        };

        let prefix = format!("{}/", remote);
        let state = inner.state_mut(&self.path)?;
        state.remote_branches.retain(|b| !b.starts_with(&prefix));
        state
            .remote_branches
            .extend(published.iter().map(|b| format!("{}{}", prefix, b)));
        Ok(())
    }

    fn merge(&mut self, source: &str, _signature: &Signature) -> Result<MergeOutcome, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Merge {
            path: self.path.clone(),
            source: source.to_string(),
        });
        inner.check(&self.path, GitOp::Merge)?;

        let state = inner.state_mut(&self.path)?;
        if !state.has_ref(source) {
            return Err(GitError::BranchNotFound {
                name: source.to_string(),
            });
        }
        let outcome = state
            .merge_results
            .get(source)
            .cloned()
            .unwrap_or_else(|| MergeOutcome::with_status(MergeStatus::UpToDate));

        match outcome.status {
            MergeStatus::NonFastForward => state.merging = Some(source.to_string()),
            MergeStatus::Conflicts => {
                state.merging = Some(source.to_string());
                for path in &outcome.conflicted {
                    state.status.retain(|e| &e.path != path);
                    state
                        .status
                        .push(StatusEntry::new(path.as_str(), FileState::Conflicted));
                }
            }
            MergeStatus::UpToDate | MergeStatus::FastForward => {}
        }
        Ok(outcome)
    }

    fn branches(&self) -> Result<Vec<String>, GitError> {
        let inner = self.inner.lock().unwrap();
        let state = inner.state(&self.path)?;
        Ok(state
            .local_branches
            .iter()
            .chain(state.remote_branches.iter())
            .cloned()
            .collect())
    }

    fn local_branch_exists(&self, name: &str) -> Result<bool, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.state(&self.path)?.has_local(name))
    }

    fn head_branch(&self) -> Result<Option<String>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.state(&self.path)?.head.clone())
    }

    fn create_branch(&mut self, name: &str, start_point: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreateBranch {
            path: self.path.clone(),
            name: name.to_string(),
            start_point: start_point.to_string(),
        });
        inner.check(&self.path, GitOp::CreateBranch)?;

        let state = inner.state_mut(&self.path)?;
        if !state.has_ref(start_point) {
            return Err(GitError::BranchNotFound {
                name: start_point.to_string(),
            });
        }
        if state.has_local(name) {
            return Err(GitError::Internal {
                message: format!("branch '{}' already exists", name),
            });
        }
        state.local_branches.push(name.to_string());
        Ok(())
    }

    fn checkout_branch(&mut self, name: &str, mode: CheckoutMode) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Checkout {
            path: self.path.clone(),
            branch: name.to_string(),
            mode,
        });
        inner.check(&self.path, GitOp::Checkout)?;

        let state = inner.state_mut(&self.path)?;
        if !state.has_local(name) {
            return Err(GitError::BranchNotFound {
                name: name.to_string(),
            });
        }
        match mode {
            CheckoutMode::Safe if state.dirty() => {
                return Err(GitError::WorktreeConflict {
                    message: format!("local changes would be overwritten by checkout of {}", name),
                })
            }
            CheckoutMode::Safe => {}
            CheckoutMode::Force => {
                state.status.retain(|e| e.state == FileState::Ignored);
                state.staged.clear();
                state.merging = None;
            }
        }
        state.head = Some(name.to_string());
        Ok(())
    }

    fn set_upstream(&mut self, branch: &str, remote: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::SetUpstream {
            path: self.path.clone(),
            branch: branch.to_string(),
            remote: remote.to_string(),
        });
        inner.check(&self.path, GitOp::SetUpstream)?;

        let state = inner.state_mut(&self.path)?;
        state.require_remote(remote)?;
        state
            .upstreams
            .insert(branch.to_string(), remote.to_string());
        Ok(())
    }

    fn status(&self, options: &StatusOptions) -> Result<Vec<StatusEntry>, GitError> {
        let inner = self.inner.lock().unwrap();
        inner.check(&self.path, GitOp::Status)?;
        Ok(inner
            .state(&self.path)?
            .status
            .iter()
            .filter(|e| e.state != FileState::Unaltered)
            .filter(|e| options.include_ignored || e.state != FileState::Ignored)
            .cloned()
            .collect())
    }

    fn stage(&mut self, paths: &[String]) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Stage {
            path: self.path.clone(),
            paths: paths.to_vec(),
        });
        inner.check(&self.path, GitOp::Stage)?;

        let state = inner.state_mut(&self.path)?;
        for path in paths {
            if !state.staged.contains(path) {
                state.staged.push(path.clone());
            }
        }
        Ok(())
    }

    fn commit(
        &mut self,
        message: &str,
        author: &Signature,
        committer: &Signature,
    ) -> Result<String, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Commit {
            path: self.path.clone(),
            message: message.to_string(),
            author: author.clone(),
        });
        inner.check(&self.path, GitOp::Commit)?;

        let state = inner.state_mut(&self.path)?;
        let staged = std::mem::take(&mut state.staged);
        state.status.retain(|e| !staged.contains(&e.path));
        let merge = state.merging.take().is_some();
        if merge {
            state.status.retain(|e| e.state != FileState::Conflicted);
        }
        state.commits.push(MockCommit {
            message: message.to_string(),
            author: author.clone(),
            committer: committer.clone(),
            merge,
        });
        state.ahead = state.ahead.map(|n| n + 1);
        Ok(format!("{:040x}", state.commits.len()))
    }

    fn push(
        &mut self,
        remote: &str,
        branch: &str,
        _credentials: &Credentials,
    ) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Push {
            path: self.path.clone(),
            remote: remote.to_string(),
            branch: branch.to_string(),
        });
        inner.check(&self.path, GitOp::Push)?;

        let state = inner.state_mut(&self.path)?;
        if !state.has_local(branch) {
            return Err(GitError::BranchNotFound {
                name: branch.to_string(),
            });
        }
        let url = state
            .require_remote(remote)?
            .effective_push_url()
            .unwrap_or_default()
            .to_string();

        let tracking = format!("{}/{}", remote, branch);
        if !state.remote_branches.contains(&tracking) {
            state.remote_branches.push(tracking);
        }
        if state.head.as_deref() == Some(branch) {
            state.ahead = Some(0);
        }

        let published = inner.servers.entry(url).or_default();
        if !published.iter().any(|b| b == branch) {
            published.push(branch.to_string());
        }
        Ok(())
    }

    fn ahead_count(&self) -> Result<Option<usize>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.state(&self.path)?.ahead)
    }
}
