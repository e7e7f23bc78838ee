//! engine::orchestrator
//!
//! The orchestrator façade: the named workspace operations a host invokes.
//!
//! # Architecture
//!
//! The orchestrator owns the registry and, once a workspace is selected, a
//! [`Session`] holding the live [`WorkspaceConfig`] (with its cached
//! repository handles) and the [`WorkspacePolicy`] derived from it.
//!
//! Selection is an explicit transition: [`Orchestrator::select_workspace`]
//! re-derives the policy, applies the push-URL rule to every module, then
//! recomputes and returns the [`AggregatedState`] and notifies the host.
//!
//! # Command Lifecycle
//!
//! ```text
//! validate -> [host gate] -> worker { lock -> fan-out -> snapshot } -> notify
//! ```
//!
//! Validation failures abort before any module is touched. The fan-out runs
//! on a blocking worker; it holds the session mutex (in-process) and the
//! workspace lock file (cross-process) for its whole duration, so no two
//! commands interleave engine calls on the same handles.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use super::aggregate::{self, fan_out, AggregatedState, BatchReport, Operation};
use super::errors::{ModuleError, OrchestratorError, ValidationError};
use super::host::{DetachedHost, Host};
use super::log::{LogSink, TracingSink};
use super::module_ops::{self, CheckoutTarget, ModuleContext};
use crate::core::branches;
use crate::core::changes::ChangeRecord;
use crate::core::config::{Config, ModuleConfig, WorkspaceConfig, WorkspaceRegistry};
use crate::core::lock::WorkspaceLock;
use crate::core::paths::LockstepPaths;
use crate::core::policy::WorkspacePolicy;
use crate::git::{CheckoutMode, GitEngine};
use crate::store::{self, RegistryStore};

/// The selected workspace and its derived policy.
#[derive(Debug)]
pub struct Session {
    pub workspace: WorkspaceConfig,
    pub policy: WorkspacePolicy,
}

impl Session {
    fn new(workspace: WorkspaceConfig, password_override: Option<&str>) -> Self {
        let policy = derive_policy(&workspace, password_override);
        Self { workspace, policy }
    }
}

fn derive_policy(workspace: &WorkspaceConfig, password_override: Option<&str>) -> WorkspacePolicy {
    let mut policy = WorkspacePolicy::derive(workspace);
    if let Some(password) = password_override {
        policy.set_password(password);
    }
    policy
}

/// Inputs of a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Local branch; defaults to the remote branch without its remote prefix
    pub branch: Option<String>,
    /// Remote-tracking branch a missing local branch is created from
    pub remote_branch: String,
    /// Discard uncommitted local modifications while switching
    pub discard_local_changes: bool,
}

impl CheckoutRequest {
    /// A forced checkout of `remote_branch` into its default local name.
    pub fn new(remote_branch: impl Into<String>) -> Self {
        Self {
            branch: None,
            remote_branch: remote_branch.into(),
            discard_local_changes: true,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Refuse to switch over uncommitted modifications.
    pub fn safe(mut self) -> Self {
        self.discard_local_changes = false;
        self
    }

    fn target(self) -> Result<CheckoutTarget, ValidationError> {
        let remote_branch = self.remote_branch.trim().to_string();
        if remote_branch.is_empty() {
            return Err(ValidationError::Missing {
                field: "remote branch",
            });
        }
        let branch = match self.branch {
            Some(branch) => branch.trim().to_string(),
            None => branches::default_local_name(&remote_branch).to_string(),
        };
        if branch.is_empty() {
            return Err(ValidationError::Missing { field: "branch" });
        }
        let mode = if self.discard_local_changes {
            CheckoutMode::Force
        } else {
            CheckoutMode::Safe
        };
        Ok(CheckoutTarget {
            branch,
            remote_branch,
            mode,
        })
    }
}

/// Inputs of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    /// Label put in front of the message, `[<module>]`
    pub module: String,
    pub message: String,
}

impl CommitRequest {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            message: message.into(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.module.trim().is_empty() {
            return Err(ValidationError::Missing { field: "module" });
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::Missing { field: "message" });
        }
        Ok(())
    }
}

/// Result of a push request.
#[derive(Debug)]
pub enum PushOutcome {
    /// The host declined; no module was pushed.
    Skipped,
    Completed(BatchReport<()>),
}

impl PushOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PushOutcome::Skipped)
    }
}

/// Change records of the selected workspace plus their count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub records: Vec<ChangeRecord>,
    pub modified_count: usize,
}

/// The façade over registry, selection and workspace commands.
pub struct Orchestrator {
    engine: Arc<dyn GitEngine>,
    store: RegistryStore,
    paths: LockstepPaths,
    sink: Arc<dyn LogSink>,
    host: Arc<dyn Host>,
    registry: WorkspaceRegistry,
    session: Option<Arc<Mutex<Session>>>,
    password_override: Option<String>,
    state: AggregatedState,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("store", &self.store)
            .field("paths", &self.paths)
            .field("registry", &self.registry.names())
            .field("selected", &self.selected_name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator logging through `tracing` with no host hooks.
    pub fn new(engine: Arc<dyn GitEngine>, store: RegistryStore, paths: LockstepPaths) -> Self {
        Self {
            engine,
            store,
            paths,
            sink: Arc::new(TracingSink),
            host: Arc::new(DetachedHost),
            registry: WorkspaceRegistry::default(),
            session: None,
            password_override: None,
            state: AggregatedState::default(),
        }
    }

    /// Create an orchestrator over the documents and home named by `config`.
    pub fn from_config(engine: Arc<dyn GitEngine>, config: &Config) -> Self {
        Self::new(
            engine,
            RegistryStore::from_config(config),
            config.paths().clone(),
        )
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = host;
        self
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Load the registry document unless the registry is already populated.
    pub fn load_registry(&mut self) -> Result<&WorkspaceRegistry, OrchestratorError> {
        if self.store.load_into(&mut self.registry)? {
            debug!(workspaces = self.registry.len(), "registry loaded");
        }
        Ok(&self.registry)
    }

    pub fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }

    /// Register (or replace) a workspace.
    pub fn add_workspace(&mut self, workspace: WorkspaceConfig) -> Result<(), OrchestratorError> {
        self.load_registry()?;
        if workspace.name.trim().is_empty() {
            return Err(ValidationError::Missing { field: "name" }.into());
        }
        self.registry.upsert(workspace);
        Ok(())
    }

    /// Save the registry, including the selected workspace's live state.
    pub fn save_registry(&mut self) -> Result<PathBuf, OrchestratorError> {
        if let Some(session) = &self.session {
            lock_session(session).workspace.recompute_local_paths();
        }
        self.sync_session_into_registry();
        Ok(self.store.save_registry(&mut self.registry)?)
    }

    /// Save the selected workspace to the single-workspace document and
    /// update its registry entry.
    pub fn save_config(&mut self) -> Result<PathBuf, OrchestratorError> {
        let session = self.require_session()?;
        let (path, workspace) = {
            let mut session = lock_session(&session);
            let path = self.store.save_workspace(&mut session.workspace)?;
            (path, session.workspace.clone())
        };
        self.registry.upsert(workspace);
        Ok(path)
    }

    fn sync_session_into_registry(&mut self) {
        if let Some(workspace) = self.workspace() {
            self.registry.upsert(workspace);
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select the registry workspace named `name`.
    pub async fn select_workspace(&mut self, name: &str) -> Result<AggregatedState, OrchestratorError> {
        self.load_registry()?;
        let workspace = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::WorkspaceNotFound {
                name: name.to_string(),
            })?;
        self.select_workspace_config(workspace).await
    }

    /// Select the workspace owning `path`.
    pub async fn select_by_path(&mut self, path: &Path) -> Result<AggregatedState, OrchestratorError> {
        self.load_registry()?;
        let workspace = store::resolve_for_path(self.engine.as_ref(), &self.registry, path)
            .cloned()
            .ok_or_else(|| OrchestratorError::NoWorkspaceForPath {
                path: path.to_path_buf(),
            })?;
        self.select_workspace_config(workspace).await
    }

    /// Select the workspace owning the host's current project folder.
    ///
    /// Returns `None` when the host has no folder open.
    pub async fn select_for_host_folder(
        &mut self,
    ) -> Result<Option<AggregatedState>, OrchestratorError> {
        let Some(folder) = self.host.current_project_folder() else {
            return Ok(None);
        };
        self.select_by_path(&folder).await.map(Some)
    }

    /// Make `workspace` the selection.
    ///
    /// The previous selection's live state is written back to the registry.
    pub async fn select_workspace_config(
        &mut self,
        workspace: WorkspaceConfig,
    ) -> Result<AggregatedState, OrchestratorError> {
        self.sync_session_into_registry();
        info!(workspace = %workspace.name, "selecting workspace");

        let session = Session::new(workspace, self.password_override.as_deref());
        self.session = Some(Arc::new(Mutex::new(session)));

        self.dispatch(Operation::Select, |ctx, modules| {
            fan_out(ctx, modules, Operation::Select, |ctx, module| {
                match module_ops::apply_policy(ctx, module) {
                    // Not cloned yet; the rule is applied by clone.
                    Err(ModuleError::PathMissing { .. }) => Ok(false),
                    other => other,
                }
            })
        })
        .await?;
        Ok(self.state.clone())
    }

    /// Name of the selected workspace.
    pub fn selected_name(&self) -> Option<String> {
        self.with_session(|s| s.workspace.name.clone())
    }

    /// Copy of the selected workspace (repository handles closed).
    pub fn workspace(&self) -> Option<WorkspaceConfig> {
        self.with_session(|s| s.workspace.clone())
    }

    /// State recomputed after the last command.
    pub fn state(&self) -> &AggregatedState {
        &self.state
    }

    /// Password presented to remotes instead of the stored one.
    pub fn set_password(&mut self, password: impl Into<String>) {
        let password = password.into();
        if let Some(session) = &self.session {
            lock_session(session).policy.set_password(password.clone());
        }
        self.password_override = Some(password);
    }

    fn with_session<T>(&self, f: impl FnOnce(&Session) -> T) -> Option<T> {
        self.session.as_ref().map(|s| f(&lock_session(s)))
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub async fn clone(&mut self) -> Result<BatchReport<()>, OrchestratorError> {
        self.validate_modules()?;
        self.dispatch(Operation::Clone, |ctx, modules| {
            fan_out(ctx, modules, Operation::Clone, module_ops::clone)
        })
        .await
    }

    pub async fn fetch(&mut self) -> Result<BatchReport<()>, OrchestratorError> {
        self.validate_modules()?;
        self.dispatch(Operation::Fetch, |ctx, modules| {
            fan_out(ctx, modules, Operation::Fetch, module_ops::fetch)
        })
        .await
    }

    pub async fn pull(&mut self) -> Result<BatchReport<()>, OrchestratorError> {
        self.validate_modules()?;
        self.dispatch(Operation::Pull, |ctx, modules| {
            fan_out(ctx, modules, Operation::Pull, module_ops::pull)
        })
        .await
    }

    /// Merge `source` into every module's current branch.
    pub async fn merge(&mut self, source: &str) -> Result<BatchReport<()>, OrchestratorError> {
        let source = source.trim().to_string();
        if source.is_empty() {
            return Err(ValidationError::Missing {
                field: "source branch",
            }
            .into());
        }
        self.validate_modules()?;
        self.dispatch(Operation::Merge, move |ctx, modules| {
            fan_out(ctx, modules, Operation::Merge, |ctx, module| {
                module_ops::merge(ctx, module, &source)
            })
        })
        .await
    }

    /// Switch every module to the requested branch.
    ///
    /// The workspace branch follows only when every module switched.
    pub async fn checkout(
        &mut self,
        request: CheckoutRequest,
    ) -> Result<BatchReport<()>, OrchestratorError> {
        let target = request.target()?;
        self.validate_modules()?;

        let branch = target.branch.clone();
        let report = self
            .dispatch(Operation::Checkout, move |ctx, modules| {
                fan_out(ctx, modules, Operation::Checkout, |ctx, module| {
                    module_ops::checkout(ctx, module, &target)
                })
            })
            .await?;

        if report.all_succeeded() {
            let password = self.password_override.clone();
            if let Some(session) = &self.session {
                let mut session = lock_session(session);
                session.workspace.branch_name = branch;
                session.policy = derive_policy(&session.workspace, password.as_deref());
            }
        }
        Ok(report)
    }

    /// Commit every module's changes as `"[<module>] <message>"`.
    ///
    /// Each result holds the new commit id, or `None` for a clean module.
    pub async fn commit(
        &mut self,
        request: CommitRequest,
    ) -> Result<BatchReport<Option<String>>, OrchestratorError> {
        request.validate()?;
        self.require_session()?;
        let CommitRequest { module, message } = request;
        self.dispatch(Operation::Commit, move |ctx, modules| {
            fan_out(ctx, modules, Operation::Commit, |ctx, m| {
                module_ops::commit(ctx, m, &module, &message)
            })
        })
        .await
    }

    /// Push every module's workspace branch, if the host allows it.
    pub async fn push(&mut self) -> Result<PushOutcome, OrchestratorError> {
        self.validate_modules()?;
        let workspace = self.workspace().ok_or(OrchestratorError::NoWorkspaceSelected)?;

        if !self.host.before_push(&workspace).await {
            self.sink.write_line(&format!(
                "Push skipped: host declined push of {}",
                workspace.name
            ));
            return Ok(PushOutcome::Skipped);
        }

        let report = self
            .dispatch(Operation::Push, |ctx, modules| {
                fan_out(ctx, modules, Operation::Push, module_ops::push)
            })
            .await?;
        Ok(PushOutcome::Completed(report))
    }

    /// Recompute the summed ahead count.
    pub async fn refresh_ahead_count(&mut self) -> Result<usize, OrchestratorError> {
        self.dispatch(Operation::RefreshAheadCount, |_, _| ()).await?;
        Ok(self.state.ahead_count)
    }

    /// Recompute the change records.
    pub async fn refresh_changes(&mut self) -> Result<ChangeSummary, OrchestratorError> {
        self.dispatch(Operation::RefreshChanges, |_, _| ()).await?;
        Ok(ChangeSummary {
            records: self.state.changes.clone(),
            modified_count: self.state.modified_count(),
        })
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn require_session(&self) -> Result<Arc<Mutex<Session>>, OrchestratorError> {
        self.session
            .clone()
            .ok_or(OrchestratorError::NoWorkspaceSelected)
    }

    /// Every module must name its primary remote and its URL.
    fn validate_modules(&self) -> Result<(), OrchestratorError> {
        let session = self.require_session()?;
        let session = lock_session(&session);
        for module in &session.workspace.modules {
            validate_module(module)?;
        }
        Ok(())
    }

    /// Run `op` on the worker, then recompute state and notify the host.
    async fn dispatch<T, F>(&mut self, operation: Operation, op: F) -> Result<T, OrchestratorError>
    where
        T: Send + 'static,
        F: FnOnce(&ModuleContext<'_>, &mut [ModuleConfig]) -> T + Send + 'static,
    {
        let session = self.require_session()?;
        let engine = Arc::clone(&self.engine);
        let sink = Arc::clone(&self.sink);
        let paths = self.paths.clone();

        let worker = tokio::task::spawn_blocking(move || {
            let mut guard = lock_session(&session);
            let _lock = WorkspaceLock::acquire(&paths, &guard.workspace.name)?;

            let Session { workspace, policy } = &mut *guard;
            let WorkspaceConfig {
                name,
                branch_name,
                root_path,
                modules,
                ..
            } = workspace;
            let ctx = ModuleContext {
                engine: engine.as_ref(),
                policy,
                sink: sink.as_ref(),
                workspace: name,
                branch: branch_name,
                root_path,
            };

            debug!(%operation, workspace = %ctx.workspace, modules = modules.len(), "dispatch");
            let value = op(&ctx, modules);
            let state = aggregate::snapshot(&ctx, modules);
            Ok::<_, OrchestratorError>((value, state))
        });

        let (value, state) = worker
            .await
            .map_err(|e| OrchestratorError::Worker(e.to_string()))??;
        self.state = state;

        if let Some(workspace) = self.workspace() {
            self.host.on_config_changed(&workspace, &self.state).await;
        }
        Ok(value)
    }
}

fn validate_module(module: &ModuleConfig) -> Result<(), ValidationError> {
    let missing = |field| ValidationError::ModuleField {
        module: module.repo_name.clone(),
        field,
    };
    if module.repo_name.trim().is_empty() {
        return Err(missing("repository name"));
    }
    if module.primary_remote_name.trim().is_empty() {
        return Err(missing("primary remote name"));
    }
    if module.primary_remote_url.trim().is_empty() {
        return Err(missing("primary remote url"));
    }
    if module.secondary_name().is_some() && module.secondary_url().is_none() {
        return Err(missing("secondary remote url"));
    }
    Ok(())
}

fn lock_session(session: &Mutex<Session>) -> std::sync::MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
