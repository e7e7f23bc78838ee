//! core::config::schema
//!
//! Workspace, module and settings schema types.
//!
//! # Registry Document
//!
//! The registry is a JSON array of [`WorkspaceConfig`] records, each embedding
//! its ordered module list:
//!
//! ```json
//! [
//!   {
//!     "name": "product",
//!     "branch_name": "main",
//!     "root_path": "/work/product",
//!     "user_name": "octo",
//!     "email": "octo@example.com",
//!     "password": "",
//!     "modules": [
//!       {
//!         "repo_name": "framework",
//!         "local_path": "/work/product/framework",
//!         "primary_remote_name": "origin",
//!         "primary_remote_url": "https://example.com/me/framework.git",
//!         "secondary_remote_name": "team",
//!         "secondary_remote_url": "https://example.com/team/framework.git",
//!         "known_branches": ["main", "origin/main", "team/main"]
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! # Validation
//!
//! Workspace names must be non-empty and unique within a registry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::git::{GitEngine, GitError, Repository};

// =============================================================================
// Repository handle
// =============================================================================

/// Lazily opened repository handle owned by one module configuration.
///
/// Opened at most once and reused until the configuration is dropped.
/// Cloning a configuration never shares the handle: the clone starts closed.
///
/// Repositories are `Send` but not `Sync`. The mutex keeps configurations
/// `Sync`; mutating access goes through `&mut self` and [`Mutex::get_mut`],
/// so it is never contended.
#[derive(Default)]
pub struct RepoHandle(Mutex<Option<Box<dyn Repository>>>);

impl RepoHandle {
    fn slot(&mut self) -> &mut Option<Box<dyn Repository>> {
        self.0.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a repository is currently open.
    pub fn is_open(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Return the open repository, opening `path` with `engine` first if needed.
    pub fn get_or_open(
        &mut self,
        engine: &dyn GitEngine,
        path: &Path,
    ) -> Result<&mut dyn Repository, GitError> {
        let slot = self.slot();
        let repo = match slot.take() {
            Some(repo) => repo,
            None => engine.open(path)?,
        };
        Ok(slot.insert(repo).as_mut())
    }

    /// Replace the cached handle (used after a clone produced a fresh one).
    pub fn set(&mut self, repo: Box<dyn Repository>) -> &mut dyn Repository {
        self.slot().insert(repo).as_mut()
    }

    /// Drop the cached handle.
    pub fn close(&mut self) {
        *self.slot() = None;
    }
}

impl Clone for RepoHandle {
    fn clone(&self) -> Self {
        Self(Mutex::new(None))
    }
}

impl PartialEq for RepoHandle {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl fmt::Debug for RepoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_lock().as_deref() {
            Ok(Some(repo)) => write!(f, "RepoHandle(open: {})", repo.work_dir().display()),
            Ok(None) => f.write_str("RepoHandle(closed)"),
            Err(_) => f.write_str("RepoHandle(busy)"),
        }
    }
}

// =============================================================================
// Module
// =============================================================================

/// One local git checkout within a workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModuleConfig {
    /// Repository name; also the directory name under the workspace root
    pub repo_name: String,

    /// Working tree path (recomputed as `root_path/repo_name` on save)
    pub local_path: PathBuf,

    /// Primary remote name (push target)
    pub primary_remote_name: String,

    /// Primary remote URL
    pub primary_remote_url: String,

    /// Secondary ("team") remote name
    pub secondary_remote_name: Option<String>,

    /// Secondary remote fetch URL
    pub secondary_remote_url: Option<String>,

    /// Friendly names of the module's local and remote-tracking branches
    pub known_branches: Vec<String>,

    #[serde(skip)]
    pub handle: RepoHandle,
}

impl ModuleConfig {
    /// Create a module with a primary remote.
    pub fn new(
        repo_name: impl Into<String>,
        primary_remote_name: impl Into<String>,
        primary_remote_url: impl Into<String>,
    ) -> Self {
        Self {
            repo_name: repo_name.into(),
            primary_remote_name: primary_remote_name.into(),
            primary_remote_url: primary_remote_url.into(),
            ..Self::default()
        }
    }

    /// Builder-style secondary remote.
    pub fn with_secondary(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.secondary_remote_name = Some(name.into());
        self.secondary_remote_url = Some(url.into());
        self
    }

    /// Builder-style local path.
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = path.into();
        self
    }

    /// Secondary remote name, when one is configured (non-blank).
    pub fn secondary_name(&self) -> Option<&str> {
        self.secondary_remote_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Secondary remote URL, when non-blank.
    pub fn secondary_url(&self) -> Option<&str> {
        self.secondary_remote_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

// =============================================================================
// Workspace
// =============================================================================

/// One logical multi-module workspace.
///
/// All modules are kept on `branch_name`.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Unique workspace name
    pub name: String,

    /// Active branch for every module
    pub branch_name: String,

    /// Directory holding every module checkout
    pub root_path: PathBuf,

    /// User name for authentication and commit signatures
    pub user_name: String,

    /// Email for commit signatures
    pub email: String,

    /// Password or token presented to every remote
    pub password: String,

    /// Modules in fan-out order
    pub modules: Vec<ModuleConfig>,
}

impl fmt::Debug for WorkspaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceConfig")
            .field("name", &self.name)
            .field("branch_name", &self.branch_name)
            .field("root_path", &self.root_path)
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("modules", &self.modules)
            .finish()
    }
}

impl WorkspaceConfig {
    /// Create an empty workspace.
    pub fn new(name: impl Into<String>, branch_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branch_name: branch_name.into(),
            ..Self::default()
        }
    }

    /// Find a module by repository name.
    pub fn module(&self, repo_name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.repo_name == repo_name)
    }

    /// Recompute every module's `local_path` as `root_path/repo_name`.
    ///
    /// Modules without a repository name keep their path.
    pub fn recompute_local_paths(&mut self) {
        for module in &mut self.modules {
            if !module.repo_name.is_empty() {
                module.local_path = self.root_path.join(&module.repo_name);
            }
        }
    }

    /// Whether any module's `local_path` equals `path`.
    pub fn contains_module_path(&self, path: &Path) -> bool {
        self.modules
            .iter()
            .any(|m| !m.local_path.as_os_str().is_empty() && m.local_path == path)
    }

    /// Close every cached repository handle.
    pub fn close_handles(&mut self) {
        for module in &mut self.modules {
            module.handle.close();
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Ordered collection of workspaces, unique by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct WorkspaceRegistry {
    workspaces: Vec<WorkspaceConfig>,
}

impl WorkspaceRegistry {
    /// Create a registry from workspaces.
    pub fn new(workspaces: Vec<WorkspaceConfig>) -> Self {
        Self { workspaces }
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkspaceConfig> {
        self.workspaces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WorkspaceConfig> {
        self.workspaces.iter_mut()
    }

    /// Workspace names in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.workspaces.iter().map(|w| w.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&WorkspaceConfig> {
        self.workspaces.iter().find(|w| w.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut WorkspaceConfig> {
        self.workspaces.iter_mut().find(|w| w.name == name)
    }

    /// Insert a workspace, replacing any workspace with the same name in place.
    pub fn upsert(&mut self, workspace: WorkspaceConfig) {
        match self.get_mut(&workspace.name) {
            Some(existing) => *existing = workspace,
            None => self.workspaces.push(workspace),
        }
    }

    /// Remove a workspace by name.
    pub fn remove(&mut self, name: &str) -> Option<WorkspaceConfig> {
        let index = self.workspaces.iter().position(|w| w.name == name)?;
        Some(self.workspaces.remove(index))
    }

    /// First workspace with a module checked out at `path`.
    pub fn find_by_module_path(&self, path: &Path) -> Option<&WorkspaceConfig> {
        self.workspaces.iter().find(|w| w.contains_module_path(path))
    }

    /// Recompute module paths of every workspace.
    pub fn recompute_local_paths(&mut self) {
        for workspace in &mut self.workspaces {
            workspace.recompute_local_paths();
        }
    }

    /// Check that names are non-empty and unique.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending workspace.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for workspace in &self.workspaces {
            if workspace.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "workspace name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(workspace.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate workspace name '{}'",
                    workspace.name
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Application settings (`config.toml` in the Lockstep home).
///
/// # Example
///
/// ```toml
/// registry_file = "workspaces.json"
/// workspace_file = "workspace.json"
/// default_workspace = "product"
/// push_gate = "cargo build --release"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Registry file (relative to the home directory unless absolute)
    pub registry_file: Option<PathBuf>,

    /// Single-workspace file (relative to the home directory unless absolute)
    pub workspace_file: Option<PathBuf>,

    /// Workspace selected when no `--workspace`/`--path` is given
    pub default_workspace: Option<String>,

    /// Shell command that must succeed before a push proceeds
    pub push_gate: Option<String>,
}

impl Settings {
    /// Validate the settings values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let blank_path = |p: &Option<PathBuf>| p.as_ref().is_some_and(|p| p.as_os_str().is_empty());
        if blank_path(&self.registry_file) {
            return Err(ConfigError::InvalidValue(
                "registry_file cannot be empty".to_string(),
            ));
        }
        if blank_path(&self.workspace_file) {
            return Err(ConfigError::InvalidValue(
                "workspace_file cannot be empty".to_string(),
            ));
        }
        if self
            .default_workspace
            .as_ref()
            .is_some_and(|w| w.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue(
                "default_workspace cannot be empty".to_string(),
            ));
        }
        if self.push_gate.as_ref().is_some_and(|g| g.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "push_gate cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workspace() -> WorkspaceConfig {
        let mut ws = WorkspaceConfig::new("product", "main");
        ws.root_path = PathBuf::from("/work/product");
        ws.user_name = "octo".to_string();
        ws.email = "octo@example.com".to_string();
        ws.password = "hunter2".to_string();
        ws.modules = vec![
            ModuleConfig::new("framework", "origin", "https://example.com/me/framework.git")
                .with_secondary("team", "https://example.com/team/framework.git"),
            ModuleConfig::new("tools", "origin", "https://example.com/me/tools.git"),
        ];
        ws
    }

    mod workspace {
        use super::*;

        #[test]
        fn debug_redacts_password() {
            let rendered = format!("{:?}", sample_workspace());
            assert!(!rendered.contains("hunter2"));
            assert!(rendered.contains("[REDACTED]"));
        }

        #[test]
        fn recompute_local_paths() {
            let mut ws = sample_workspace();
            ws.modules[0].local_path = PathBuf::from("/stale");
            ws.recompute_local_paths();
            assert_eq!(
                ws.modules[0].local_path,
                PathBuf::from("/work/product/framework")
            );
            assert_eq!(ws.modules[1].local_path, PathBuf::from("/work/product/tools"));
        }

        #[test]
        fn contains_module_path_ignores_empty_paths() {
            let ws = sample_workspace();
            assert!(!ws.contains_module_path(Path::new("")));
        }

        #[test]
        fn password_is_serialized() {
            let json = serde_json::to_string(&sample_workspace()).unwrap();
            assert!(json.contains("hunter2"));
            assert!(!json.contains("handle"));
        }
    }

    mod module {
        use super::*;

        #[test]
        fn blank_secondary_is_not_configured() {
            let mut module = ModuleConfig::new("a", "origin", "u");
            assert_eq!(module.secondary_name(), None);

            module.secondary_remote_name = Some("   ".to_string());
            assert_eq!(module.secondary_name(), None);

            module.secondary_remote_name = Some("team".to_string());
            assert_eq!(module.secondary_name(), Some("team"));
        }

        #[test]
        fn clone_starts_with_closed_handle() {
            let module = ModuleConfig::new("a", "origin", "u");
            let copy = module.clone();
            assert!(!copy.handle.is_open());
            assert_eq!(format!("{:?}", copy.handle), "RepoHandle(closed)");
        }
    }

    mod registry {
        use super::*;

        #[test]
        fn upsert_replaces_in_place() {
            let mut registry = WorkspaceRegistry::default();
            registry.upsert(WorkspaceConfig::new("a", "main"));
            registry.upsert(WorkspaceConfig::new("b", "main"));
            registry.upsert(WorkspaceConfig::new("a", "dev"));

            assert_eq!(registry.names(), vec!["a", "b"]);
            assert_eq!(registry.get("a").unwrap().branch_name, "dev");
        }

        #[test]
        fn remove_by_name() {
            let mut registry = WorkspaceRegistry::new(vec![
                WorkspaceConfig::new("a", "main"),
                WorkspaceConfig::new("b", "main"),
            ]);
            assert!(registry.remove("a").is_some());
            assert!(registry.remove("a").is_none());
            assert_eq!(registry.names(), vec!["b"]);
        }

        #[test]
        fn find_by_any_module_path() {
            let mut ws = sample_workspace();
            ws.recompute_local_paths();
            let registry = WorkspaceRegistry::new(vec![WorkspaceConfig::new("other", "main"), ws]);

            let found = registry
                .find_by_module_path(Path::new("/work/product/tools"))
                .unwrap();
            assert_eq!(found.name, "product");
            assert!(registry
                .find_by_module_path(Path::new("/work/product"))
                .is_none());
        }

        #[test]
        fn validate_rejects_duplicates_and_blank_names() {
            let dup = WorkspaceRegistry::new(vec![
                WorkspaceConfig::new("a", "main"),
                WorkspaceConfig::new("a", "dev"),
            ]);
            assert!(matches!(dup.validate(), Err(ConfigError::InvalidValue(_))));

            let blank = WorkspaceRegistry::new(vec![WorkspaceConfig::new(" ", "main")]);
            assert!(blank.validate().is_err());

            let ok = WorkspaceRegistry::new(vec![sample_workspace()]);
            assert!(ok.validate().is_ok());
        }

        #[test]
        fn serializes_as_plain_array() {
            let registry = WorkspaceRegistry::new(vec![WorkspaceConfig::new("a", "main")]);
            let json = serde_json::to_value(&registry).unwrap();
            assert!(json.is_array());
        }
    }

    mod settings {
        use super::*;

        #[test]
        fn parse_full() {
            let settings: Settings = toml::from_str(
                r#"
                registry_file = "reg.json"
                default_workspace = "product"
                push_gate = "make check"
                "#,
            )
            .unwrap();
            assert_eq!(settings.registry_file, Some(PathBuf::from("reg.json")));
            assert_eq!(settings.push_gate.as_deref(), Some("make check"));
            assert!(settings.validate().is_ok());
        }

        #[test]
        fn unknown_fields_rejected() {
            let result: Result<Settings, _> = toml::from_str("colour = true");
            assert!(result.is_err());
        }

        #[test]
        fn blank_gate_rejected() {
            let settings = Settings {
                push_gate: Some(" ".to_string()),
                ..Default::default()
            };
            assert!(settings.validate().is_err());
        }
    }

    mod handle {
        use super::*;
        use crate::git::mock::{GitOp, MockEngine, MockRepoState};

        fn assert_send_sync<T: Send + Sync>() {}

        #[test]
        fn configurations_are_shareable_across_tasks() {
            assert_send_sync::<RepoHandle>();
            assert_send_sync::<ModuleConfig>();
            assert_send_sync::<WorkspaceConfig>();
        }

        #[test]
        fn opened_once_then_reused() {
            let engine = MockEngine::new();
            engine.add_repo("/ws/fw", MockRepoState::on_branch("main"));
            let mut handle = RepoHandle::default();
            assert!(!handle.is_open());

            handle.get_or_open(&engine, Path::new("/ws/fw")).unwrap();
            assert!(handle.is_open());
            assert!(format!("{:?}", handle).contains("/ws/fw"));

            // Opening again would fail; the cached handle is reused instead.
            engine.fail_on("/ws/fw", GitOp::Open, GitError::BareRepo);
            let repo = handle.get_or_open(&engine, Path::new("/ws/fw")).unwrap();
            assert_eq!(repo.head_branch().unwrap().as_deref(), Some("main"));

            handle.close();
            assert!(!handle.is_open());
            assert!(handle.clone().get_or_open(&engine, Path::new("/ws/fw")).is_err());
        }
    }
}
