//! store
//!
//! Configuration store adapter: registry and single-workspace documents.
//!
//! # Architecture
//!
//! Both documents are pretty-printed JSON written atomically. The registry
//! holds every workspace; the single-workspace document holds one (the
//! active selection, for callers that only persist that).
//!
//! Module `local_path`s are derived: every save recomputes them as
//! `root_path/repo_name` before serializing.
//!
//! # Path Resolution
//!
//! [`resolve_for_path`] maps a filesystem path to the workspace owning it.
//! An exact module path match wins; otherwise the git engine discovers the
//! enclosing working tree and that is matched again.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::config::{write_atomic, Config, ConfigError, WorkspaceConfig, WorkspaceRegistry};
use crate::git::GitEngine;

/// Reads and writes the workspace documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStore {
    registry_path: PathBuf,
    workspace_path: PathBuf,
}

impl RegistryStore {
    /// Create a store over explicit document paths.
    pub fn new(registry_path: impl Into<PathBuf>, workspace_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            workspace_path: workspace_path.into(),
        }
    }

    /// Create a store over the document paths named by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.registry_path(), config.workspace_path())
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    /// Load the registry document.
    ///
    /// A missing document yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read, parsed,
    /// or fails validation.
    pub fn load(&self) -> Result<WorkspaceRegistry, ConfigError> {
        let Some(contents) = read_optional(&self.registry_path)? else {
            debug!(path = %self.registry_path.display(), "no registry document");
            return Ok(WorkspaceRegistry::default());
        };

        let registry: WorkspaceRegistry =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: self.registry_path.clone(),
                message: e.to_string(),
            })?;
        registry.validate()?;

        debug!(
            path = %self.registry_path.display(),
            workspaces = registry.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Load the registry into `registry` unless it is already populated.
    ///
    /// Returns whether a load happened.
    pub fn load_into(&self, registry: &mut WorkspaceRegistry) -> Result<bool, ConfigError> {
        if !registry.is_empty() {
            return Ok(false);
        }
        *registry = self.load()?;
        Ok(true)
    }

    /// Save the registry, recomputing module paths first.
    pub fn save_registry(&self, registry: &mut WorkspaceRegistry) -> Result<PathBuf, ConfigError> {
        registry.validate()?;
        registry.recompute_local_paths();

        let contents = serde_json::to_string_pretty(registry)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        write_atomic(&self.registry_path, &contents)?;

        debug!(path = %self.registry_path.display(), "registry saved");
        Ok(self.registry_path.clone())
    }

    /// Save one workspace to the single-workspace document.
    pub fn save_workspace(&self, workspace: &mut WorkspaceConfig) -> Result<PathBuf, ConfigError> {
        workspace.recompute_local_paths();

        let contents = serde_json::to_string_pretty(workspace)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        write_atomic(&self.workspace_path, &contents)?;

        debug!(path = %self.workspace_path.display(), workspace = %workspace.name, "workspace saved");
        Ok(self.workspace_path.clone())
    }

    /// Load the single-workspace document, if present.
    pub fn load_workspace(&self) -> Result<Option<WorkspaceConfig>, ConfigError> {
        let Some(contents) = read_optional(&self.workspace_path)? else {
            return Ok(None);
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                path: self.workspace_path.clone(),
                message: e.to_string(),
            })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// The workspace owning `path`.
///
/// Matches module paths exactly first, then retries with the working tree
/// `engine` discovers around `path`.
pub fn resolve_for_path<'a>(
    engine: &dyn GitEngine,
    registry: &'a WorkspaceRegistry,
    path: &Path,
) -> Option<&'a WorkspaceConfig> {
    if let Some(workspace) = registry.find_by_module_path(path) {
        return Some(workspace);
    }
    let work_tree = engine.discover(path)?;
    debug!(path = %path.display(), work_tree = %work_tree.display(), "discovered work tree");
    registry.find_by_module_path(&work_tree).or_else(|| {
        let work_tree = work_tree.canonicalize().unwrap_or(work_tree);
        // Registries written on another machine may hold non-canonical paths.
        registry.iter().find(|w| {
            w.modules.iter().any(|m| {
                m.local_path
                    .canonicalize()
                    .map(|p| p == work_tree)
                    .unwrap_or(false)
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ModuleConfig;
    use tempfile::TempDir;

    fn store(dir: &Path) -> RegistryStore {
        RegistryStore::new(dir.join("workspaces.json"), dir.join("workspace.json"))
    }

    fn workspace(root: &Path) -> WorkspaceConfig {
        let mut ws = WorkspaceConfig::new("product", "main");
        ws.root_path = root.to_path_buf();
        ws.modules = vec![
            ModuleConfig::new("framework", "origin", "https://example.com/me/fw.git")
                .with_secondary("team", "https://example.com/team/fw.git"),
            ModuleConfig::new("tools", "origin", "https://example.com/me/tools.git"),
        ];
        ws
    }

    #[test]
    fn missing_registry_is_empty() {
        let temp = TempDir::new().unwrap();
        let registry = store(temp.path()).load().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn save_recomputes_local_paths() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        let mut ws = workspace(Path::new("/work/product"));
        ws.modules[0].local_path = PathBuf::from("/old/place");
        let mut registry = WorkspaceRegistry::new(vec![ws]);

        store.save_registry(&mut registry).unwrap();
        let loaded = store.load().unwrap();

        let fw = loaded.get("product").unwrap().module("framework").unwrap();
        assert_eq!(fw.local_path, PathBuf::from("/work/product/framework"));
        assert_eq!(fw.secondary_name(), Some("team"));
    }

    #[test]
    fn load_into_only_when_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        let mut saved = WorkspaceRegistry::new(vec![workspace(Path::new("/w"))]);
        store.save_registry(&mut saved).unwrap();

        let mut registry = WorkspaceRegistry::default();
        assert!(store.load_into(&mut registry).unwrap());
        assert_eq!(registry.names(), vec!["product"]);

        let mut populated = WorkspaceRegistry::new(vec![WorkspaceConfig::new("mine", "dev")]);
        assert!(!store.load_into(&mut populated).unwrap());
        assert_eq!(populated.names(), vec!["mine"]);
    }

    #[test]
    fn duplicate_names_are_not_saved() {
        let temp = TempDir::new().unwrap();
        let mut registry = WorkspaceRegistry::new(vec![
            WorkspaceConfig::new("a", "main"),
            WorkspaceConfig::new("a", "dev"),
        ]);
        assert!(store(temp.path()).save_registry(&mut registry).is_err());
    }

    #[test]
    fn corrupt_registry_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("workspaces.json"), "{ not json").unwrap();
        let result = store(temp.path()).load();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn single_workspace_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        assert!(store.load_workspace().unwrap().is_none());

        let mut ws = workspace(Path::new("/work/product"));
        store.save_workspace(&mut ws).unwrap();

        let loaded = store.load_workspace().unwrap().unwrap();
        assert_eq!(loaded.name, "product");
        assert_eq!(loaded.modules.len(), 2);
        assert_eq!(
            loaded.modules[1].local_path,
            PathBuf::from("/work/product/tools")
        );
    }

    mod resolve {
        use super::*;
        use crate::git::mock::{MockEngine, MockRepoState};

        #[test]
        fn exact_module_path() {
            let mut ws = workspace(Path::new("/work/product"));
            ws.recompute_local_paths();
            let registry = WorkspaceRegistry::new(vec![ws]);

            let found = resolve_for_path(
                &MockEngine::new(),
                &registry,
                Path::new("/work/product/tools"),
            );
            assert_eq!(found.map(|w| w.name.as_str()), Some("product"));
        }

        #[test]
        fn subdirectory_resolves_through_discovered_work_tree() {
            let engine = MockEngine::new();
            engine.add_repo("/work/product/framework", MockRepoState::on_branch("main"));
            let mut ws = workspace(Path::new("/work/product"));
            ws.recompute_local_paths();
            let registry = WorkspaceRegistry::new(vec![ws]);

            let found = resolve_for_path(
                &engine,
                &registry,
                Path::new("/work/product/framework/src/deep"),
            );
            assert_eq!(found.map(|w| w.name.as_str()), Some("product"));
        }

        #[test]
        fn unrelated_path_matches_nothing() {
            let temp = TempDir::new().unwrap();
            let registry = WorkspaceRegistry::new(vec![workspace(Path::new("/work/product"))]);
            assert!(resolve_for_path(&MockEngine::new(), &registry, temp.path()).is_none());
        }

        #[test]
        fn repository_outside_registry_matches_nothing() {
            let engine = MockEngine::new();
            engine.add_repo("/elsewhere/app", MockRepoState::on_branch("main"));
            let registry = WorkspaceRegistry::new(vec![workspace(Path::new("/work/product"))]);
            assert!(resolve_for_path(&engine, &registry, Path::new("/elsewhere/app/src")).is_none());
        }
    }
}
