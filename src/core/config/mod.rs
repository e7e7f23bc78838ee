//! core::config
//!
//! Settings loading and the workspace schema.
//!
//! # Overview
//!
//! Lockstep keeps everything under one home directory: the settings file
//! (`config.toml`), the workspace registry and the single-workspace export.
//! Workspace documents are read and written by [`crate::store`]; this module
//! owns the settings file and the schema types.
//!
//! # Home Directory
//!
//! Resolved in order:
//! 1. An explicit override (`--home`)
//! 2. `$LOCKSTEP_HOME` if set
//! 3. `$XDG_CONFIG_HOME/lockstep`
//! 4. `~/.lockstep` (canonical)
//!
//! # Example
//!
//! ```no_run
//! use lockstep::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("Registry: {}", config.registry_path().display());
//! if let Some(name) = config.default_workspace() {
//!     println!("Default workspace: {}", name);
//! }
//! ```

pub mod schema;

pub use schema::{ModuleConfig, RepoHandle, Settings, WorkspaceConfig, WorkspaceRegistry};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::{LockstepPaths, REGISTRY_FILE, WORKSPACE_FILE};

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded settings plus the home directory they were resolved against.
#[derive(Debug, Clone)]
pub struct Config {
    /// The settings values
    pub settings: Settings,
    paths: LockstepPaths,
    /// Whether a settings file was found
    loaded_from_file: bool,
}

impl Config {
    /// Load settings from the resolved home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be parsed.
    /// A missing settings file is not an error (defaults are used).
    pub fn load(home_override: Option<&Path>) -> Result<Self, ConfigError> {
        let home = Self::resolve_home(home_override)?;
        Self::load_from(home)
    }

    /// Load settings from an explicit home directory.
    pub fn load_from(home: PathBuf) -> Result<Self, ConfigError> {
        let paths = LockstepPaths::new(home);
        let path = paths.settings_path();

        let (settings, loaded_from_file) = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
                path: path.clone(),
                source: e,
            })?;
            let settings: Settings =
                toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            (settings, true)
        } else {
            (Settings::default(), false)
        };

        settings.validate()?;

        Ok(Self {
            settings,
            paths,
            loaded_from_file,
        })
    }

    /// Resolve the home directory.
    pub fn resolve_home(home_override: Option<&Path>) -> Result<PathBuf, ConfigError> {
        home_from(
            home_override,
            std::env::var_os("LOCKSTEP_HOME").map(PathBuf::from),
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            dirs::home_dir(),
        )
    }

    /// Path routing for this home directory.
    pub fn paths(&self) -> &LockstepPaths {
        &self.paths
    }

    /// The home directory.
    pub fn home(&self) -> &Path {
        &self.paths.home
    }

    /// Whether a settings file was found on load.
    pub fn loaded_from_file(&self) -> bool {
        self.loaded_from_file
    }

    // =========================================================================
    // Accessors with defaults
    // =========================================================================

    /// Registry document path.
    ///
    /// Defaults to `<home>/workspaces.json`.
    pub fn registry_path(&self) -> PathBuf {
        let name = self
            .settings
            .registry_file
            .as_deref()
            .unwrap_or(Path::new(REGISTRY_FILE));
        self.paths.resolve(name)
    }

    /// Single-workspace document path.
    ///
    /// Defaults to `<home>/workspace.json`.
    pub fn workspace_path(&self) -> PathBuf {
        let name = self
            .settings
            .workspace_file
            .as_deref()
            .unwrap_or(Path::new(WORKSPACE_FILE));
        self.paths.resolve(name)
    }

    /// Workspace selected when the caller names none.
    pub fn default_workspace(&self) -> Option<&str> {
        self.settings.default_workspace.as_deref()
    }

    /// Command that must succeed before a push.
    pub fn push_gate(&self) -> Option<&str> {
        self.settings.push_gate.as_deref()
    }

    /// Write the settings file atomically.
    pub fn write_settings(&self) -> Result<PathBuf, ConfigError> {
        let path = self.paths.settings_path();
        let contents = toml::to_string_pretty(&self.settings)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        write_atomic(&path, &contents)?;
        Ok(path)
    }
}

fn home_from(
    home_override: Option<&Path>,
    lockstep_home: Option<PathBuf>,
    xdg_config_home: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(home) = home_override {
        return Ok(home.to_path_buf());
    }
    if let Some(home) = lockstep_home.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(home);
    }
    if let Some(xdg) = xdg_config_home.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(xdg.join("lockstep"));
    }
    home_dir
        .map(|home| home.join(".lockstep"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Write a file atomically.
///
/// Creates parent directories if needed, writes a sibling temp file and
/// renames it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents.as_bytes())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    file.sync_all().map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod home {
        use super::*;

        #[test]
        fn override_wins() {
            let home = home_from(
                Some(Path::new("/explicit")),
                Some(PathBuf::from("/env")),
                Some(PathBuf::from("/xdg")),
                Some(PathBuf::from("/home/me")),
            )
            .unwrap();
            assert_eq!(home, PathBuf::from("/explicit"));
        }

        #[test]
        fn env_then_xdg_then_home() {
            let home = home_from(
                None,
                Some(PathBuf::from("/env")),
                Some(PathBuf::from("/xdg")),
                None,
            )
            .unwrap();
            assert_eq!(home, PathBuf::from("/env"));

            let home = home_from(None, None, Some(PathBuf::from("/xdg")), None).unwrap();
            assert_eq!(home, PathBuf::from("/xdg/lockstep"));

            let home = home_from(None, None, None, Some(PathBuf::from("/home/me"))).unwrap();
            assert_eq!(home, PathBuf::from("/home/me/.lockstep"));
        }

        #[test]
        fn empty_env_values_are_skipped() {
            let home = home_from(
                None,
                Some(PathBuf::new()),
                Some(PathBuf::new()),
                Some(PathBuf::from("/home/me")),
            )
            .unwrap();
            assert_eq!(home, PathBuf::from("/home/me/.lockstep"));
        }

        #[test]
        fn no_home_is_an_error() {
            assert!(matches!(
                home_from(None, None, None, None),
                Err(ConfigError::NoHomeDir)
            ));
        }
    }

    #[test]
    fn load_missing_settings_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(Some(temp.path())).unwrap();

        assert!(!config.loaded_from_file());
        assert_eq!(config.registry_path(), temp.path().join("workspaces.json"));
        assert_eq!(config.workspace_path(), temp.path().join("workspace.json"));
        assert!(config.default_workspace().is_none());
        assert!(config.push_gate().is_none());
    }

    #[test]
    fn load_settings_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("config.toml"),
            r#"
            registry_file = "/shared/registry.json"
            default_workspace = "product"
            "#,
        )
        .unwrap();

        let config = Config::load(Some(temp.path())).unwrap();
        assert!(config.loaded_from_file());
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/shared/registry.json")
        );
        assert_eq!(config.default_workspace(), Some("product"));
    }

    #[test]
    fn malformed_settings_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("config.toml"), "registry_file = [").unwrap();

        let result = Config::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn write_settings_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::load(Some(temp.path())).unwrap();
        config.settings.push_gate = Some("make check".to_string());

        let path = config.write_settings().unwrap();
        assert!(path.exists());
        assert!(!temp.path().join("config.toml.tmp").exists());

        let reloaded = Config::load(Some(temp.path())).unwrap();
        assert_eq!(reloaded.push_gate(), Some("make check"));
    }

    #[test]
    fn write_atomic_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/file.json");
        write_atomic(&path, "[]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }
}
