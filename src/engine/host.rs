//! engine::host
//!
//! Host notification interface.
//!
//! # Design
//!
//! The host is whatever embeds the orchestrator: the console binary, an
//! editor integration, a test. It is told when the selected workspace's
//! state changes and is asked before every push whether the push may
//! proceed (e.g. "the build succeeded"). A declined push is skipped, not
//! failed.
//!
//! Hooks are async because a gate may run an external command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::aggregate::AggregatedState;
use crate::core::config::WorkspaceConfig;

/// Callbacks from the orchestrator to its embedder.
#[async_trait]
pub trait Host: Send + Sync {
    /// Folder the host currently has open, used to pick the workspace that
    /// owns it.
    fn current_project_folder(&self) -> Option<PathBuf> {
        None
    }

    /// The selected workspace changed or its derived state was recomputed.
    async fn on_config_changed(&self, _workspace: &WorkspaceConfig, _state: &AggregatedState) {}

    /// Whether a push of `workspace` may proceed.
    async fn before_push(&self, _workspace: &WorkspaceConfig) -> bool {
        true
    }
}

/// Host with no folder and no gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHost;

#[async_trait]
impl Host for DetachedHost {}

/// Host used by the `lockstep` binary.
///
/// The push gate, when configured, is a shell command run in the workspace
/// root; a zero exit status lets the push proceed.
#[derive(Debug, Clone, Default)]
pub struct ConsoleHost {
    project_folder: Option<PathBuf>,
    push_gate: Option<String>,
}

impl ConsoleHost {
    pub fn new(project_folder: Option<PathBuf>, push_gate: Option<String>) -> Self {
        Self {
            project_folder,
            push_gate,
        }
    }

    /// Drop the push gate.
    pub fn without_gate(mut self) -> Self {
        self.push_gate = None;
        self
    }

    pub fn push_gate(&self) -> Option<&str> {
        self.push_gate.as_deref()
    }
}

#[async_trait]
impl Host for ConsoleHost {
    fn current_project_folder(&self) -> Option<PathBuf> {
        self.project_folder.clone()
    }

    async fn on_config_changed(&self, workspace: &WorkspaceConfig, state: &AggregatedState) {
        debug!(
            workspace = %workspace.name,
            branch = state.current_local_branch.as_deref().unwrap_or("-"),
            ahead = state.ahead_count,
            changes = state.changes.len(),
            "workspace state refreshed"
        );
    }

    async fn before_push(&self, workspace: &WorkspaceConfig) -> bool {
        let Some(gate) = &self.push_gate else {
            return true;
        };
        run_gate(gate, &workspace.root_path).await
    }
}

async fn run_gate(gate: &str, dir: &Path) -> bool {
    info!(command = gate, "running push gate");

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(gate)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if dir.is_dir() {
        command.current_dir(dir);
    }

    match command.status().await {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(command = gate, %status, "push gate declined");
            false
        }
        Err(e) => {
            warn!(command = gate, error = %e, "push gate could not be started");
            false
        }
    }
}
