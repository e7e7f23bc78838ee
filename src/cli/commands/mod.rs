//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Selects the workspace (explicit name, path, settings default, or the
//!    current directory)
//! 2. Calls one orchestrator operation
//! 3. Formats and displays output
//!
//! Handlers do NOT perform repository mutations directly.
//!
//! Module failures are reported by the orchestrator's log sink as they
//! happen; a command with any failed module exits non-zero.

mod credentials;
mod registry;
mod state;
mod workspace;

pub use credentials::resolve_password;
pub use registry::parse_module_spec;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use super::args::{Cli, Command};
use crate::core::config::Config;
use crate::engine::{AggregatedState, ConsoleHost, Orchestrator};
use crate::git::GitEngine;

/// Dispatch a parsed command line.
pub async fn dispatch(cli: Cli, config: &Config, engine: Arc<dyn GitEngine>) -> Result<()> {
    let Cli {
        workspace,
        path,
        command,
        ..
    } = cli;

    let cwd = std::env::current_dir().ok();
    let mut host = ConsoleHost::new(cwd, config.push_gate().map(String::from));
    if matches!(command, Command::Push { skip_gate: true }) {
        host = host.without_gate();
    }
    let mut orchestrator = Orchestrator::from_config(engine, config).with_host(Arc::new(host));

    if command.is_registry_only() {
        return match command {
            Command::List => registry::list(&mut orchestrator, config.default_workspace()),
            Command::Add {
                name,
                root,
                branch,
                modules,
                primary_remote,
                secondary_remote,
                user,
                email,
            } => registry::add(
                &mut orchestrator,
                registry::AddArgs {
                    name,
                    root,
                    branch,
                    modules,
                    primary_remote,
                    secondary_remote,
                    user,
                    email,
                },
            ),
            _ => unreachable!("not a registry command"),
        };
    }

    let state = select(
        &mut orchestrator,
        workspace.as_deref(),
        path.as_deref(),
        config.default_workspace(),
    )
    .await?;

    if command.needs_credentials() {
        credentials::ensure_password(&mut orchestrator)?;
    }

    match command {
        Command::Status { json } => state::status(&state, json),
        Command::Branches => state::branches(&state),
        Command::Save => registry::save(&mut orchestrator),
        Command::Export => registry::export(&orchestrator),
        Command::Clone => workspace::clone(&mut orchestrator).await,
        Command::Fetch => workspace::fetch(&mut orchestrator).await,
        Command::Pull => workspace::pull(&mut orchestrator).await,
        Command::Merge { source } => workspace::merge(&mut orchestrator, &source).await,
        Command::Checkout {
            remote_branch,
            branch,
            safe,
        } => workspace::checkout(&mut orchestrator, remote_branch, branch, safe).await,
        Command::Commit { label, message } => {
            workspace::commit(&mut orchestrator, label, message).await
        }
        Command::Push { .. } => workspace::push(&mut orchestrator).await,
        Command::List | Command::Add { .. } => unreachable!("handled above"),
    }
}

/// Select the workspace the command operates on.
async fn select(
    orchestrator: &mut Orchestrator,
    name: Option<&str>,
    path: Option<&Path>,
    default: Option<&str>,
) -> Result<AggregatedState> {
    if let Some(name) = name {
        return orchestrator
            .select_workspace(name)
            .await
            .with_context(|| format!("cannot select workspace '{}'", name));
    }
    if let Some(path) = path {
        return orchestrator
            .select_by_path(path)
            .await
            .with_context(|| format!("cannot select workspace for '{}'", path.display()));
    }
    if let Some(default) = default {
        return orchestrator
            .select_workspace(default)
            .await
            .with_context(|| format!("cannot select default workspace '{}'", default));
    }
    match orchestrator.select_for_host_folder().await {
        Ok(Some(state)) => Ok(state),
        Ok(None) | Err(_) => {
            bail!("no workspace selected; pass --workspace NAME or --path DIR")
        }
    }
}
