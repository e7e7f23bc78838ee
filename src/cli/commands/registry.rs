//! Registry commands: list, add, save, export.

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};

use crate::core::config::{ModuleConfig, WorkspaceConfig};
use crate::engine::Orchestrator;

/// Print every registered workspace.
pub(super) fn list(orchestrator: &mut Orchestrator, default: Option<&str>) -> Result<()> {
    let registry = orchestrator
        .load_registry()
        .context("failed to load registry")?;

    if registry.is_empty() {
        println!("No workspaces registered. Use 'lockstep add' to register one.");
        return Ok(());
    }

    for workspace in registry.iter() {
        let marker = if Some(workspace.name.as_str()) == default {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  (branch {}, {} module(s), {})",
            marker,
            workspace.name,
            workspace.branch_name,
            workspace.modules.len(),
            workspace.root_path.display()
        );
    }
    Ok(())
}

/// Arguments of `lockstep add`.
#[derive(Debug)]
pub(super) struct AddArgs {
    pub name: String,
    pub root: PathBuf,
    pub branch: String,
    pub modules: Vec<String>,
    pub primary_remote: String,
    pub secondary_remote: String,
    pub user: String,
    pub email: String,
}

/// Register a workspace and save the registry.
pub(super) fn add(orchestrator: &mut Orchestrator, args: AddArgs) -> Result<()> {
    let mut workspace = WorkspaceConfig::new(args.name, args.branch);
    workspace.root_path = args.root;
    workspace.user_name = args.user;
    workspace.email = args.email;
    workspace.modules = args
        .modules
        .iter()
        .map(|spec| parse_module_spec(spec, &args.primary_remote, &args.secondary_remote))
        .collect::<Result<_>>()?;
    workspace.recompute_local_paths();

    let name = workspace.name.clone();
    let count = workspace.modules.len();
    orchestrator.add_workspace(workspace)?;
    let path = orchestrator
        .save_registry()
        .context("failed to save registry")?;

    println!(
        "Registered workspace '{}' with {} module(s) in {}",
        name,
        count,
        path.display()
    );
    Ok(())
}

/// Parse `NAME=URL[,SECONDARY_URL]`.
pub fn parse_module_spec(spec: &str, primary: &str, secondary: &str) -> Result<ModuleConfig> {
    let Some((name, urls)) = spec.split_once('=') else {
        bail!("invalid module '{}': expected NAME=URL[,SECONDARY_URL]", spec);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid module '{}': empty name", spec);
    }

    let mut urls = urls.split(',').map(str::trim);
    let primary_url = urls.next().unwrap_or_default();
    if primary_url.is_empty() {
        bail!("invalid module '{}': empty URL", spec);
    }

    let module = ModuleConfig::new(name, primary, primary_url);
    match urls.next().filter(|u| !u.is_empty()) {
        Some(secondary_url) => Ok(module.with_secondary(secondary, secondary_url)),
        None => Ok(module),
    }
}

/// Save the selected workspace and the registry.
pub(super) fn save(orchestrator: &mut Orchestrator) -> Result<()> {
    let workspace_path = orchestrator
        .save_config()
        .context("failed to save workspace")?;
    let registry_path = orchestrator
        .save_registry()
        .context("failed to save registry")?;
    println!("Saved {}", workspace_path.display());
    println!("Saved {}", registry_path.display());
    Ok(())
}

/// Print the selected workspace without its password.
pub(super) fn export(orchestrator: &Orchestrator) -> Result<()> {
    let Some(mut workspace) = orchestrator.workspace() else {
        bail!("no workspace selected");
    };
    workspace.password.clear();
    let json = serde_json::to_string_pretty(&workspace).context("failed to serialize workspace")?;
    println!("{}", json);
    Ok(())
}
