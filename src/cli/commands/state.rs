//! Read-only commands: status, branches.

use anyhow::{Context as _, Result};

use crate::engine::AggregatedState;

/// Print the workspace state recomputed on selection.
pub(super) fn status(state: &AggregatedState, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(state).context("failed to serialize state")?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "Branch: {}",
        state.current_local_branch.as_deref().unwrap_or("(not shared)")
    );
    println!(
        "Remote: {}",
        state.current_remote_branch.as_deref().unwrap_or("(none)")
    );
    println!("Ahead:  {}", state.ahead_count);

    if state.changes.is_empty() {
        println!("No changes");
    } else {
        println!("Changes ({}):", state.modified_count());
        for change in &state.changes {
            println!("{}", change);
        }
    }
    Ok(())
}

/// Print the branches present in every module.
pub(super) fn branches(state: &AggregatedState) -> Result<()> {
    println!("Local:");
    for branch in &state.local_branches {
        let marker = if state.current_local_branch.as_deref() == Some(branch.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}", marker, branch);
    }
    println!("Remote:");
    for branch in &state.remote_branches {
        println!("  {}", branch);
    }
    Ok(())
}
