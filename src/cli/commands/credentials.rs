//! Password resolution for commands that talk to remotes.

use std::io::{self, IsTerminal};

use anyhow::{Context as _, Result};

use crate::engine::Orchestrator;

/// Environment variable holding the password (or token).
pub const PASSWORD_ENV: &str = "LOCKSTEP_PASSWORD";

/// Supply a password when the selected workspace stores none.
pub(super) fn ensure_password(orchestrator: &mut Orchestrator) -> Result<()> {
    let Some(workspace) = orchestrator.workspace() else {
        return Ok(());
    };
    if workspace.user_name.is_empty() {
        return Ok(());
    }

    let env = std::env::var(PASSWORD_ENV).ok();
    let interactive = io::stdin().is_terminal();
    let password = resolve_password(&workspace.password, env, || {
        if !interactive {
            return Ok(String::new());
        }
        rpassword::prompt_password(format!("Password for {}: ", workspace.user_name))
    })
    .context("failed to read password")?;

    if let Some(password) = password {
        orchestrator.set_password(password);
    }
    Ok(())
}

/// The password to use instead of the stored one, if any.
///
/// A stored password wins; otherwise the environment value, otherwise the
/// prompt. Blank answers count as no password.
pub fn resolve_password(
    stored: &str,
    env: Option<String>,
    prompt: impl FnOnce() -> io::Result<String>,
) -> io::Result<Option<String>> {
    if !stored.is_empty() {
        return Ok(None);
    }
    if let Some(env) = env.filter(|p| !p.is_empty()) {
        return Ok(Some(env));
    }
    let typed = prompt()?;
    Ok(Some(typed).filter(|p| !p.is_empty()))
}
