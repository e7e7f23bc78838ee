//! core::policy
//!
//! Credential and remote policy derived from a workspace.
//!
//! # Rules
//!
//! - Every authenticated call presents the workspace's user name and
//!   password, whichever remote asks.
//! - Clones check out the workspace branch and name the cloned-from remote
//!   after the module's primary remote.
//! - The secondary remote's push URL is always the primary remote's URL, so
//!   the secondary is fetch-only in practice and every push lands on the
//!   primary.

use tracing::debug;

use crate::core::config::{ModuleConfig, WorkspaceConfig};
use crate::git::{CloneParams, Credentials, GitError, Repository, Signature};

/// Credentials and signature for one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePolicy {
    credentials: Credentials,
    signature: Signature,
    branch_name: String,
}

impl WorkspacePolicy {
    /// Derive the policy from a workspace configuration.
    pub fn derive(workspace: &WorkspaceConfig) -> Self {
        Self {
            credentials: Credentials::new(&workspace.user_name, &workspace.password),
            signature: Signature {
                name: workspace.user_name.clone(),
                email: workspace.email.clone(),
            },
            branch_name: workspace.branch_name.clone(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Author and committer identity.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Replace the password presented to remotes (e.g. one typed at a prompt).
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.credentials.password = password.into();
    }

    /// Clone parameters for `module`.
    pub fn clone_params(&self, module: &ModuleConfig) -> CloneParams {
        let branch = Some(self.branch_name.trim())
            .filter(|b| !b.is_empty())
            .map(String::from);
        CloneParams {
            branch,
            remote_name: module.primary_remote_name.clone(),
        }
    }

    /// Point the secondary remote's push URL at the primary remote's URL.
    ///
    /// Returns `false` when there is no secondary remote, or the repository
    /// does not have it configured yet.
    pub fn apply_push_url(
        repo: &mut dyn Repository,
        secondary: Option<&str>,
        primary_url: &str,
    ) -> Result<bool, GitError> {
        let Some(secondary) = secondary else {
            return Ok(false);
        };
        let Some(remote) = repo.find_remote(secondary)? else {
            return Ok(false);
        };
        if remote.push_url.as_deref() == Some(primary_url) {
            return Ok(true);
        }

        repo.set_push_url(secondary, primary_url)?;
        debug!(remote = secondary, "secondary push url set to primary");
        Ok(true)
    }
}
