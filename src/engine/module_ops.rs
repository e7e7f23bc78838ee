//! engine::module_ops
//!
//! Per-module primitives: clone, fetch, pull, merge, checkout, commit, push
//! and the read-only scans.
//!
//! # Architecture
//!
//! Every operation takes a [`ModuleContext`] (workspace-level values shared
//! by the whole batch) and one `&mut ModuleConfig`, and returns a
//! `Result<_, ModuleError>`. Nothing here panics or aborts the batch; the
//! aggregator decides what to do with a failed module.
//!
//! Operations report progress through the context's [`LogSink`].
//!
//! # Merge Policy
//!
//! Pull and merge share [`integrate`]:
//! - up to date / fast-forward: nothing else to do
//! - clean true merge: the modified files are logged and exactly one merge
//!   commit is synthesized
//! - conflicts: a conflict notice is logged, nothing is committed, and the
//!   working tree is left mid-merge for the user to resolve

use std::path::Path;

use tracing::debug;

use super::errors::ModuleError;
use super::log::LogSink;
use crate::core::changes::{ChangeKind, ChangeRecord};
use crate::core::config::{ModuleConfig, RepoHandle};
use crate::core::policy::WorkspacePolicy;
use crate::git::{CheckoutMode, GitEngine, MergeStatus, Repository, StatusOptions};

/// Workspace-level values shared by every module of a batch.
#[derive(Clone, Copy)]
pub struct ModuleContext<'a> {
    pub engine: &'a dyn GitEngine,
    pub policy: &'a WorkspacePolicy,
    pub sink: &'a dyn LogSink,
    /// Workspace name (carried on change records)
    pub workspace: &'a str,
    /// Active workspace branch
    pub branch: &'a str,
    /// Directory holding the module checkouts
    pub root_path: &'a Path,
}

impl ModuleContext<'_> {
    fn log(&self, message: impl AsRef<str>) {
        self.sink.write_line(message.as_ref());
    }
}

/// Inputs of a module checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutTarget {
    /// Local branch to check out (created when missing)
    pub branch: String,
    /// Remote-tracking branch a missing local branch starts from
    pub remote_branch: String,
    pub mode: CheckoutMode,
}

// =============================================================================
// Handle
// =============================================================================

/// Open (or reuse) the module's repository handle.
///
/// # Errors
///
/// [`ModuleError::PathMissing`] when `local_path` is empty or absent.
pub fn ensure_open<'h>(
    engine: &dyn GitEngine,
    handle: &'h mut RepoHandle,
    local_path: &Path,
) -> Result<&'h mut dyn Repository, ModuleError> {
    if local_path.as_os_str().is_empty() || !local_path.exists() {
        return Err(ModuleError::PathMissing {
            path: local_path.to_path_buf(),
        });
    }
    Ok(handle.get_or_open(engine, local_path)?)
}

// =============================================================================
// Clone / fetch
// =============================================================================

/// Clone the module's primary remote into its local path.
///
/// An empty `local_path` becomes `root_path/repo_name`. After cloning, the
/// secondary remote is registered, the push-URL rule applied, both remotes
/// fetched and the known branches refreshed.
pub fn clone(ctx: &ModuleContext<'_>, module: &mut ModuleConfig) -> Result<(), ModuleError> {
    if module.local_path.as_os_str().is_empty() {
        module.local_path = ctx.root_path.join(&module.repo_name);
    }
    ctx.log(format!(
        "Cloning {} into {} [{}]",
        module.primary_remote_url,
        module.local_path.display(),
        module.repo_name
    ));

    let params = ctx.policy.clone_params(module);
    let secondary = module.secondary_name().map(str::to_owned);
    let secondary_url = module.secondary_url().map(str::to_owned);
    let cloned = ctx.engine.clone_repo(
        &module.primary_remote_url,
        &module.local_path,
        &params,
        ctx.policy.credentials(),
    )?;
    let repo = module.handle.set(cloned);

    if let (Some(name), Some(url)) = (&secondary, &secondary_url) {
        if repo.find_remote(name)?.is_none() {
            repo.add_remote(name, url)?;
        }
    }
    WorkspacePolicy::apply_push_url(repo, secondary.as_deref(), &module.primary_remote_url)?;

    fetch_remote(ctx, repo, &module.repo_name, &module.primary_remote_name)?;
    if let Some(secondary) = &secondary {
        fetch_remote(ctx, repo, &module.repo_name, secondary)?;
    }
    module.known_branches = repo.branches()?;

    ctx.log(format!("Cloned [{}]", module.repo_name));
    Ok(())
}

/// Fetch the primary remote and, when configured, the secondary remote.
pub fn fetch(ctx: &ModuleContext<'_>, module: &mut ModuleConfig) -> Result<(), ModuleError> {
    let secondary = module.secondary_name().map(str::to_owned);
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    fetch_remote(ctx, repo, &module.repo_name, &module.primary_remote_name)?;
    if let Some(secondary) = &secondary {
        fetch_remote(ctx, repo, &module.repo_name, secondary)?;
    }
    module.known_branches = repo.branches()?;
    Ok(())
}

fn fetch_remote(
    ctx: &ModuleContext<'_>,
    repo: &mut dyn Repository,
    module: &str,
    remote: &str,
) -> Result<(), ModuleError> {
    let info = repo
        .find_remote(remote)?
        .ok_or_else(|| ModuleError::RemoteNotFound {
            remote: remote.to_string(),
        })?;

    ctx.log(format!("Fetching {} [{}]", remote, module));
    repo.fetch(remote, &info.fetch_refspecs, ctx.policy.credentials())?;
    debug!(module, remote, "fetch finished");
    Ok(())
}

// =============================================================================
// Pull / merge
// =============================================================================

/// Fetch and integrate `<primary>/<branch>`, then fetch and merge
/// `<secondary>/<branch>` when a secondary remote is configured.
pub fn pull(ctx: &ModuleContext<'_>, module: &mut ModuleConfig) -> Result<(), ModuleError> {
    let secondary = module.secondary_name().map(str::to_owned);
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;

    fetch_remote(ctx, repo, &module.repo_name, &module.primary_remote_name)?;
    let primary_source = format!("{}/{}", module.primary_remote_name, ctx.branch);
    let primary_result = integrate(ctx, repo, &module.repo_name, &primary_source);

    // Branch lists may have moved even if integration failed.
    module.known_branches = repo.branches()?;
    primary_result?;

    if let Some(secondary) = &secondary {
        fetch_remote(ctx, repo, &module.repo_name, secondary)?;
        let secondary_source = format!("{}/{}", secondary, ctx.branch);
        let secondary_result = integrate(ctx, repo, &module.repo_name, &secondary_source);
        module.known_branches = repo.branches()?;
        secondary_result?;
    }
    Ok(())
}

/// Fetch the primary remote and merge `source` into the current branch.
pub fn merge(
    ctx: &ModuleContext<'_>,
    module: &mut ModuleConfig,
    source: &str,
) -> Result<(), ModuleError> {
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    fetch_remote(ctx, repo, &module.repo_name, &module.primary_remote_name)?;
    let result = integrate(ctx, repo, &module.repo_name, source);
    module.known_branches = repo.branches()?;
    result.map(|_| ())
}

/// Merge `source` into the current branch and apply the commit policy.
pub fn integrate(
    ctx: &ModuleContext<'_>,
    repo: &mut dyn Repository,
    module: &str,
    source: &str,
) -> Result<MergeStatus, ModuleError> {
    let signature = ctx.policy.signature();
    let outcome = repo.merge(source, signature)?;

    match outcome.status {
        MergeStatus::UpToDate => {
            ctx.log(format!("{} is up to date with {} [{}]", ctx.branch, source, module));
        }
        MergeStatus::FastForward => {
            ctx.log(format!("Fast-forwarded {} to {} [{}]", ctx.branch, source, module));
        }
        MergeStatus::Conflicts => {
            ctx.log(format!(
                "Conflict: merging {} into {} stopped with conflicts [{}]: {}",
                source,
                ctx.branch,
                module,
                outcome.conflicted.join(", ")
            ));
            return Err(ModuleError::Conflict {
                source_branch: source.to_string(),
                paths: outcome.conflicted,
            });
        }
        MergeStatus::NonFastForward => {
            for entry in repo.status(&StatusOptions::default())? {
                ctx.log(format!("Modified: {} [{}]", entry.path, module));
            }
            let message = merge_message(source, ctx.branch);
            let oid = repo.commit(&message, signature, signature)?;
            ctx.log(format!("Committed \"{}\" ({}) [{}]", message, short(&oid), module));
        }
    }
    Ok(outcome.status)
}

/// Message of a synthesized merge commit.
pub fn merge_message(source: &str, branch: &str) -> String {
    format!("Merge branch '{}' into {}.", source, branch)
}

// =============================================================================
// Checkout
// =============================================================================

/// Fetch both remotes and switch the module to `target.branch`.
///
/// A missing local branch is created from `target.remote_branch` and set
/// to track the primary remote. With [`CheckoutMode::Force`] uncommitted
/// local modifications are discarded.
pub fn checkout(
    ctx: &ModuleContext<'_>,
    module: &mut ModuleConfig,
    target: &CheckoutTarget,
) -> Result<(), ModuleError> {
    let secondary = module.secondary_name().map(str::to_owned);
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;

    fetch_remote(ctx, repo, &module.repo_name, &module.primary_remote_name)?;
    if let Some(secondary) = &secondary {
        fetch_remote(ctx, repo, &module.repo_name, secondary)?;
    }

    if repo.local_branch_exists(&target.branch)? {
        repo.checkout_branch(&target.branch, target.mode)?;
    } else {
        repo.create_branch(&target.branch, &target.remote_branch)?;
        repo.checkout_branch(&target.branch, target.mode)?;
        repo.set_upstream(&target.branch, &module.primary_remote_name)?;
        ctx.log(format!(
            "Created {} from {} [{}]",
            target.branch, target.remote_branch, module.repo_name
        ));
    }
    module.known_branches = repo.branches()?;

    ctx.log(format!("Checked out {} [{}]", target.branch, module.repo_name));
    Ok(())
}

// =============================================================================
// Commit / push
// =============================================================================

/// Stage every committable change and commit it as `"[<label>] <message>"`.
///
/// Returns the new commit id, or `None` when there was nothing to commit.
pub fn commit(
    ctx: &ModuleContext<'_>,
    module: &mut ModuleConfig,
    label: &str,
    message: &str,
) -> Result<Option<String>, ModuleError> {
    let changes = scan(ctx, module)?;
    let paths: Vec<String> = changes
        .into_iter()
        .filter(|c| c.kind.is_committable())
        .map(|c| c.path)
        .collect();

    if paths.is_empty() {
        ctx.log(format!("Nothing to commit [{}]", module.repo_name));
        return Ok(None);
    }

    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    repo.stage(&paths)?;
    let full_message = commit_message(label, message);
    let signature = ctx.policy.signature();
    let oid = repo.commit(&full_message, signature, signature)?;

    ctx.log(format!(
        "Committed {} file(s) ({}) [{}]",
        paths.len(),
        short(&oid),
        module.repo_name
    ));
    Ok(Some(oid))
}

/// Message of a workspace commit.
pub fn commit_message(label: &str, message: &str) -> String {
    format!("[{}] {}", label, message)
}

/// Push the workspace branch to the primary remote.
pub fn push(ctx: &ModuleContext<'_>, module: &mut ModuleConfig) -> Result<(), ModuleError> {
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;

    if !repo.local_branch_exists(ctx.branch)? {
        return Err(ModuleError::BranchNotFound {
            branch: ctx.branch.to_string(),
        });
    }
    if repo.find_remote(&module.primary_remote_name)?.is_none() {
        return Err(ModuleError::RemoteNotFound {
            remote: module.primary_remote_name.clone(),
        });
    }

    ctx.log(format!(
        "Pushing {} to {} [{}]",
        ctx.branch, module.primary_remote_name, module.repo_name
    ));
    repo.push(
        &module.primary_remote_name,
        ctx.branch,
        ctx.policy.credentials(),
    )?;
    ctx.log(format!("Pushed [{}]", module.repo_name));
    Ok(())
}

// =============================================================================
// Read-only scans
// =============================================================================

/// Change records of the module, ignored and unaltered entries excluded.
pub fn scan(
    ctx: &ModuleContext<'_>,
    module: &mut ModuleConfig,
) -> Result<Vec<ChangeRecord>, ModuleError> {
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    let entries = repo.status(&StatusOptions {
        include_ignored: false,
    })?;

    Ok(entries
        .into_iter()
        .map(|entry| (entry.path, ChangeKind::from(entry.state)))
        .filter(|(_, kind)| !matches!(kind, ChangeKind::None | ChangeKind::Ignored))
        .map(|(path, kind)| ChangeRecord {
            workspace: ctx.workspace.to_string(),
            module: module.repo_name.clone(),
            path,
            kind,
        })
        .collect())
}

/// Commits ahead of upstream; no upstream counts as zero.
pub fn ahead(ctx: &ModuleContext<'_>, module: &mut ModuleConfig) -> Result<usize, ModuleError> {
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    Ok(repo.ahead_count()?.unwrap_or(0))
}

/// Name of the module's checked-out branch.
pub fn head_branch(
    ctx: &ModuleContext<'_>,
    module: &mut ModuleConfig,
) -> Result<Option<String>, ModuleError> {
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    Ok(repo.head_branch()?)
}

/// Re-read the module's branch list from its repository.
pub fn refresh_branches(
    ctx: &ModuleContext<'_>,
    module: &mut ModuleConfig,
) -> Result<(), ModuleError> {
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    module.known_branches = repo.branches()?;
    Ok(())
}

/// Apply the push-URL rule to an existing checkout.
pub fn apply_policy(
    ctx: &ModuleContext<'_>,
    module: &mut ModuleConfig,
) -> Result<bool, ModuleError> {
    let secondary = module.secondary_name().map(str::to_owned);
    let repo = ensure_open(ctx.engine, &mut module.handle, &module.local_path)?;
    Ok(WorkspacePolicy::apply_push_url(
        repo,
        secondary.as_deref(),
        &module.primary_remote_url,
    )?)
}

fn short(oid: &str) -> &str {
    oid.get(..7).unwrap_or(oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorkspaceConfig;
    use crate::engine::log::MemorySink;
    use crate::git::mock::{GitOp, MockEngine, MockOperation, MockRepoState};
    use crate::git::{FileState, GitError, MergeOutcome};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const PRIMARY: &str = "https://example.com/me/fw.git";
    const TEAM: &str = "https://example.com/team/fw.git";

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        engine: MockEngine,
        sink: MemorySink,
        policy: WorkspacePolicy,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = dir.path().to_path_buf();
            let mut ws = WorkspaceConfig::new("product", "main");
            ws.user_name = "octo".to_string();
            ws.email = "octo@example.com".to_string();
            Self {
                _dir: dir,
                root,
                engine: MockEngine::new(),
                sink: MemorySink::new(),
                policy: WorkspacePolicy::derive(&ws),
            }
        }

        fn ctx(&self) -> ModuleContext<'_> {
            ModuleContext {
                engine: &self.engine,
                policy: &self.policy,
                sink: &self.sink,
                workspace: "product",
                branch: "main",
                root_path: &self.root,
            }
        }

        /// A module checked out on disk with the given mock state.
        fn module(&self, state: MockRepoState) -> ModuleConfig {
            let path = self.root.join("fw");
            std::fs::create_dir_all(&path).unwrap();
            self.engine.add_repo(&path, state);
            ModuleConfig::new("fw", "origin", PRIMARY)
                .with_secondary("team", TEAM)
                .with_local_path(path)
        }

        fn state(&self) -> MockRepoState {
            self.engine.repo(&self.root.join("fw")).unwrap()
        }
    }

    fn two_remotes() -> MockRepoState {
        MockRepoState::on_branch("main")
            .with_remote("origin", PRIMARY, &["main"])
            .with_remote("team", TEAM, &["main"])
    }

    mod open {
        use super::*;

        #[test]
        fn empty_path_is_path_missing() {
            let fx = Fixture::new();
            let mut module = ModuleConfig::new("fw", "origin", PRIMARY);
            let result = fetch(&fx.ctx(), &mut module);
            assert!(matches!(result, Err(ModuleError::PathMissing { .. })));
        }

        #[test]
        fn absent_path_is_path_missing() {
            let fx = Fixture::new();
            let mut module =
                ModuleConfig::new("fw", "origin", PRIMARY).with_local_path(fx.root.join("nope"));
            let result = scan(&fx.ctx(), &mut module);
            assert!(matches!(result, Err(ModuleError::PathMissing { .. })));
        }

        #[test]
        fn handle_is_opened_once() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes());
            scan(&fx.ctx(), &mut module).unwrap();
            ahead(&fx.ctx(), &mut module).unwrap();

            let opens = fx
                .engine
                .operations()
                .iter()
                .filter(|op| matches!(op, MockOperation::Open { .. }))
                .count();
            assert_eq!(opens, 1);
            assert!(module.handle.is_open());
        }
    }

    mod fetching {
        use super::*;

        #[test]
        fn fetches_both_remotes_and_refreshes_branches() {
            let fx = Fixture::new();
            fx.engine.add_server(PRIMARY, &["main", "dev"]);
            let mut module = fx.module(two_remotes());

            fetch(&fx.ctx(), &mut module).unwrap();

            let remotes: Vec<String> = fx
                .engine
                .operations()
                .into_iter()
                .filter_map(|op| match op {
                    MockOperation::Fetch { remote, user_name, .. } => {
                        assert_eq!(user_name, "octo");
                        Some(remote)
                    }
                    _ => None,
                })
                .collect();
            assert_eq!(remotes, vec!["origin", "team"]);
            assert!(module.known_branches.contains(&"origin/dev".to_string()));
        }

        #[test]
        fn configured_but_missing_secondary_is_remote_not_found() {
            let fx = Fixture::new();
            let mut module = fx.module(
                MockRepoState::on_branch("main").with_remote("origin", PRIMARY, &["main"]),
            );
            let result = fetch(&fx.ctx(), &mut module);
            assert!(matches!(
                result,
                Err(ModuleError::RemoteNotFound { ref remote }) if remote == "team"
            ));
        }
    }

    mod pulling {
        use super::*;

        #[test]
        fn clean_secondary_merge_commits_once() {
            let fx = Fixture::new();
            let mut module = fx.module(
                two_remotes()
                    .with_change("README.md", FileState::ModifiedInIndex)
                    .with_merge_result(
                        "team/main",
                        MergeOutcome::with_status(MergeStatus::NonFastForward),
                    ),
            );

            pull(&fx.ctx(), &mut module).unwrap();

            let state = fx.state();
            assert_eq!(state.commits.len(), 1);
            assert_eq!(
                state.commits[0].message,
                "Merge branch 'team/main' into main."
            );
            assert!(fx.sink.contains("Modified: README.md [fw]"));
        }

        #[test]
        fn conflict_blocks_commit() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes().with_merge_result(
                "team/main",
                MergeOutcome::conflicts(vec!["src/lib.rs".to_string()]),
            ));

            let result = pull(&fx.ctx(), &mut module);

            assert!(matches!(result, Err(ModuleError::Conflict { .. })));
            assert!(fx.state().commits.is_empty());
            assert!(fx.sink.contains("Conflict: merging team/main into main"));
        }

        #[test]
        fn primary_integrated_before_secondary() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes());
            pull(&fx.ctx(), &mut module).unwrap();

            let merges: Vec<String> = fx
                .engine
                .operations()
                .into_iter()
                .filter_map(|op| match op {
                    MockOperation::Merge { source, .. } => Some(source),
                    _ => None,
                })
                .collect();
            assert_eq!(merges, vec!["origin/main", "team/main"]);
        }
    }

    mod merging {
        use super::*;

        #[test]
        fn explicit_source_is_merged() {
            let fx = Fixture::new();
            let mut module = fx.module(
                two_remotes()
                    .with_local_branches(&["feature"])
                    .with_merge_result(
                        "feature",
                        MergeOutcome::with_status(MergeStatus::NonFastForward),
                    ),
            );

            merge(&fx.ctx(), &mut module, "feature").unwrap();
            assert_eq!(
                fx.state().commits[0].message,
                "Merge branch 'feature' into main."
            );
        }

        #[test]
        fn unknown_source_is_branch_not_found() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes());
            let result = merge(&fx.ctx(), &mut module, "nope");
            assert!(matches!(result, Err(ModuleError::BranchNotFound { .. })));
        }
    }

    mod checking_out {
        use super::*;

        fn target(mode: CheckoutMode) -> CheckoutTarget {
            CheckoutTarget {
                branch: "dev".to_string(),
                remote_branch: "origin/dev".to_string(),
                mode,
            }
        }

        #[test]
        fn missing_local_branch_is_created_and_tracked() {
            let fx = Fixture::new();
            let mut module = fx.module(
                MockRepoState::on_branch("main")
                    .with_remote("origin", PRIMARY, &["main", "dev"])
                    .with_remote("team", TEAM, &["main"]),
            );

            checkout(&fx.ctx(), &mut module, &target(CheckoutMode::Force)).unwrap();

            let state = fx.state();
            assert_eq!(state.head.as_deref(), Some("dev"));
            assert_eq!(state.upstreams.get("dev").map(String::as_str), Some("origin"));
            assert!(module.known_branches.contains(&"dev".to_string()));
        }

        #[test]
        fn existing_branch_is_checked_out_directly() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes().with_local_branches(&["dev"]));

            checkout(&fx.ctx(), &mut module, &target(CheckoutMode::Force)).unwrap();

            let created = fx
                .engine
                .operations()
                .iter()
                .any(|op| matches!(op, MockOperation::CreateBranch { .. }));
            assert!(!created);
            assert_eq!(fx.state().head.as_deref(), Some("dev"));
        }

        #[test]
        fn force_discards_local_changes() {
            let fx = Fixture::new();
            let mut module = fx.module(
                two_remotes()
                    .with_local_branches(&["dev"])
                    .with_change("wip.txt", FileState::ModifiedInWorkdir),
            );

            checkout(&fx.ctx(), &mut module, &target(CheckoutMode::Force)).unwrap();
            assert!(fx.state().status.is_empty());
        }

        #[test]
        fn safe_mode_keeps_local_changes() {
            let fx = Fixture::new();
            let mut module = fx.module(
                two_remotes()
                    .with_local_branches(&["dev"])
                    .with_change("wip.txt", FileState::ModifiedInWorkdir),
            );

            let result = checkout(&fx.ctx(), &mut module, &target(CheckoutMode::Safe));
            assert!(matches!(
                result,
                Err(ModuleError::Engine(GitError::WorktreeConflict { .. }))
            ));
            assert_eq!(fx.state().head.as_deref(), Some("main"));
        }
    }

    mod committing {
        use super::*;

        #[test]
        fn stages_committable_paths_only() {
            let fx = Fixture::new();
            let mut module = fx.module(
                two_remotes()
                    .with_change("a.rs", FileState::ModifiedInWorkdir)
                    .with_change("b.rs", FileState::NewInWorkdir)
                    .with_change("target", FileState::Ignored),
            );

            let oid = commit(&fx.ctx(), &mut module, "FW", "fix build").unwrap();
            assert!(oid.is_some());

            let staged = fx.engine.operations().into_iter().find_map(|op| match op {
                MockOperation::Stage { paths, .. } => Some(paths),
                _ => None,
            });
            assert_eq!(staged, Some(vec!["a.rs".to_string(), "b.rs".to_string()]));
            assert_eq!(fx.state().commits[0].message, "[FW] fix build");
        }

        #[test]
        fn clean_tree_is_a_no_op() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes());

            let oid = commit(&fx.ctx(), &mut module, "FW", "nothing").unwrap();
            assert!(oid.is_none());
            assert!(fx.state().commits.is_empty());
            assert!(fx.sink.contains("Nothing to commit [fw]"));
        }
    }

    mod pushing {
        use super::*;

        #[test]
        fn pushes_workspace_branch_to_primary() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes().with_ahead(1));

            push(&fx.ctx(), &mut module).unwrap();

            let pushed = fx.engine.operations().into_iter().find_map(|op| match op {
                MockOperation::Push { remote, branch, .. } => Some((remote, branch)),
                _ => None,
            });
            assert_eq!(pushed, Some(("origin".to_string(), "main".to_string())));
        }

        #[test]
        fn missing_local_branch_fails() {
            let fx = Fixture::new();
            let mut module = fx.module(
                MockRepoState::on_branch("dev").with_remote("origin", PRIMARY, &["main"]),
            );
            let result = push(&fx.ctx(), &mut module);
            assert!(matches!(result, Err(ModuleError::BranchNotFound { .. })));
        }

        #[test]
        fn engine_failure_is_engine_error() {
            let fx = Fixture::new();
            let mut module = fx.module(two_remotes());
            fx.engine.fail_on(
                fx.root.join("fw"),
                GitOp::Push,
                GitError::PushRejected {
                    details: "non-fast-forward".to_string(),
                },
            );
            let result = push(&fx.ctx(), &mut module);
            assert!(matches!(
                result,
                Err(ModuleError::Engine(GitError::PushRejected { .. }))
            ));
        }
    }

    mod cloning {
        use super::*;

        #[test]
        fn clone_registers_secondary_and_forces_push_url() {
            let fx = Fixture::new();
            fx.engine.add_server(PRIMARY, &["main"]);
            fx.engine.add_server(TEAM, &["main", "release"]);
            let mut module = ModuleConfig::new("fw", "origin", PRIMARY).with_secondary("team", TEAM);

            clone(&fx.ctx(), &mut module).unwrap();

            assert_eq!(module.local_path, fx.root.join("fw"));
            let state = fx.state();
            let team = state.remote("team").unwrap();
            assert_eq!(team.url.as_deref(), Some(TEAM));
            assert_eq!(team.push_url.as_deref(), Some(PRIMARY));
            assert!(module.known_branches.contains(&"team/release".to_string()));
            assert_eq!(state.head.as_deref(), Some("main"));
        }

        #[test]
        fn clone_failure_is_reported() {
            let fx = Fixture::new();
            let mut module = ModuleConfig::new("fw", "origin", "https://example.com/none.git");
            let result = clone(&fx.ctx(), &mut module);
            assert!(matches!(
                result,
                Err(ModuleError::Engine(GitError::Network { .. }))
            ));
        }
    }

    #[test]
    fn scan_tags_workspace_and_module() {
        let fx = Fixture::new();
        let mut module = fx.module(
            two_remotes()
                .with_change("a.rs", FileState::RenamedInIndex)
                .with_change("b.rs", FileState::Conflicted),
        );

        let records = scan(&fx.ctx(), &mut module).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.workspace == "product" && r.module == "fw"));
        assert_eq!(records[0].kind, ChangeKind::Renamed);
        assert_eq!(records[1].kind, ChangeKind::Conflicted);
    }

    #[test]
    fn messages() {
        assert_eq!(commit_message("FW", "fix"), "[FW] fix");
        assert_eq!(
            merge_message("team/main", "main"),
            "Merge branch 'team/main' into main."
        );
    }
}
