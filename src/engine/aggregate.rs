//! engine::aggregate
//!
//! Workspace aggregator: fans a command out over the modules and folds the
//! per-module results into workspace state.
//!
//! # Fan-out
//!
//! Modules run strictly in declared order, one at a time. A failed module
//! is logged through the sink and recorded in the [`BatchReport`]; the
//! remaining modules still run.
//!
//! # Derived State
//!
//! [`snapshot`] recomputes [`AggregatedState`] from the repositories:
//! branch lists are re-read and reconciled, ahead counts summed (an
//! unavailable count is zero) and change records concatenated in module
//! order.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::errors::ModuleError;
use super::log::failure_line;
use super::module_ops::{self, ModuleContext};
use crate::core::branches;
use crate::core::changes::ChangeRecord;
use crate::core::config::ModuleConfig;

/// Workspace-level commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Select,
    Clone,
    Fetch,
    Pull,
    Merge,
    Checkout,
    Commit,
    Push,
    RefreshAheadCount,
    RefreshChanges,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "Select",
            Operation::Clone => "Clone",
            Operation::Fetch => "Fetch",
            Operation::Pull => "Pull",
            Operation::Merge => "Merge",
            Operation::Checkout => "Checkout",
            Operation::Commit => "Commit",
            Operation::Push => "Push",
            Operation::RefreshAheadCount => "RefreshAheadCount",
            Operation::RefreshChanges => "RefreshChanges",
        };
        f.write_str(name)
    }
}

/// Outcome of one module.
#[derive(Debug, Clone)]
pub struct ModuleResult<T> {
    /// The module's repository name
    pub module: String,
    pub outcome: Result<T, ModuleError>,
}

impl<T> ModuleResult<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Outcome of one workspace command.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub operation: Operation,
    pub workspace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-module results in module order
    pub results: Vec<ModuleResult<T>>,
}

impl<T> BatchReport<T> {
    /// Whether every module succeeded (vacuously true for no modules).
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(ModuleResult::is_ok)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok().map(|v| (r.module.as_str(), v)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ModuleError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.module.as_str(), e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Module names in attempt order.
    pub fn attempted(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.module.as_str()).collect()
    }

    /// Wall-clock duration of the batch.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Run `op` on every module in order, isolating failures.
pub fn fan_out<T, F>(
    ctx: &ModuleContext<'_>,
    modules: &mut [ModuleConfig],
    operation: Operation,
    mut op: F,
) -> BatchReport<T>
where
    F: FnMut(&ModuleContext<'_>, &mut ModuleConfig) -> Result<T, ModuleError>,
{
    let started_at = Utc::now();
    let mut results = Vec::with_capacity(modules.len());

    for module in modules.iter_mut() {
        debug!(%operation, module = %module.repo_name, "module start");
        let outcome = op(ctx, module);
        if let Err(err) = &outcome {
            ctx.sink
                .write_line(&failure_line(operation, &module.repo_name, err));
        }
        results.push(ModuleResult {
            module: module.repo_name.clone(),
            outcome,
        });
    }

    BatchReport {
        operation,
        workspace: ctx.workspace.to_string(),
        started_at,
        finished_at: Utc::now(),
        results,
    }
}

// =============================================================================
// Derived state
// =============================================================================

/// The workspace view recomputed after each command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedState {
    /// Branch checked out in the first module (only when local branches are shared)
    pub current_local_branch: Option<String>,
    /// First shared remote branch whose name contains the current branch
    pub current_remote_branch: Option<String>,
    /// Local branches present in every module
    pub local_branches: Vec<String>,
    /// Remote-tracking branches present in every module
    pub remote_branches: Vec<String>,
    /// Sum of per-module ahead counts
    pub ahead_count: usize,
    /// Change records of every module, in module order
    pub changes: Vec<ChangeRecord>,
}

impl AggregatedState {
    /// Number of changed paths across the workspace.
    pub fn modified_count(&self) -> usize {
        self.changes.len()
    }
}

/// Sum of ahead counts; failed modules contribute nothing.
pub fn total_ahead(ctx: &ModuleContext<'_>, modules: &mut [ModuleConfig]) -> usize {
    modules
        .iter_mut()
        .map(|module| quietly(ctx, Operation::RefreshAheadCount, module, module_ops::ahead))
        .map(Option::unwrap_or_default)
        .sum()
}

/// Concatenated change records; failed modules contribute nothing.
pub fn collect_changes(ctx: &ModuleContext<'_>, modules: &mut [ModuleConfig]) -> Vec<ChangeRecord> {
    modules
        .iter_mut()
        .filter_map(|module| quietly(ctx, Operation::RefreshChanges, module, module_ops::scan))
        .flatten()
        .collect()
}

/// Recompute the whole derived state.
pub fn snapshot(ctx: &ModuleContext<'_>, modules: &mut [ModuleConfig]) -> AggregatedState {
    for module in modules.iter_mut() {
        let _ = quietly(ctx, Operation::Select, module, module_ops::refresh_branches);
    }

    let sets = branches::reconcile(modules.iter().map(|m| m.known_branches.as_slice()));

    let current_local_branch = if sets.local.is_empty() {
        None
    } else {
        modules
            .first_mut()
            .and_then(|first| quietly(ctx, Operation::Select, first, module_ops::head_branch))
            .flatten()
    };
    let current_remote_branch = if sets.remote.is_empty() {
        None
    } else {
        branches::current_remote_branch(
            &sets.remote,
            current_local_branch.as_deref().unwrap_or_default(),
        )
    };

    AggregatedState {
        current_local_branch,
        current_remote_branch,
        local_branches: sets.local,
        remote_branches: sets.remote,
        ahead_count: total_ahead(ctx, modules),
        changes: collect_changes(ctx, modules),
    }
}

/// Run a read-only module query, logging failures.
///
/// A module that is not checked out yet is skipped without an error line.
fn quietly<T>(
    ctx: &ModuleContext<'_>,
    operation: Operation,
    module: &mut ModuleConfig,
    query: fn(&ModuleContext<'_>, &mut ModuleConfig) -> Result<T, ModuleError>,
) -> Option<T> {
    match query(ctx, module) {
        Ok(value) => Some(value),
        Err(ModuleError::PathMissing { .. }) => {
            debug!(%operation, module = %module.repo_name, "module not checked out");
            None
        }
        Err(err) => {
            ctx.sink
                .write_line(&failure_line(operation, &module.repo_name, &err));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WorkspaceConfig;
    use crate::core::policy::WorkspacePolicy;
    use crate::engine::log::MemorySink;
    use crate::git::mock::{GitOp, MockEngine, MockRepoState};
    use crate::git::{FileState, GitError};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

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
            Self {
                _dir: dir,
                root,
                engine: MockEngine::new(),
                sink: MemorySink::new(),
                policy: WorkspacePolicy::derive(&WorkspaceConfig::new("product", "main")),
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

        fn module(&self, name: &str, state: MockRepoState) -> ModuleConfig {
            let path = self.root.join(name);
            std::fs::create_dir_all(&path).unwrap();
            self.engine.add_repo(&path, state);
            ModuleConfig::new(name, "origin", format!("https://example.com/{}.git", name))
                .with_local_path(path)
        }
    }

    fn repo(branches: &[&str], remote: &[&str]) -> MockRepoState {
        MockRepoState::on_branch(branches[0])
            .with_local_branches(branches)
            .with_remote("origin", "https://example.com/x.git", remote)
    }

    mod fan_out {
        use super::*;

        #[test]
        fn failure_does_not_stop_later_modules() {
            let fx = Fixture::new();
            let mut modules = vec![
                fx.module("a", repo(&["main"], &["main"])),
                fx.module("b", repo(&["main"], &["main"])),
                fx.module("c", repo(&["main"], &["main"])),
            ];
            fx.engine.fail_on(
                fx.root.join("b"),
                GitOp::Push,
                GitError::Network {
                    message: "connection reset".to_string(),
                },
            );

            let report = fan_out(&fx.ctx(), &mut modules, Operation::Push, module_ops::push);

            assert_eq!(report.attempted(), vec!["a", "b", "c"]);
            assert_eq!(report.failure_count(), 1);
            assert!(!report.all_succeeded());
            assert!(report.results[2].is_ok());
            assert!(fx
                .sink
                .contains("Error: Push [b] failed: network error: connection reset"));
        }

        #[test]
        fn report_carries_workspace_and_timing() {
            let fx = Fixture::new();
            let mut modules = vec![fx.module("a", repo(&["main"], &["main"]))];
            let report = fan_out(&fx.ctx(), &mut modules, Operation::Fetch, module_ops::fetch);

            assert_eq!(report.workspace, "product");
            assert_eq!(report.operation, Operation::Fetch);
            assert!(report.elapsed() >= chrono::Duration::zero());
            assert_eq!(report.succeeded().count(), 1);
        }
    }

    mod snapshot {
        use super::*;

        #[test]
        fn intersects_branches_and_derives_current() {
            let fx = Fixture::new();
            let mut modules = vec![
                fx.module("a", repo(&["main", "dev"], &["main", "dev"])),
                fx.module("b", repo(&["main", "dev", "extra"], &["main"])),
            ];

            let state = snapshot(&fx.ctx(), &mut modules);

            assert_eq!(state.local_branches, vec!["main", "dev"]);
            assert_eq!(state.remote_branches, vec!["origin/main"]);
            assert_eq!(state.current_local_branch.as_deref(), Some("main"));
            assert_eq!(state.current_remote_branch.as_deref(), Some("origin/main"));
        }

        #[test]
        fn disjoint_module_empties_branch_sets() {
            let fx = Fixture::new();
            let mut modules = vec![
                fx.module("a", repo(&["main"], &["main"])),
                fx.module("b", repo(&["trunk"], &["trunk"])),
            ];

            let state = snapshot(&fx.ctx(), &mut modules);

            assert!(state.local_branches.is_empty());
            assert!(state.remote_branches.is_empty());
            assert_eq!(state.current_local_branch, None);
            assert_eq!(state.current_remote_branch, None);
        }

        #[test]
        fn sums_ahead_and_concatenates_changes() {
            let fx = Fixture::new();
            let mut modules = vec![
                fx.module(
                    "a",
                    repo(&["main"], &["main"])
                        .with_ahead(2)
                        .with_change("x.rs", FileState::ModifiedInWorkdir),
                ),
                fx.module("b", repo(&["main"], &["main"])),
                fx.module(
                    "c",
                    repo(&["main"], &["main"])
                        .with_ahead(3)
                        .with_change("y.rs", FileState::NewInIndex)
                        .with_change("z.rs", FileState::Ignored),
                ),
            ];

            let state = snapshot(&fx.ctx(), &mut modules);

            assert_eq!(state.ahead_count, 5);
            let modules_of_changes: Vec<&str> =
                state.changes.iter().map(|c| c.module.as_str()).collect();
            assert_eq!(modules_of_changes, vec!["a", "c"]);
            assert_eq!(state.modified_count(), 2);
        }

        #[test]
        fn missing_checkout_contributes_nothing() {
            let fx = Fixture::new();
            let mut modules = vec![
                fx.module("a", repo(&["main"], &["main"]).with_ahead(1)),
                ModuleConfig::new("b", "origin", "https://example.com/b.git")
                    .with_local_path(fx.root.join("not-cloned")),
            ];

            let state = snapshot(&fx.ctx(), &mut modules);

            assert_eq!(state.ahead_count, 1);
            assert_eq!(state.local_branches, vec!["main"]);
            assert!(fx.sink.lines().is_empty());
        }

        #[test]
        fn status_failure_is_logged_and_skipped() {
            let fx = Fixture::new();
            let mut modules = vec![fx.module(
                "a",
                repo(&["main"], &["main"]).with_change("x.rs", FileState::NewInWorkdir),
            )];
            fx.engine.fail_on(
                Path::new(&fx.root.join("a")),
                GitOp::Status,
                GitError::Internal {
                    message: "index locked".to_string(),
                },
            );

            let changes = collect_changes(&fx.ctx(), &mut modules);
            assert!(changes.is_empty());
            assert!(fx.sink.contains("Error: RefreshChanges [a] failed"));
        }
    }

    #[test]
    fn operation_display() {
        assert_eq!(Operation::Checkout.to_string(), "Checkout");
        assert_eq!(Operation::RefreshAheadCount.to_string(), "RefreshAheadCount");
    }
}
