//! core::branches
//!
//! Branch reconciliation across a workspace's modules.
//!
//! # Algorithm
//!
//! Each module's known branches are partitioned on the remote separator:
//! names without a `/` are local, names with one are remote-tracking. The
//! workspace offers only the branches every module has, so the exposed sets
//! are the intersections of the per-module partitions. Order follows the
//! first contributing module and duplicates are dropped.
//!
//! Modules whose branch list is empty (not cloned or never refreshed) do not
//! contribute and do not empty the intersection.
//!
//! A local branch name that itself contains `/` (`feature/x`) is classified
//! as remote-tracking by this rule.

use std::collections::HashSet;

/// Separator between remote name and branch name in friendly names.
pub const REMOTE_SEPARATOR: char = '/';

/// Branches offered for a workspace-wide checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSets {
    /// Local branches present in every module
    pub local: Vec<String>,
    /// Remote-tracking branches present in every module
    pub remote: Vec<String>,
}

/// Whether a friendly name denotes a remote-tracking branch.
pub fn is_remote(name: &str) -> bool {
    name.contains(REMOTE_SEPARATOR)
}

/// Split friendly names into local and remote-tracking subsets.
pub fn partition(branches: &[String]) -> BranchSets {
    let (remote, local) = branches.iter().cloned().partition(|b| is_remote(b));
    BranchSets { local, remote }
}

/// Intersect the branch partitions of every module, in module order.
pub fn reconcile<'a, I>(modules: I) -> BranchSets
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut result: Option<BranchSets> = None;

    for branches in modules {
        if branches.is_empty() {
            continue;
        }
        let sets = partition(branches);
        result = Some(match result {
            None => BranchSets {
                local: dedup(sets.local),
                remote: dedup(sets.remote),
            },
            Some(acc) => BranchSets {
                local: intersect(acc.local, &sets.local),
                remote: intersect(acc.remote, &sets.remote),
            },
        });
    }

    result.unwrap_or_default()
}

/// First remote-tracking branch whose name contains `current`.
///
/// First match wins: with both `origin/main` and `team/main` present the
/// earlier entry is returned.
pub fn current_remote_branch(remote: &[String], current: &str) -> Option<String> {
    if current.is_empty() {
        return None;
    }
    remote.iter().find(|b| b.contains(current)).cloned()
}

/// Local branch name for checking out a remote-tracking branch: everything
/// after the first separator (`origin/feature/x` -> `feature/x`).
pub fn default_local_name(remote_branch: &str) -> &str {
    match remote_branch.split_once(REMOTE_SEPARATOR) {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => remote_branch,
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|n| seen.insert(n.clone())).collect()
}

fn intersect(acc: Vec<String>, other: &[String]) -> Vec<String> {
    let other: HashSet<&str> = other.iter().map(String::as_str).collect();
    acc.into_iter().filter(|n| other.contains(n.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    mod partition {
        use super::*;

        #[test]
        fn splits_on_separator() {
            let sets = partition(&names(&["main", "origin/main", "dev", "team/dev"]));
            assert_eq!(sets.local, names(&["main", "dev"]));
            assert_eq!(sets.remote, names(&["origin/main", "team/dev"]));
        }

        #[test]
        fn slashed_local_name_counts_as_remote() {
            let sets = partition(&names(&["feature/x"]));
            assert!(sets.local.is_empty());
            assert_eq!(sets.remote, names(&["feature/x"]));
        }
    }

    mod reconcile {
        use super::*;

        #[test]
        fn intersects_in_first_module_order() {
            let a = names(&["main", "dev", "origin/main", "origin/dev"]);
            let b = names(&["dev", "main", "origin/dev"]);
            let c = names(&["main", "dev", "release", "origin/dev", "origin/main"]);

            let sets = reconcile([a.as_slice(), b.as_slice(), c.as_slice()]);
            assert_eq!(sets.local, names(&["main", "dev"]));
            assert_eq!(sets.remote, names(&["origin/dev"]));
        }

        #[test]
        fn disjoint_module_empties_both_sets() {
            let a = names(&["main", "origin/main"]);
            let b = names(&["other", "origin/other"]);
            let sets = reconcile([a.as_slice(), b.as_slice()]);
            assert!(sets.local.is_empty());
            assert!(sets.remote.is_empty());
        }

        #[test]
        fn empty_modules_are_skipped() {
            let a: Vec<String> = Vec::new();
            let b = names(&["main", "origin/main"]);
            let sets = reconcile([a.as_slice(), b.as_slice(), a.as_slice()]);
            assert_eq!(sets.local, names(&["main"]));
            assert_eq!(sets.remote, names(&["origin/main"]));
        }

        #[test]
        fn no_modules_yield_empty_sets() {
            let sets = reconcile(std::iter::empty::<&[String]>());
            assert_eq!(sets, BranchSets::default());
        }

        #[test]
        fn duplicates_collapse() {
            let a = names(&["main", "main"]);
            let sets = reconcile([a.as_slice()]);
            assert_eq!(sets.local, names(&["main"]));
        }
    }

    mod current_remote {
        use super::*;

        #[test]
        fn first_substring_match_wins() {
            let remote = names(&["team/main", "origin/main"]);
            assert_eq!(
                current_remote_branch(&remote, "main").as_deref(),
                Some("team/main")
            );
        }

        #[test]
        fn substring_match_is_loose() {
            let remote = names(&["origin/main-old", "origin/main"]);
            assert_eq!(
                current_remote_branch(&remote, "main").as_deref(),
                Some("origin/main-old")
            );
        }

        #[test]
        fn empty_current_matches_nothing() {
            let remote = names(&["origin/main"]);
            assert_eq!(current_remote_branch(&remote, ""), None);
        }
    }

    #[test]
    fn default_local_name_strips_remote() {
        assert_eq!(default_local_name("origin/main"), "main");
        assert_eq!(default_local_name("origin/feature/x"), "feature/x");
        assert_eq!(default_local_name("main"), "main");
        assert_eq!(default_local_name("origin/"), "origin/");
    }
}
