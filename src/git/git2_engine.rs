//! git::git2_engine
//!
//! [`GitEngine`]/[`Repository`] implementation backed by `git2`.
//!
//! This is the only file in Lockstep that talks to libgit2. Transport
//! progress and checkout notifications are reported through `tracing`.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{BranchType, CheckoutNotificationType, Cred, FetchOptions, PushOptions, RemoteCallbacks};
use tracing::{debug, trace};

use super::interface::{
    CheckoutMode, CloneParams, Credentials, FileState, GitEngine, GitError, MergeOutcome,
    MergeStatus, RemoteInfo, Repository, Signature, StatusEntry, StatusOptions,
};

/// Credential callbacks give up after this many attempts so a rejected
/// password does not loop forever inside libgit2.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Engine that opens and clones repositories with `git2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Engine;

impl Git2Engine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl GitEngine for Git2Engine {
    fn open(&self, path: &Path) -> Result<Box<dyn Repository>, GitError> {
        Ok(Box::new(Git::open(path)?))
    }

    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        params: &CloneParams,
        credentials: &Credentials,
    ) -> Result<Box<dyn Repository>, GitError> {
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(credentials));

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);
        if let Some(branch) = &params.branch {
            builder.branch(branch);
        }
        let remote_name = params.remote_name.clone();
        builder.remote_create(move |repo, _name, url| repo.remote(&remote_name, url));

        let repo = builder
            .clone(url, path)
            .map_err(|e| GitError::from_git2(e, &format!("clone {}", url)))?;
        debug!(url, path = %path.display(), "clone finished");

        Ok(Box::new(Git::from_repo(repo)?))
    }

    fn discover(&self, path: &Path) -> Option<PathBuf> {
        let repo = git2::Repository::discover(path).ok()?;
        repo.workdir().map(Path::to_path_buf)
    }
}

/// An opened `git2` repository.
pub struct Git {
    repo: git2::Repository,
    work_dir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl Git {
    /// Open the working tree rooted at `path`.
    ///
    /// Unlike discovery, this does not search parent directories: a module's
    /// local path must itself be a working tree.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Self::from_repo(repo)
    }

    fn from_repo(repo: git2::Repository) -> Result<Self, GitError> {
        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }
        let work_dir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();
        Ok(Self { repo, work_dir })
    }

    fn remote_info(remote: &git2::Remote<'_>) -> Result<RemoteInfo, GitError> {
        let refspecs = remote
            .fetch_refspecs()
            .map_err(|e| GitError::from_git2(e, "read fetch refspecs"))?;
        Ok(RemoteInfo {
            name: remote.name().unwrap_or_default().to_string(),
            url: remote.url().map(String::from),
            push_url: remote.pushurl().map(String::from),
            fetch_refspecs: refspecs.iter().flatten().map(String::from).collect(),
        })
    }

    fn find_git2_remote(&self, name: &str) -> Result<git2::Remote<'_>, GitError> {
        self.repo.find_remote(name).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec => GitError::RemoteNotFound {
                name: name.to_string(),
            },
            _ => GitError::from_git2(e, name),
        })
    }

    /// Resolve a merge source given as a friendly branch name.
    ///
    /// Remote-tracking branches win over local branches of the same name.
    fn resolve_reference(&self, source: &str) -> Result<git2::Reference<'_>, GitError> {
        if let Ok(branch) = self.repo.find_branch(source, BranchType::Remote) {
            return Ok(branch.into_reference());
        }
        if let Ok(branch) = self.repo.find_branch(source, BranchType::Local) {
            return Ok(branch.into_reference());
        }
        self.repo
            .resolve_reference_from_short_name(source)
            .map_err(|_| GitError::BranchNotFound {
                name: source.to_string(),
            })
    }

    fn signature(signature: &Signature) -> Result<git2::Signature<'static>, GitError> {
        git2::Signature::now(&signature.name, &signature.email)
            .map_err(|e| GitError::from_git2(e, "build signature"))
    }

    fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let index = self
            .repo
            .index()
            .map_err(|e| GitError::from_git2(e, "read index"))?;
        let conflicts = index
            .conflicts()
            .map_err(|e| GitError::from_git2(e, "read conflicts"))?;

        let mut paths = Vec::new();
        for conflict in conflicts {
            let conflict = conflict.map_err(|e| GitError::from_git2(e, "read conflict"))?;
            let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
            if let Some(entry) = entry {
                paths.push(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        Ok(paths)
    }
}

/// Callbacks that answer every credential request with the same
/// username/password pair, regardless of which remote asks.
fn remote_callbacks(credentials: &Credentials) -> RemoteCallbacks<'_> {
    let attempts = Cell::new(0usize);
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, _username_from_url, _allowed| {
        attempts.set(attempts.get() + 1);
        if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::new(
                git2::ErrorCode::Auth,
                git2::ErrorClass::Callback,
                format!("credentials rejected by {}", url),
            ));
        }
        Cred::userpass_plaintext(&credentials.user_name, &credentials.password)
    });
    callbacks.transfer_progress(|progress| {
        trace!(
            received = progress.received_objects(),
            total = progress.total_objects(),
            bytes = progress.received_bytes(),
            "transfer progress"
        );
        true
    });
    callbacks.sideband_progress(|data| {
        trace!(message = %String::from_utf8_lossy(data).trim_end(), "remote");
        true
    });
    callbacks
}

/// Collapse libgit2's status bit set into the dominant single state.
///
/// Conflicts win, then index-side changes, then working-tree changes.
fn file_state(status: git2::Status) -> FileState {
    const ORDER: [(git2::Status, FileState); 12] = [
        (git2::Status::CONFLICTED, FileState::Conflicted),
        (git2::Status::INDEX_NEW, FileState::NewInIndex),
        (git2::Status::INDEX_MODIFIED, FileState::ModifiedInIndex),
        (git2::Status::INDEX_DELETED, FileState::DeletedFromIndex),
        (git2::Status::INDEX_RENAMED, FileState::RenamedInIndex),
        (git2::Status::INDEX_TYPECHANGE, FileState::TypeChangeInIndex),
        (git2::Status::WT_NEW, FileState::NewInWorkdir),
        (git2::Status::WT_MODIFIED, FileState::ModifiedInWorkdir),
        (git2::Status::WT_DELETED, FileState::DeletedFromWorkdir),
        (git2::Status::WT_RENAMED, FileState::RenamedInWorkdir),
        (git2::Status::WT_TYPECHANGE, FileState::TypeChangeInWorkdir),
        (git2::Status::IGNORED, FileState::Ignored),
    ];

    ORDER
        .iter()
        .find(|(flag, _)| status.contains(*flag))
        .map(|(_, state)| *state)
        .unwrap_or(FileState::Unaltered)
}

impl Repository for Git {
    fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        let names = self
            .repo
            .remotes()
            .map_err(|e| GitError::from_git2(e, "list remotes"))?;

        let mut remotes = Vec::new();
        for name in names.iter().flatten() {
            let remote = self.find_git2_remote(name)?;
            remotes.push(Self::remote_info(&remote)?);
        }
        Ok(remotes)
    }

    fn find_remote(&self, name: &str) -> Result<Option<RemoteInfo>, GitError> {
        match self.find_git2_remote(name) {
            Ok(remote) => Ok(Some(Self::remote_info(&remote)?)),
            Err(GitError::RemoteNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo
            .remote(name, url)
            .map(|_| ())
            .map_err(|e| GitError::from_git2(e, &format!("add remote {}", name)))
    }

    fn set_push_url(&mut self, name: &str, push_url: &str) -> Result<(), GitError> {
        self.find_git2_remote(name)?;
        self.repo
            .remote_set_pushurl(name, Some(push_url))
            .map_err(|e| GitError::from_git2(e, &format!("set push url of {}", name)))
    }

    fn fetch(
        &mut self,
        remote: &str,
        refspecs: &[String],
        credentials: &Credentials,
    ) -> Result<(), GitError> {
        let mut git_remote = self.find_git2_remote(remote)?;

        let mut options = FetchOptions::new();
        options.remote_callbacks(remote_callbacks(credentials));
        options.prune(git2::FetchPrune::On);

        let specs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
        git_remote
            .fetch(&specs, Some(&mut options), None)
            .map_err(|e| GitError::from_git2(e, &format!("fetch {}", remote)))
    }

    fn merge(&mut self, source: &str, _signature: &Signature) -> Result<MergeOutcome, GitError> {
        let reference = self.resolve_reference(source)?;
        let annotated = self
            .repo
            .reference_to_annotated_commit(&reference)
            .map_err(|e| GitError::from_git2(e, source))?;

        let (analysis, _) = self
            .repo
            .merge_analysis(&[&annotated])
            .map_err(|e| GitError::from_git2(e, "merge analysis"))?;

        if analysis.is_up_to_date() {
            return Ok(MergeOutcome::with_status(MergeStatus::UpToDate));
        }

        if analysis.is_fast_forward() {
            let target = self
                .repo
                .find_object(annotated.id(), None)
                .map_err(|e| GitError::from_git2(e, source))?;

            // Update the working tree while HEAD still names the old tree, so
            // the safe strategy can tell local edits from incoming changes.
            let mut checkout = CheckoutBuilder::new();
            checkout.safe();
            self.repo
                .checkout_tree(&target, Some(&mut checkout))
                .map_err(|e| GitError::from_git2(e, "fast-forward checkout"))?;

            let mut head = self
                .repo
                .head()
                .map_err(|e| GitError::from_git2(e, "HEAD"))?;
            head.set_target(annotated.id(), &format!("fast-forward to {}", source))
                .map_err(|e| GitError::from_git2(e, "fast-forward"))?;
            return Ok(MergeOutcome::with_status(MergeStatus::FastForward));
        }

        let mut checkout = CheckoutBuilder::new();
        checkout.safe().allow_conflicts(true).conflict_style_merge(true);
        self.repo
            .merge(&[&annotated], None, Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, &format!("merge {}", source)))?;

        let conflicted = self.conflicted_paths()?;
        if conflicted.is_empty() {
            Ok(MergeOutcome::with_status(MergeStatus::NonFastForward))
        } else {
            Ok(MergeOutcome::conflicts(conflicted))
        }
    }

    fn branches(&self) -> Result<Vec<String>, GitError> {
        let iter = self
            .repo
            .branches(None)
            .map_err(|e| GitError::from_git2(e, "list branches"))?;

        let mut names = Vec::new();
        for entry in iter {
            let (branch, kind) = entry.map_err(|e| GitError::from_git2(e, "read branch"))?;
            let Some(name) = branch
                .name()
                .map_err(|e| GitError::from_git2(e, "branch name"))?
            else {
                continue;
            };
            // Symbolic remote HEADs are not branches anyone can check out.
            if kind == BranchType::Remote && name.ends_with("/HEAD") {
                continue;
            }
            names.push(name.to_string());
        }
        Ok(names)
    }

    fn local_branch_exists(&self, name: &str) -> Result<bool, GitError> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) if e.code() == git2::ErrorCode::InvalidSpec => Ok(false),
            Err(e) => Err(GitError::from_git2(e, name)),
        }
    }

    fn head_branch(&self) -> Result<Option<String>, GitError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(String::from))
    }

    fn create_branch(&mut self, name: &str, start_point: &str) -> Result<(), GitError> {
        let reference = self.resolve_reference(start_point)?;
        let commit = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, start_point))?;
        self.repo
            .branch(name, &commit, false)
            .map(|_| ())
            .map_err(|e| GitError::from_git2(e, &format!("create branch {}", name)))
    }

    fn checkout_branch(&mut self, name: &str, mode: CheckoutMode) -> Result<(), GitError> {
        let refname = format!("refs/heads/{}", name);
        let target = self
            .repo
            .revparse_single(&refname)
            .map_err(|_| GitError::BranchNotFound {
                name: name.to_string(),
            })?;

        let mut checkout = CheckoutBuilder::new();
        match mode {
            CheckoutMode::Force => checkout.force(),
            CheckoutMode::Safe => checkout.safe(),
        };
        checkout.notify_on(CheckoutNotificationType::CONFLICT | CheckoutNotificationType::UPDATED);
        checkout.notify(|kind, path, _, _, _| {
            let path = path.map(|p| p.display().to_string()).unwrap_or_default();
            if kind.contains(CheckoutNotificationType::CONFLICT) {
                debug!(%path, "checkout conflict");
            } else {
                trace!(%path, "checkout updated");
            }
            true
        });

        self.repo
            .checkout_tree(&target, Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, &format!("checkout {}", name)))?;
        self.repo
            .set_head(&refname)
            .map_err(|e| GitError::from_git2(e, &format!("set HEAD to {}", name)))
    }

    fn set_upstream(&mut self, branch: &str, remote: &str) -> Result<(), GitError> {
        self.find_git2_remote(remote)?;
        let mut config = self
            .repo
            .config()
            .map_err(|e| GitError::from_git2(e, "open config"))?;
        config
            .set_str(&format!("branch.{}.remote", branch), remote)
            .map_err(|e| GitError::from_git2(e, "set branch remote"))?;
        config
            .set_str(
                &format!("branch.{}.merge", branch),
                &format!("refs/heads/{}", branch),
            )
            .map_err(|e| GitError::from_git2(e, "set branch merge"))
    }

    fn status(&self, options: &StatusOptions) -> Result<Vec<StatusEntry>, GitError> {
        let mut git_options = git2::StatusOptions::new();
        git_options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(options.include_ignored)
            .recurse_ignored_dirs(false)
            .include_unmodified(false);

        let statuses = self
            .repo
            .statuses(Some(&mut git_options))
            .map_err(|e| GitError::from_git2(e, "status"))?;

        Ok(statuses
            .iter()
            .filter_map(|entry| {
                let path = entry.path()?.to_string();
                match file_state(entry.status()) {
                    FileState::Unaltered => None,
                    state => Some(StatusEntry { path, state }),
                }
            })
            .collect())
    }

    fn stage(&mut self, paths: &[String]) -> Result<(), GitError> {
        // MERGE_HEAD is read first: `mergehead_foreach` needs the repository
        // mutably, before any tree or commit borrows it.
        let merging = self.repo.state() == git2::RepositoryState::Merge;
        let mut merge_heads = Vec::new();
        if merging {
            self.repo
                .mergehead_foreach(|oid| {
                    merge_heads.push(*oid);
                    true
                })
                .map_err(|e| GitError::from_git2(e, "read MERGE_HEAD"))?;
        }

        let mut index = self
            .repo
            .index()
            .map_err(|e| GitError::from_git2(e, "read index"))?;
        let tree_id = index
            .write_tree()
            .map_err(|e| GitError::from_git2(e, "write tree"))?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(|e| GitError::from_git2(e, "find tree"))?;

        let mut parents = Vec::new();
        if let Ok(head) = self.repo.head() {
            if let Ok(commit) = head.peel_to_commit() {
                parents.push(commit);
            }
        }
        for oid in merge_heads {
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| GitError::from_git2(e, "find merge head"))?;
            parents.push(commit);
        }

        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        let oid = self
            .repo
            .commit(
                Some("HEAD"),
                &author,
                &committer,
                message,
                &tree,
                &parent_refs,
            )
            .map_err(|e| GitError::from_git2(e, "commit"))?;

        if merging {
            self.repo
                .cleanup_state()
                .map_err(|e| GitError::from_git2(e, "clean up merge state"))?;
        }

        debug!(%oid, "commit created");
        Ok(oid.to_string())
    }

    fn push(
        &mut self,
        remote: &str,
        branch: &str,
        credentials: &Credentials,
    ) -> Result<(), GitError> {
        let mut git_remote = self.find_git2_remote(remote)?;
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);

        let rejected = RefCell::new(Vec::new());
        {
            let mut callbacks = remote_callbacks(credentials);
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejected
                        .borrow_mut()
                        .push(format!("{} {}", message, refname));
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            git_remote
                .push(&[refspec.as_str()], Some(&mut options))
                .map_err(|e| GitError::from_git2(e, &format!("push {} to {}", branch, remote)))?;
        }

        let rejected = rejected.into_inner();
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(GitError::PushRejected {
                details: rejected.join(", "),
            })
        }
    }

    fn ahead_count(&self) -> Result<Option<usize>, GitError> {
        let Some(name) = self.head_branch()? else {
            return Ok(None);
        };
        let branch = self
            .repo
            .find_branch(&name, BranchType::Local)
            .map_err(|e| GitError::from_git2(e, &name))?;
        let upstream = match branch.upstream() {
            Ok(upstream) => upstream,
            Err(_) => return Ok(None),
        };

        let (Some(local), Some(remote)) = (branch.get().target(), upstream.get().target()) else {
            return Ok(None);
        };
        let (ahead, _behind) = self
            .repo
            .graph_ahead_behind(local, remote)
            .map_err(|e| GitError::from_git2(e, "ahead/behind"))?;
        Ok(Some(ahead))
    }
}
