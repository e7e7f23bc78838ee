//! core::lock
//!
//! Per-workspace advisory lock.
//!
//! Inside one process the orchestrator keeps the workspace session behind a
//! `Mutex`. Across processes (two `lockstep` invocations, or an editor
//! integration next to a terminal) a lock file under `<home>/locks/` guards
//! the same workspace:
//!
//! ```text
//! <home>/locks/<workspace>.lock
//! ```
//!
//! The lock is taken with a non-blocking exclusive `flock`, held for the
//! whole module fan-out of one command, and dropped with the guard. A busy
//! workspace is reported immediately; commands never queue behind each other.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::LockstepPaths;

#[derive(Debug, Error)]
pub enum LockError {
    /// Another command is working on the workspace.
    #[error("workspace '{workspace}' is busy with another lockstep command")]
    AlreadyLocked { workspace: String },

    #[error("cannot lock {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive hold on one workspace, released on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
    file: File,
}

impl WorkspaceLock {
    /// Lock `workspace`, failing fast with [`LockError::AlreadyLocked`] when
    /// another holder has it.
    pub fn acquire(paths: &LockstepPaths, workspace: &str) -> Result<Self, LockError> {
        let dir = paths.locks_dir();
        fs::create_dir_all(&dir).map_err(|source| LockError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = paths.lock_path(workspace);
        let io_error = |source| LockError::Io {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        if let Err(e) = file.try_lock_exclusive() {
            // fs2 reports contention as the platform's "would block" error.
            return Err(if e.kind() == fs2::lock_contended_error().kind() {
                LockError::AlreadyLocked {
                    workspace: workspace.to_string(),
                }
            } else {
                io_error(e)
            });
        }

        tracing::trace!(path = %path.display(), "workspace locked");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
