//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Module operations talk to
//! repositories through the [`GitEngine`] and [`Repository`] traits; no
//! other module imports `git2`.
//!
//! - [`interface`]: the traits, value types and [`GitError`]
//! - [`git2_engine`]: the production engine built on `git2`
//! - [`mock`]: an in-memory engine for deterministic tests
//!
//! # Example
//!
//! ```ignore
//! use lockstep::git::{Git2Engine, GitEngine, StatusOptions};
//! use std::path::Path;
//!
//! let engine = Git2Engine::new();
//! let repo = engine.open(Path::new("/work/app"))?;
//!
//! let branches = repo.branches()?;
//! let changes = repo.status(&StatusOptions::default())?;
//! ```

mod git2_engine;
mod interface;
pub mod mock;

pub use git2_engine::{Git, Git2Engine};
pub use interface::{
    CheckoutMode, CloneParams, Credentials, FileState, GitEngine, GitError, MergeOutcome,
    MergeStatus, RemoteInfo, Repository, Signature, StatusEntry, StatusOptions,
};
