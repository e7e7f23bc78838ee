//! core
//!
//! Domain types and pure algorithms for Lockstep.
//!
//! # Modules
//!
//! - [`config`] - Settings loading and the workspace/module/registry schema
//! - [`policy`] - Credentials, clone parameters and the push-URL rule
//! - [`branches`] - Branch partitioning and cross-module reconciliation
//! - [`changes`] - Change kinds and change records
//! - [`lock`] - Per-workspace advisory lock
//! - [`paths`] - Centralized path routing for Lockstep storage
//!
//! # Design Principles
//!
//! - Nothing here performs network I/O
//! - Reconciliation is deterministic and order-preserving

pub mod branches;
pub mod changes;
pub mod config;
pub mod lock;
pub mod paths;
pub mod policy;
