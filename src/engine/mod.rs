//! engine
//!
//! Runs workspace commands across modules.
//!
//! # Architecture
//!
//! - [`module_ops`] - Per-module primitives (clone, fetch, pull, merge,
//!   checkout, commit, push, status scan), each fault-isolated
//! - [`aggregate`] - Ordered fan-out over modules and derived workspace state
//! - [`orchestrator`] - The façade: selection, validation, locking, dispatch
//! - [`host`] - Notifications to and gating by the embedding host
//! - [`log`] - The user-facing log sink
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lockstep::engine::{CommitRequest, Orchestrator};
//! use lockstep::git::Git2Engine;
//!
//! let mut orchestrator = Orchestrator::from_config(Arc::new(Git2Engine::new()), &config);
//! let state = orchestrator.select_workspace("product").await?;
//! orchestrator.pull().await?;
//! orchestrator.commit(CommitRequest::new("product", "bump versions")).await?;
//! ```

pub mod aggregate;
pub mod errors;
pub mod host;
pub mod log;
pub mod module_ops;
pub mod orchestrator;

pub use aggregate::{AggregatedState, BatchReport, ModuleResult, Operation};
pub use errors::{ModuleError, OrchestratorError, ValidationError};
pub use host::{ConsoleHost, DetachedHost, Host};
pub use log::{LogSink, MemorySink, TracingSink};
pub use orchestrator::{ChangeSummary, CheckoutRequest, CommitRequest, Orchestrator, PushOutcome};
