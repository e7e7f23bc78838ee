//! Lockstep - drive several related git checkouts as one workspace
//!
//! A workspace is a named, ordered list of modules (local git checkouts,
//! each with a primary remote and optionally a secondary "team" remote)
//! that are all kept on one branch. Lockstep fans clone, fetch, pull,
//! merge, checkout, commit and push out over the modules, isolates
//! per-module failures, and recomputes the workspace's shared branches,
//! ahead count and change list after every command.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Module operations, fan-out and the orchestrator façade
//! - [`core`] - Domain types, configuration schema and pure algorithms
//! - [`store`] - Registry and single-workspace documents
//! - [`git`] - Single interface for all Git operations
//!
//! # Correctness Invariants
//!
//! 1. Modules are processed one at a time, in declared order
//! 2. A failing module never stops the remaining modules
//! 3. Invalid command input aborts before any module is touched
//! 4. Two commands never run against the same workspace at once

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod store;
