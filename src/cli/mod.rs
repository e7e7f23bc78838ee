//! cli
//!
//! Command-line interface layer for Lockstep.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load settings and build the orchestrator with a console host
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Every repository change flows through the
//! [`crate::engine::Orchestrator`]; handlers only select the workspace,
//! call one façade operation and render the result.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::git::Git2Engine;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.home.as_deref()).context("failed to load settings")?;
    commands::dispatch(cli, &config, Arc::new(Git2Engine::new())).await
}
