//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--workspace <name>`: Select a workspace by name
//! - `--path <dir>`: Select the workspace owning a directory
//! - `--home <dir>`: Settings directory (overrides `LOCKSTEP_HOME`)
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lockstep - drive several git checkouts as one workspace
#[derive(Parser, Debug)]
#[command(name = "lockstep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace to operate on (defaults to `default_workspace`, then the
    /// workspace owning the current directory)
    #[arg(short, long, global = true, conflicts_with = "path")]
    pub workspace: Option<String>,

    /// Select the workspace owning this directory
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    /// Settings directory (overrides LOCKSTEP_HOME)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    // ========== Registry ==========
    /// List registered workspaces
    List,

    /// Register a workspace (or replace one with the same name)
    #[command(
        name = "add",
        long_about = "Register a workspace in the registry.\n\n\
            Modules are given as NAME=URL, optionally followed by a secondary \
            remote as NAME=URL,TEAM_URL. Every module is checked out under \
            ROOT/NAME.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Two modules, the first also fetching from a team remote
    lockstep add product --root ~/src/product --branch main \\
        --module framework=https://git.example.com/me/fw.git,https://git.example.com/team/fw.git \\
        --module tools=https://git.example.com/me/tools.git

    # Then clone everything
    lockstep -w product clone"
    )]
    Add {
        /// Workspace name
        name: String,

        /// Directory holding the module checkouts
        #[arg(long)]
        root: PathBuf,

        /// Branch every module is kept on
        #[arg(long, default_value = "main")]
        branch: String,

        /// Module as NAME=URL[,SECONDARY_URL]
        #[arg(long = "module", value_name = "SPEC", required = true)]
        modules: Vec<String>,

        /// Name of every module's primary remote
        #[arg(long, default_value = "origin")]
        primary_remote: String,

        /// Name of the secondary remote for modules that have one
        #[arg(long, default_value = "team")]
        secondary_remote: String,

        /// User name for authentication and commits
        #[arg(long, default_value = "")]
        user: String,

        /// Email for commits
        #[arg(long, default_value = "")]
        email: String,
    },

    /// Save the selected workspace to the single-workspace document
    Save,

    /// Print the selected workspace as JSON (password omitted)
    Export,

    // ========== State ==========
    /// Show branch, ahead count and changed files of the workspace
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the branches present in every module
    Branches,

    // ========== Commands ==========
    /// Clone every module
    Clone,

    /// Fetch the primary and secondary remotes of every module
    Fetch,

    /// Fetch and integrate the primary and secondary remotes
    #[command(
        name = "pull",
        long_about = "Update every module from its remotes.\n\n\
            The primary remote's branch is integrated first; modules with a \
            secondary remote then merge <secondary>/<branch>. A clean merge is \
            committed automatically; a conflicting one is left for you to resolve.",
        after_help = "\
WORKFLOW EXAMPLES:
    lockstep pull
    lockstep status           # see anything left conflicted"
    )]
    Pull,

    /// Merge a branch into every module's current branch
    Merge {
        /// Branch to merge, e.g. team/release
        source: String,
    },

    /// Switch every module to a branch
    #[command(
        name = "checkout",
        long_about = "Switch every module to a branch.\n\n\
            A module without the local branch gets it created from REMOTE_BRANCH, \
            tracking the primary remote. Uncommitted modifications are DISCARDED \
            unless --safe is given.",
        after_help = "\
WORKFLOW EXAMPLES:
    # origin/feature/login checked out as feature/login
    lockstep checkout origin/feature/login

    # Refuse to switch modules with local modifications
    lockstep checkout origin/release --safe"
    )]
    Checkout {
        /// Remote-tracking branch, e.g. origin/feature/login
        remote_branch: String,

        /// Local branch name (defaults to REMOTE_BRANCH without the remote)
        #[arg(short, long)]
        branch: Option<String>,

        /// Keep local modifications; modules with changes fail instead
        #[arg(long)]
        safe: bool,
    },

    /// Commit the changes of every module
    Commit {
        /// Label placed in front of the message as [LABEL]
        #[arg(long = "module", value_name = "LABEL")]
        label: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Push every module's workspace branch to its primary remote
    Push {
        /// Do not run the configured push gate
        #[arg(long)]
        skip_gate: bool,
    },
}

impl Command {
    /// Whether the command works on the registry only.
    pub fn is_registry_only(&self) -> bool {
        matches!(self, Command::List | Command::Add { .. })
    }

    /// Whether the command talks to remotes.
    pub fn needs_credentials(&self) -> bool {
        matches!(
            self,
            Command::Clone
                | Command::Fetch
                | Command::Pull
                | Command::Merge { .. }
                | Command::Checkout { .. }
                | Command::Push { .. }
        )
    }
}
