//! CLI struct definitions for the opwarden command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use crate::plugins::policy::{self, PermissionLevel};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "opwarden",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mediates file and command operations requested by a text generator: extract, authorize, execute in a sandboxed workspace, audit.",
    disable_version_flag = true
)]
pub(crate) struct Cli {
    #[clap(flatten)]
    pub global: GlobalArgs,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub(crate) struct GlobalArgs {
    /// Workspace root (defaults to the current directory).
    #[clap(long, short = 'w', global = true)]
    pub workspace: Option<PathBuf>,
    /// Config file (defaults to `<workspace>/.opwarden/config.toml`).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the configured permission level: read_only, safe_write or full_access.
    #[clap(long, global = true)]
    pub permission: Option<PermissionLevel>,
    /// Skip dry-run previews in confirmation prompts.
    #[clap(long, global = true)]
    pub no_dry_run: bool,
    /// Do not write audit records.
    #[clap(long, global = true)]
    pub no_audit: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Mediate the operation blocks in a generated response
    Process(ProcessCli),

    /// Send a prompt to a generator command and mediate its reply
    Chat(ChatCli),

    /// Risk classification and permission decisions
    Policy(policy::PolicyCli),

    /// Inspect the audit log
    Audit(AuditCli),

    /// List a workspace directory
    Ls {
        /// Workspace-relative directory.
        #[clap(default_value = ".")]
        path: String,
    },

    /// Print a workspace file
    Cat {
        /// Workspace-relative file.
        path: String,
    },

    /// Print version
    Version,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ProcessCli {
    /// File holding the response text (reads stdin if omitted).
    #[clap(long, short = 'i')]
    pub input: Option<PathBuf>,
    /// Deny every confirmation instead of prompting.
    #[clap(long)]
    pub non_interactive: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ChatCli {
    /// The request. `@path` mentions are added to the file context.
    pub prompt: String,
    /// Program that reads the prompt on stdin and writes the completion to stdout.
    #[clap(long)]
    pub generator: String,
    /// Argument passed to the generator program (repeatable).
    #[clap(long = "generator-arg")]
    pub generator_args: Vec<String>,
    /// Extra file or directory to include as context (repeatable).
    #[clap(long = "file", short = 'f')]
    pub files: Vec<String>,
    /// Deny every confirmation instead of prompting.
    #[clap(long)]
    pub non_interactive: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct AuditCli {
    #[clap(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum AuditCommand {
    /// Show the most recent audit records
    Tail {
        /// Number of records.
        #[clap(long, short = 'n', default_value_t = 10)]
        count: usize,
    },
}
