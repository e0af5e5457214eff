//! opwarden: a mediation layer between a text generator and a workspace.
//!
//! Generated text may carry fenced operation blocks:
//!
//! ````text
//! ```fileop
//! {"operation": "WRITE_FILE", "path": "src/Program.cs", "content": "..."}
//! ```
//! ````
//!
//! Each block is decoded (tolerating the unescaped content generators tend to
//! emit), classified by risk, authorized against the active permission level,
//! optionally confirmed by a human, executed inside a sandboxed workspace and
//! written to an append-only audit log. The blocks are removed from the text
//! and a results section is appended in their place.
//!
//! # Example
//!
//! ```no_run
//! use opwarden::core::confirm::ScriptedConfirmation;
//! use opwarden::core::orchestrator::Orchestrator;
//! use opwarden::plugins::policy::PolicySettings;
//!
//! let mut orchestrator = Orchestrator::open("workspace", PolicySettings::default())?;
//! let reply = "Here you go.\n```fileop\n{\"operation\": \"CREATE_FILE\", \"path\": \"notes.md\", \"content\": \"# Notes\"}\n```";
//! let processed = orchestrator.process_response(reply, &mut ScriptedConfirmation::default());
//! println!("{}", processed.text);
//! # Ok::<(), opwarden::core::error::WardenError>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: extraction, sandboxed store, executor, audit log, orchestration
//! - [`plugins`]: risk classification and the permission policy

mod cli;
pub mod core;
pub mod plugins;

use crate::core::{
    agent::{Agent, CommandGenerator},
    audit::AuditLog,
    config,
    confirm::{AutoConfirmation, ConfirmationChannel, ConsoleConfirmation, Verdict},
    error,
    orchestrator::Orchestrator,
    prompt,
    store::Store,
};
use crate::plugins::policy::{self, PolicySettings, PolicyState};

use clap::Parser;
use std::io::Read;
use std::path::Path;

pub fn run() -> Result<(), error::WardenError> {
    let cli = cli::Cli::parse();

    if matches!(cli.command, cli::Command::Version) {
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let workspace = match cli.global.workspace.clone() {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let settings = resolve_settings(&workspace, &cli.global)?;
    let store = Store::open(&workspace)?;
    tracing::debug!(root = %store.root().display(), level = %settings.permission_level, "workspace opened");

    match cli.command {
        cli::Command::Version => {}
        cli::Command::Process(process) => {
            let text = match &process.input {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            let mut orchestrator = Orchestrator::new(store, settings);
            let processed = if process.non_interactive {
                orchestrator.process_response(&text, &mut AutoConfirmation(Verdict::Deny))
            } else {
                orchestrator.process_response(&text, &mut console_for_process(process.input.is_none()))
            };
            println!("{}", processed.text);
        }
        cli::Command::Chat(chat) => {
            let mut files = chat.files.clone();
            for mention in prompt::extract_file_mentions(&chat.prompt) {
                if !files.contains(&mention) {
                    files.push(mention);
                }
            }
            let generator = CommandGenerator::new(chat.generator, chat.generator_args);
            let mut agent = Agent::new(generator, Orchestrator::new(store, settings));
            let mut console = ConsoleConfirmation::stdio();
            let mut auto = AutoConfirmation(Verdict::Deny);
            let confirm: &mut dyn ConfirmationChannel = if chat.non_interactive {
                &mut auto
            } else {
                &mut console
            };
            let processed = agent.chat(&chat.prompt, &files, confirm)?;
            println!("{}", processed.text);
        }
        cli::Command::Policy(policy_cli) => {
            let state = PolicyState::new(settings);
            policy::run_policy_cli(&store, &state, policy_cli)?;
        }
        cli::Command::Audit(audit_cli) => match audit_cli.command {
            cli::AuditCommand::Tail { count } => {
                let log = AuditLog::new(store.root(), true);
                for record in log.tail(count)? {
                    println!("{}\n", record);
                }
            }
        },
        cli::Command::Ls { path } => {
            for entry in store.list(&path)? {
                println!("{}", entry);
            }
        }
        cli::Command::Cat { path } => {
            print!("{}", store.read_file(&path)?);
        }
    }
    Ok(())
}

/// Config file values with CLI overrides applied.
fn resolve_settings(
    workspace: &Path,
    global: &cli::GlobalArgs,
) -> Result<PolicySettings, error::WardenError> {
    let mut settings = config::load_config(workspace, global.config.as_deref())?.policy;
    if let Some(level) = global.permission {
        settings.permission_level = level;
    }
    if global.no_dry_run {
        settings.dry_run = false;
    }
    if global.no_audit {
        settings.audit = false;
    }
    Ok(settings.normalized())
}

/// Confirmation prompts need a terminal; when the response itself arrived on
/// stdin, answers are read from the controlling terminal instead.
fn console_for_process(
    response_on_stdin: bool,
) -> ConsoleConfirmation<Box<dyn std::io::BufRead>, std::io::Stdout> {
    let input: Box<dyn std::io::BufRead> = if response_on_stdin {
        match std::fs::File::open("/dev/tty") {
            Ok(tty) => Box::new(std::io::BufReader::new(tty)),
            Err(e) => {
                tracing::warn!(error = %e, "no terminal for confirmations; every confirmation will be denied");
                Box::new(std::io::empty())
            }
        }
    } else {
        Box::new(std::io::stdin().lock())
    };
    ConsoleConfirmation::new(input, std::io::stdout())
}
