//! Risk classification and permission decisions.
//!
//! A decision is computed in two ordered stages:
//! - **Stage A** ([`gatekeeper`]): block-list rules that deny regardless of
//!   permission level.
//! - **Stage B**: the permission-level table over [`RiskLevel`].
//!
//! `RequireConfirmation` verdicts are resolved by the orchestrator through the
//! confirmation port; the only runtime mutation of policy state is
//! [`PolicyState::elevate`].

use crate::core::error;
use crate::core::gatekeeper;
use crate::core::operation::{Operation, OperationKind};
use crate::core::store::Store;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[clap(name = "policy", about = "Evaluate risk and permission decisions")]
pub struct PolicyCli {
    #[clap(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Classify and decide one operation without executing it.
    Eval {
        /// Operation name as a generator would write it (e.g. WRITE_FILE).
        #[clap(long)]
        operation: String,
        /// Workspace-relative target (the command for execute).
        #[clap(long)]
        path: String,
        /// Command argument (repeatable).
        #[clap(long = "arg")]
        args: Vec<String>,
        /// Content for write/create previews.
        #[clap(long)]
        content: Option<String>,
    },
    /// Show the active policy settings.
    Show,
}

pub fn run_policy_cli(
    store: &Store,
    state: &PolicyState,
    cli: PolicyCli,
) -> Result<(), error::WardenError> {
    match cli.command {
        PolicyCommand::Eval {
            operation,
            path,
            args,
            content,
        } => {
            let mut op = Operation::new(operation, path);
            if !args.is_empty() {
                op = op.with_arguments(args);
            }
            if let Some(content) = content {
                op = op.with_content(content);
            }
            let assessment = state.assess(&op, store)?;
            println!("Operation: {} ({})", op.label(), op.kind());
            println!("Risk Level: {}", assessment.risk);
            println!("Permission Level: {}", state.permission_level());
            println!("Verdict: {}", assessment.decision.verdict_label());
            println!("Reason: {}", assessment.decision.reason);
            println!("Preview: {}", preview(&op, store));
        }
        PolicyCommand::Show => {
            let rendered = toml::to_string_pretty(state.settings())
                .map_err(|e| error::WardenError::ConfigError(e.to_string()))?;
            println!("{}", rendered);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Safe,      // Read-only
    Moderate,  // Creates new data
    Dangerous, // Modifies or removes existing data
}

impl RiskLevel {
    pub fn description(self) -> &'static str {
        match self {
            Self::Safe => "safe (reads data only)",
            Self::Moderate => "moderate (creates new data)",
            Self::Dangerous => "dangerous (modifies or deletes existing data)",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Moderate => write!(f, "Moderate"),
            Self::Dangerous => write!(f, "Dangerous"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Read and list only
    ReadOnly,
    /// New files are fine; modifying or deleting existing data asks first
    #[default]
    SafeWrite,
    /// Everything Stage A lets through runs without asking
    FullAccess,
}

impl PermissionLevel {
    pub fn description(self) -> &'static str {
        match self {
            Self::ReadOnly => "read files only",
            Self::SafeWrite => "create new files; modifications require confirmation",
            Self::FullAccess => "all operations without confirmation",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "ReadOnly"),
            Self::SafeWrite => write!(f, "SafeWrite"),
            Self::FullAccess => write!(f, "FullAccess"),
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "readonly" => Ok(Self::ReadOnly),
            "safewrite" => Ok(Self::SafeWrite),
            "fullaccess" => Ok(Self::FullAccess),
            _ => Err(format!(
                "unknown permission level '{}' (expected read_only, safe_write or full_access)",
                s
            )),
        }
    }
}

/// Standing policy configuration. Outlives every orchestration pass.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PolicySettings {
    pub permission_level: PermissionLevel,
    pub dry_run: bool,
    pub audit: bool,
    /// Lowercase, dot-prefixed (`.cs`)
    pub allowed_extensions: BTreeSet<String>,
    pub blocked_paths: BTreeSet<String>,
    pub dangerous_commands: BTreeSet<String>,
    /// Route dangerous commands to confirmation instead of a Stage A deny.
    pub dangerous_commands_confirmable: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        let set = |items: &[&str]| -> BTreeSet<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            permission_level: PermissionLevel::SafeWrite,
            dry_run: true,
            audit: true,
            allowed_extensions: set(&[".cs", ".txt", ".json", ".md", ".xml"]),
            blocked_paths: set(&["bin/", "obj/", ".git/", "node_modules/", ".opwarden/"]),
            dangerous_commands: set(&["rm", "del", "format", "fdisk", "shutdown"]),
            dangerous_commands_confirmable: false,
        }
    }
}

impl PolicySettings {
    /// Canonical forms: extensions lowercase with a leading dot, no blank entries.
    pub fn normalized(mut self) -> Self {
        self.allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|e| if e.starts_with('.') { e } else { format!(".{}", e) })
            .collect();
        self.blocked_paths = self
            .blocked_paths
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self.dangerous_commands = self
            .dangerous_commands
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStage {
    BlockList,
    PermissionTable,
    Confirmation,
}

/// Outcome of policy evaluation. `requires_confirmation` implies `!allowed`
/// until the confirmation port resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub requires_confirmation: bool,
    pub reason: String,
    pub stage: DecisionStage,
}

impl Decision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            requires_confirmation: false,
            reason: reason.into(),
            stage: DecisionStage::PermissionTable,
        }
    }

    fn deny(reason: impl Into<String>, stage: DecisionStage) -> Self {
        Self {
            allowed: false,
            requires_confirmation: false,
            reason: reason.into(),
            stage,
        }
    }

    fn require_confirmation(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            requires_confirmation: true,
            reason: reason.into(),
            stage: DecisionStage::PermissionTable,
        }
    }

    /// Denial for an operation whose facts could not be gathered.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::deny(reason, DecisionStage::PermissionTable)
    }

    /// Resolve a pending confirmation as approved.
    pub fn approved(&self, elevated: bool) -> Self {
        let reason = if elevated {
            format!("Approved by user, elevated to {}", PermissionLevel::FullAccess)
        } else {
            "Approved by user".to_string()
        };
        Self {
            allowed: true,
            requires_confirmation: false,
            reason,
            stage: DecisionStage::Confirmation,
        }
    }

    /// Resolve a pending confirmation as declined.
    pub fn declined(&self) -> Self {
        Self::deny(
            format!("Denied by user ({})", self.reason),
            DecisionStage::Confirmation,
        )
    }

    pub fn verdict_label(&self) -> &'static str {
        match (self.allowed, self.requires_confirmation) {
            (true, _) => "ALLOW",
            (false, true) => "REQUIRE_CONFIRMATION",
            (false, false) => "DENY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub risk: RiskLevel,
    pub decision: Decision,
}

/// Pure risk classification.
pub fn classify(kind: OperationKind, target_exists: bool, command_is_dangerous: bool) -> RiskLevel {
    match kind {
        OperationKind::Read | OperationKind::List => RiskLevel::Safe,
        OperationKind::Write | OperationKind::Create => {
            if target_exists {
                RiskLevel::Dangerous
            } else {
                RiskLevel::Moderate
            }
        }
        OperationKind::Delete => RiskLevel::Dangerous,
        OperationKind::Execute => {
            if command_is_dangerous {
                RiskLevel::Dangerous
            } else {
                RiskLevel::Moderate
            }
        }
    }
}

/// Stage B: permission level x risk.
pub fn permission_table(level: PermissionLevel, risk: RiskLevel, op_name: &str) -> Decision {
    match (level, risk) {
        (PermissionLevel::ReadOnly, RiskLevel::Safe) => Decision::allow("Read-only operation"),
        (PermissionLevel::ReadOnly, RiskLevel::Moderate | RiskLevel::Dangerous) => Decision::deny(
            "Permission level ReadOnly does not allow modifying files",
            DecisionStage::PermissionTable,
        ),
        (PermissionLevel::SafeWrite, RiskLevel::Safe) => Decision::allow("Safe operation"),
        (PermissionLevel::SafeWrite, RiskLevel::Moderate) => {
            Decision::allow("Moderate operation allowed")
        }
        (PermissionLevel::SafeWrite, RiskLevel::Dangerous) => Decision::require_confirmation(
            format!("Operation {} is risky and requires user permission", op_name),
        ),
        (PermissionLevel::FullAccess, _) => Decision::allow("Full access granted"),
    }
}

/// Both stages over precomputed facts. Stage A denial is final.
pub fn decide(
    settings: &PolicySettings,
    op: &Operation,
    gate: &gatekeeper::GateResult,
    risk: RiskLevel,
) -> Decision {
    if !gate.passed {
        return Decision::deny(
            format!(
                "Operation {} blocked by security policy: {}",
                op.name,
                gate.summary().unwrap_or("block-list match")
            ),
            DecisionStage::BlockList,
        );
    }
    permission_table(settings.permission_level, risk, &op.name)
}

/// Process-wide policy handle threaded through the orchestrator.
#[derive(Debug, Clone)]
pub struct PolicyState {
    settings: PolicySettings,
}

impl PolicyState {
    pub fn new(settings: PolicySettings) -> Self {
        Self {
            settings: settings.normalized(),
        }
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    pub fn permission_level(&self) -> PermissionLevel {
        self.settings.permission_level
    }

    /// Raise the permission level to `FullAccess` for the rest of the process.
    /// Returns the previous level.
    pub fn elevate(&mut self) -> PermissionLevel {
        let previous = self.settings.permission_level;
        self.settings.permission_level = PermissionLevel::FullAccess;
        tracing::info!(from = %previous, to = %PermissionLevel::FullAccess, "permission level elevated");
        previous
    }

    /// Gather environment facts for `op` and run both decision stages.
    ///
    /// A sandbox violation while probing the target propagates unless Stage A
    /// has already denied the operation.
    pub fn assess(&self, op: &Operation, store: &Store) -> Result<Assessment, error::WardenError> {
        let kind = op.kind();
        let gate = gatekeeper::check_operation(op, &self.settings);
        let command_is_dangerous = kind == OperationKind::Execute
            && gatekeeper::is_dangerous_command(&op.path, &self.settings.dangerous_commands);
        let target_exists = match kind {
            OperationKind::Write | OperationKind::Create => match store.file_exists(&op.path) {
                Ok(exists) => exists,
                Err(e) if gate.passed => return Err(e),
                Err(_) => false,
            },
            OperationKind::Read
            | OperationKind::Delete
            | OperationKind::List
            | OperationKind::Execute => false,
        };
        let risk = classify(kind, target_exists, command_is_dangerous);
        let decision = decide(&self.settings, op, &gate, risk);
        tracing::debug!(
            op = %op.label(),
            %risk,
            verdict = decision.verdict_label(),
            reason = %decision.reason,
            "policy decision"
        );
        Ok(Assessment { risk, decision })
    }
}

/// Human-readable dry-run preview of what `op` would do.
pub fn preview(op: &Operation, store: &Store) -> String {
    match preview_inner(op, store) {
        Ok(text) => text,
        Err(e) => format!("Preview unavailable: {}", e),
    }
}

fn preview_inner(op: &Operation, store: &Store) -> Result<String, error::WardenError> {
    let path = &op.path;
    Ok(match op.kind() {
        OperationKind::Read => match store.file_size(path)? {
            Some(size) => format!("Read file {} ({} bytes)", path, size),
            None => format!("File {} not found", path),
        },
        OperationKind::Write | OperationKind::Create => match store.file_size(path)? {
            Some(size) => format!(
                "Modify existing file {} ({} -> {} bytes)",
                path,
                size,
                op.content_len()
            ),
            None => format!("Create new file {} ({} bytes)", path, op.content_len()),
        },
        OperationKind::Delete => match store.file_size(path)? {
            Some(size) => format!("Delete file {} ({} bytes)", path, size),
            None if store.dir_exists(path)? => format!("Delete directory {} recursively", path),
            None => format!("File {} not found (cannot delete)", path),
        },
        OperationKind::List => {
            if store.dir_exists(path)? {
                format!("List files in directory {}", path)
            } else {
                format!("Directory {} not found", path)
            }
        }
        OperationKind::Execute => format!("Run command: {}", op.command_line()),
    })
}
