//! Gatekeeper block-list checks
//!
//! Static deny rules enforced before any permission level is consulted:
//! - blocked path substrings (a `dir/` entry also blocks `dir` itself)
//! - control characters in paths
//! - write extension allowlist
//! - dangerous command names
//! - the audit log itself is never a mutation target

use crate::core::audit::AUDIT_LOG_NAME;
use crate::core::external_action::command_stem;
use crate::core::operation::{Operation, OperationKind};
use crate::plugins::policy::PolicySettings;
use std::collections::BTreeSet;
use std::fmt;

/// Gatekeeper check result
#[derive(Debug)]
pub struct GateResult {
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl GateResult {
    /// First violation message, used as the decision reason.
    pub fn summary(&self) -> Option<&str> {
        self.violations.first().map(|v| v.message.as_str())
    }
}

/// Individual violation
#[derive(Debug)]
pub struct Violation {
    pub kind: ViolationKind,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    PathBlocked,
    ExtensionBlocked,
    DangerousCommand,
    ProtectedPath,
    ControlCharacter,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathBlocked => write!(f, "Path blocked"),
            Self::ExtensionBlocked => write!(f, "Extension blocked"),
            Self::DangerousCommand => write!(f, "Dangerous command"),
            Self::ProtectedPath => write!(f, "Protected path"),
            Self::ControlCharacter => write!(f, "Control character"),
        }
    }
}

/// Run all block-list checks for one operation.
pub fn check_operation(op: &Operation, settings: &PolicySettings) -> GateResult {
    let mut violations = Vec::new();

    if op.path.chars().any(char::is_control) {
        violations.push(Violation {
            kind: ViolationKind::ControlCharacter,
            path: op.path.clone(),
            message: "path contains control characters".to_string(),
        });
    }

    for blocked in &settings.blocked_paths {
        if matches_blocked_path(&op.path, blocked) {
            violations.push(Violation {
                kind: ViolationKind::PathBlocked,
                path: op.path.clone(),
                message: format!("path matches blocked pattern: {}", blocked),
            });
        }
    }

    let kind = op.kind();
    match kind {
        OperationKind::Write | OperationKind::Create => {
            if let Some(ext) = extension_of(&op.path) {
                if !settings.allowed_extensions.contains(&ext) {
                    violations.push(Violation {
                        kind: ViolationKind::ExtensionBlocked,
                        path: op.path.clone(),
                        message: format!("extension {} is not allowed", ext),
                    });
                }
            }
        }
        OperationKind::Execute => {
            if !settings.dangerous_commands_confirmable
                && is_dangerous_command(&op.path, &settings.dangerous_commands)
            {
                violations.push(Violation {
                    kind: ViolationKind::DangerousCommand,
                    path: op.path.clone(),
                    message: format!("command {} is on the dangerous list", op.path),
                });
            }
        }
        OperationKind::Read | OperationKind::Delete | OperationKind::List => {}
    }

    if kind.is_mutating() && targets_audit_log(&op.path) {
        violations.push(Violation {
            kind: ViolationKind::ProtectedPath,
            path: op.path.clone(),
            message: format!("{} is the audit log", op.path),
        });
    }

    let passed = violations.is_empty();
    GateResult { passed, violations }
}

/// Case-insensitive substring match of the command's base name against the list.
pub fn is_dangerous_command(command: &str, dangerous: &BTreeSet<String>) -> bool {
    let stem = command_stem(command);
    dangerous
        .iter()
        .map(|d| d.to_lowercase())
        .any(|d| !d.is_empty() && stem.contains(&d))
}

/// Lowercased extension including the dot. Dotfiles count as their own
/// extension (`.env`); a trailing dot means none.
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let idx = name.rfind('.')?;
    if idx + 1 == name.len() {
        return None;
    }
    Some(name[idx..].to_lowercase())
}

/// Case-insensitive substring match with `\\` read as `/`. An entry naming a
/// directory (`bin/`) also matches a path whose last component is that
/// directory, since deleting it removes everything below.
pub fn matches_blocked_path(path: &str, blocked: &str) -> bool {
    let needle = blocked.to_lowercase().replace('\\', "/");
    if needle.is_empty() {
        return false;
    }
    let path = path.to_lowercase().replace('\\', "/");
    if path.contains(&needle) {
        return true;
    }
    match needle.strip_suffix('/') {
        Some(dir) if !dir.is_empty() => path.trim_end_matches('/').rsplit('/').next() == Some(dir),
        _ => false,
    }
}

fn targets_audit_log(path: &str) -> bool {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.len() == 1 && parts[0].eq_ignore_ascii_case(AUDIT_LOG_NAME)
}
