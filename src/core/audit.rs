//! Append-only audit trail of every policy decision and its outcome.
//!
//! Records are multi-line text blocks terminated by a blank line and written
//! with a single `write_all` on an append handle, so a record is either fully
//! present or absent. Nothing in the crate rewrites or truncates the file.

use crate::core::error::WardenError;
use crate::core::operation::Operation;
use crate::core::time;
use crate::plugins::policy::{Decision, PermissionLevel, RiskLevel};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const AUDIT_LOG_NAME: &str = "audit.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    DeniedByUser,
    BlockedByPolicy,
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::DeniedByUser => write!(f, "DENIED by user"),
            Self::BlockedByPolicy => write!(f, "BLOCKED by policy"),
            Self::Failed(msg) => write!(f, "FAILED: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: String,
    /// `name path` as written by the generator
    pub operation: String,
    pub decision: Decision,
    pub outcome: Outcome,
    pub risk: RiskLevel,
    pub permission_level: PermissionLevel,
}

impl AuditRecord {
    pub fn new(
        op: &Operation,
        decision: Decision,
        outcome: Outcome,
        risk: RiskLevel,
        permission_level: PermissionLevel,
    ) -> Self {
        Self {
            timestamp: time::now_local_stamp(),
            operation: op.label(),
            decision,
            outcome,
            risk,
            permission_level,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "[{}] {}\n  Permission: {} - {}\n  Outcome: {}\n  Risk Level: {}\n  User Permission Level: {}\n\n",
            self.timestamp,
            single_line(&self.operation),
            if self.decision.allowed { "ALLOWED" } else { "DENIED" },
            single_line(&self.decision.reason),
            single_line(&self.outcome.to_string()),
            self.risk,
            self.permission_level
        )
    }
}

/// Escape control characters so generator-supplied text cannot start a new
/// line (or a new record) in the log.
fn single_line(text: &str) -> String {
    if !text.chars().any(char::is_control) {
        return text.to_string();
    }
    text.chars()
        .map(|c| {
            if c.is_control() {
                c.escape_default().to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// Writer for `<workspace>/audit.log`.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    enabled: bool,
}

impl AuditLog {
    pub fn new(workspace_root: &Path, enabled: bool) -> Self {
        Self {
            path: workspace_root.join(AUDIT_LOG_NAME),
            enabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Disabled logs accept and drop records.
    pub fn append(&self, record: &AuditRecord) -> Result<(), WardenError> {
        if !self.enabled {
            return Ok(());
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(WardenError::IoError)?;
        f.write_all(record.render().as_bytes())
            .map_err(WardenError::IoError)
    }

    /// Append, swallowing failures. Auditing never changes control flow.
    pub fn record(&self, record: &AuditRecord) {
        if let Err(e) = self.append(record) {
            tracing::warn!(path = %self.path.display(), error = %e, "audit write failed");
        }
    }

    /// The last `n` record blocks, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<String>, WardenError> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&self.path).map_err(WardenError::IoError)?;
        let blocks: Vec<String> = content
            .split("\n\n")
            .map(str::trim_end)
            .filter(|b| !b.trim().is_empty())
            .map(str::to_string)
            .collect();
        let start = blocks.len().saturating_sub(n);
        Ok(blocks[start..].to_vec())
    }
}
