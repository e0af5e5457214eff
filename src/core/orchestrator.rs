//! One response, end to end.
//!
//! Blocks are handled strictly in the order they appear: extract, assess,
//! confirm when the permission table asks for it, execute, audit. Every
//! per-operation failure becomes a result line; nothing aborts the pass.

use crate::core::audit::{AuditLog, AuditRecord, Outcome};
use crate::core::confirm::{ConfirmationChannel, ConfirmationRequest, Verdict};
use crate::core::error::WardenError;
use crate::core::executor;
use crate::core::extract::{self, OperationBlock};
use crate::core::gatekeeper;
use crate::core::operation::Operation;
use crate::core::output::{self, compact_line};
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::policy::{self, Assessment, Decision, PolicySettings, PolicyState, RiskLevel};
use std::ops::Range;

const FAILED_BODY_PREVIEW_CHARS: usize = 160;

/// What happened to one block.
#[derive(Debug, Clone)]
pub struct BlockReport {
    pub span: Range<usize>,
    /// `None` when the block could not be decoded.
    pub operation: Option<Operation>,
    pub risk: Option<RiskLevel>,
    pub decision: Option<Decision>,
    pub outcome: Outcome,
    /// Line shown under the results header.
    pub line: String,
}

#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    /// Response with every block removed and the results section appended.
    pub text: String,
    pub reports: Vec<BlockReport>,
}

pub struct Orchestrator {
    store: Store,
    policy: PolicyState,
    audit: AuditLog,
}

impl Orchestrator {
    pub fn new(store: Store, settings: PolicySettings) -> Self {
        let policy = PolicyState::new(settings);
        let audit = AuditLog::new(store.root(), policy.settings().audit);
        Self {
            store,
            policy,
            audit,
        }
    }

    /// Open the workspace at `root` with `settings`.
    pub fn open(root: impl AsRef<std::path::Path>, settings: PolicySettings) -> Result<Self, WardenError> {
        Ok(Self::new(Store::open(root)?, settings))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn policy(&self) -> &PolicyState {
        &self.policy
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Run every operation block in `text` and return the edited response.
    pub fn process_response(
        &mut self,
        text: &str,
        confirm: &mut dyn ConfirmationChannel,
    ) -> ProcessedResponse {
        let pass_id = time::new_event_id();
        let _span = tracing::info_span!("process_response", pass = %pass_id).entered();

        let blocks = extract::extract_blocks(text);
        tracing::debug!(blocks = blocks.len(), "operation blocks found");

        let mut reports = Vec::with_capacity(blocks.len());
        for block in &blocks {
            reports.push(self.process_block(block, &mut *confirm));
        }

        let stripped = extract::strip_blocks(text, &blocks);
        let lines: Vec<String> = reports.iter().map(|r| r.line.clone()).collect();
        ProcessedResponse {
            text: output::append_results(&stripped, &lines),
            reports,
        }
    }

    fn process_block(
        &mut self,
        block: &OperationBlock,
        confirm: &mut dyn ConfirmationChannel,
    ) -> BlockReport {
        match &block.decoded {
            Ok(decoded) => self.process_operation(block.span.clone(), &decoded.operation, confirm),
            Err(failure) => {
                tracing::warn!(reason = %failure, "dropping undecodable operation block");
                BlockReport {
                    span: block.span.clone(),
                    operation: None,
                    risk: None,
                    decision: None,
                    outcome: Outcome::Failed(failure.reason()),
                    line: format!(
                        "❌ File operation failed: {} (block: {})",
                        failure.reason(),
                        compact_line(&block.body, FAILED_BODY_PREVIEW_CHARS)
                    ),
                }
            }
        }
    }

    fn process_operation(
        &mut self,
        span: Range<usize>,
        op: &Operation,
        confirm: &mut dyn ConfirmationChannel,
    ) -> BlockReport {
        let label = op.label();
        let level_at_decision = self.policy.permission_level();

        let Assessment { risk, decision } = match self.policy.assess(op, &self.store) {
            Ok(assessment) => assessment,
            Err(e) => {
                let command_is_dangerous = gatekeeper::is_dangerous_command(
                    &op.path,
                    &self.policy.settings().dangerous_commands,
                );
                let risk = policy::classify(op.kind(), false, command_is_dangerous);
                let outcome = Outcome::Failed(e.to_string());
                let decision = Decision::rejected(e.to_string());
                self.audit.record(&AuditRecord::new(
                    op,
                    decision.clone(),
                    outcome.clone(),
                    risk,
                    level_at_decision,
                ));
                return BlockReport {
                    span,
                    operation: Some(op.clone()),
                    risk: Some(risk),
                    decision: Some(decision),
                    line: format!("❌ {}: {}", label, e),
                    outcome,
                };
            }
        };

        let decision = if decision.requires_confirmation {
            let preview = self
                .policy
                .settings()
                .dry_run
                .then(|| policy::preview(op, &self.store));
            let request = ConfirmationRequest {
                operation: op,
                risk,
                preview: preview.as_deref(),
            };
            match confirm.request(&request) {
                Verdict::Approve => decision.approved(false),
                Verdict::ApproveAndElevate => {
                    self.policy.elevate();
                    decision.approved(true)
                }
                Verdict::Deny => decision.declined(),
            }
        } else {
            decision
        };

        let (outcome, line) = if decision.allowed {
            match executor::execute(&self.store, op) {
                Ok(result) => (Outcome::Success, format!("✅ {}: {}", label, result)),
                Err(e) => {
                    tracing::warn!(op = %label, error = %e, "operation failed");
                    (Outcome::Failed(e.to_string()), format!("❌ {}: {}", label, e))
                }
            }
        } else if decision.stage == policy::DecisionStage::Confirmation {
            (Outcome::DeniedByUser, format!("❌ {}: Denied by user", label))
        } else {
            (
                Outcome::BlockedByPolicy,
                format!("❌ {}: {}", label, decision.reason),
            )
        };

        self.audit.record(&AuditRecord::new(
            op,
            decision.clone(),
            outcome.clone(),
            risk,
            level_at_decision,
        ));

        BlockReport {
            span,
            operation: Some(op.clone()),
            risk: Some(risk),
            decision: Some(decision),
            outcome,
            line,
        }
    }
}
