//! Kind dispatch over the sandboxed store.
//!
//! Every arm goes through [`Store`], so the containment check runs here too
//! and not only at the orchestrator boundary.

use crate::core::error::WardenError;
use crate::core::external_action;
use crate::core::operation::{Operation, OperationKind};
use crate::core::store::Store;

/// Perform `op` and return the text reported on its result line.
pub fn execute(store: &Store, op: &Operation) -> Result<String, WardenError> {
    let content = op.content.as_deref().unwrap_or_default();
    tracing::debug!(op = %op.label(), kind = %op.kind(), "executing operation");
    match op.kind() {
        OperationKind::Read => store.read_file(&op.path),
        OperationKind::Write => {
            store.write_file(&op.path, content)?;
            Ok("File written successfully".to_string())
        }
        OperationKind::Create => {
            store.create_file(&op.path, content)?;
            Ok("File written successfully".to_string())
        }
        OperationKind::Delete => {
            store.delete(&op.path)?;
            Ok("File deleted successfully".to_string())
        }
        OperationKind::List => {
            let files = store.list(&op.path)?;
            Ok(format!("Files found: {}", files.join(", ")))
        }
        OperationKind::Execute => {
            let program = if external_action::is_path_like(&op.path) {
                store.resolve(&op.path)?.to_string_lossy().to_string()
            } else {
                op.path.clone()
            };
            let output = external_action::run_command(store.root(), &program, op.arguments())?;
            Ok(output.render())
        }
    }
}
