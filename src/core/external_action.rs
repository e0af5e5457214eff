use crate::core::error::WardenError;
use std::path::Path;
use std::process::{Command, Stdio};

/// Captured result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Text reported back in-band: stdout, plus stderr when the command failed.
    pub fn render(&self) -> String {
        let mut result = self.stdout.clone();
        if !self.success() && !self.stderr.trim().is_empty() {
            result.push_str("\nError: ");
            result.push_str(&self.stderr);
        }
        result.trim().to_string()
    }
}

/// Final path segment of a command, accepting either separator style.
pub fn command_bin(command: &str) -> &str {
    command
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(command)
}

/// Lowercased base name without extension (`C:\tools\RM.exe` -> `rm`).
pub fn command_stem(command: &str) -> String {
    let bin = command_bin(command);
    let stem = match bin.rfind('.') {
        Some(idx) if idx > 0 => &bin[..idx],
        _ => bin,
    };
    stem.to_lowercase()
}

/// Whether the command names a path rather than a bare program name.
pub fn is_path_like(command: &str) -> bool {
    command.contains('/') || command.contains('\\')
}

/// Run `command` with `args` in `cwd`, waiting for completion.
///
/// A nonzero exit status is not an error here; callers report it through
/// [`CommandOutput::render`]. Failing to launch the process is.
pub fn run_command(cwd: &Path, command: &str, args: &[String]) -> Result<CommandOutput, WardenError> {
    tracing::debug!(command, ?args, cwd = %cwd.display(), "launching external command");
    let output = Command::new(command)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .map_err(WardenError::IoError)?;

    let result = CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    tracing::info!(command, exit_code = ?result.exit_code, "external command finished");
    Ok(result)
}
