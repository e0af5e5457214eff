//! Confirmation port.
//!
//! The orchestrator asks a [`ConfirmationChannel`] whenever the permission
//! table returns `RequireConfirmation`. The console implementation prompts a
//! human; tests and embedders script the answers.

use crate::core::operation::{Operation, OperationKind};
use crate::core::output::truncate_chars;
use crate::plugins::policy::RiskLevel;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

const CONTENT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Deny,
    /// Approve this operation and raise the permission level to `FullAccess`
    /// for the rest of the process.
    ApproveAndElevate,
}

impl Verdict {
    /// `y`/`yes` approve, `a`/`always` approve and elevate, anything else denies.
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Self::Approve,
            "a" | "always" => Self::ApproveAndElevate,
            _ => Self::Deny,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfirmationRequest<'a> {
    pub operation: &'a Operation,
    pub risk: RiskLevel,
    /// Dry-run preview; `None` when dry run is disabled.
    pub preview: Option<&'a str>,
}

pub trait ConfirmationChannel {
    fn request(&mut self, request: &ConfirmationRequest<'_>) -> Verdict;
}

/// Interactive prompt over any reader/writer pair.
pub struct ConsoleConfirmation<R, W> {
    input: R,
    output: W,
}

impl ConsoleConfirmation<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleConfirmation<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, request: &ConfirmationRequest<'_>) -> io::Result<Verdict> {
        use colored::Colorize;

        let op = request.operation;
        writeln!(self.output)?;
        writeln!(self.output, "{}", "Permission required".bright_yellow().bold())?;
        writeln!(self.output, "  Operation: {}", op.name)?;
        writeln!(self.output, "  Target: {}", op.path)?;
        match op.kind() {
            OperationKind::Write | OperationKind::Create => {
                if let Some(content) = op.content.as_deref() {
                    writeln!(
                        self.output,
                        "  Content preview: {}",
                        truncate_chars(content, CONTENT_PREVIEW_CHARS)
                    )?;
                }
            }
            OperationKind::Execute => {
                writeln!(self.output, "  Command: {}", op.command_line())?;
            }
            OperationKind::Read | OperationKind::Delete | OperationKind::List => {}
        }
        let risk = request.risk.description();
        let risk = match request.risk {
            RiskLevel::Safe => risk.green(),
            RiskLevel::Moderate => risk.yellow(),
            RiskLevel::Dangerous => risk.red(),
        };
        writeln!(self.output, "  Risk: {}", risk)?;
        if let Some(preview) = request.preview {
            writeln!(self.output, "  Dry run: {}", preview.cyan())?;
        }
        write!(self.output, "Allow? [y]es / [n]o / [a]lways: ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(Verdict::parse(&answer))
    }
}

impl<R: BufRead, W: Write> ConfirmationChannel for ConsoleConfirmation<R, W> {
    fn request(&mut self, request: &ConfirmationRequest<'_>) -> Verdict {
        match self.prompt(request) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "confirmation prompt failed; denying");
                Verdict::Deny
            }
        }
    }
}

/// One request as seen by a [`ScriptedConfirmation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub label: String,
    pub risk: RiskLevel,
    pub preview: Option<String>,
}

/// Answers from a fixed queue, recording every request. Denies once the
/// queue is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedConfirmation {
    verdicts: VecDeque<Verdict>,
    requests: Vec<RecordedRequest>,
}

impl ScriptedConfirmation {
    pub fn new(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            verdicts: verdicts.into_iter().collect(),
            requests: Vec::new(),
        }
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }
}

impl ConfirmationChannel for ScriptedConfirmation {
    fn request(&mut self, request: &ConfirmationRequest<'_>) -> Verdict {
        self.requests.push(RecordedRequest {
            label: request.operation.label(),
            risk: request.risk,
            preview: request.preview.map(str::to_string),
        });
        self.verdicts.pop_front().unwrap_or(Verdict::Deny)
    }
}

/// Gives the same answer to every request (`--non-interactive`).
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirmation(pub Verdict);

impl ConfirmationChannel for AutoConfirmation {
    fn request(&mut self, request: &ConfirmationRequest<'_>) -> Verdict {
        tracing::info!(op = %request.operation.label(), verdict = ?self.0, "auto-answered confirmation");
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parse() {
        assert_eq!(Verdict::parse("Y\n"), Verdict::Approve);
        assert_eq!(Verdict::parse("yes"), Verdict::Approve);
        assert_eq!(Verdict::parse(" always "), Verdict::ApproveAndElevate);
        assert_eq!(Verdict::parse("a"), Verdict::ApproveAndElevate);
        assert_eq!(Verdict::parse(""), Verdict::Deny);
        assert_eq!(Verdict::parse("sure"), Verdict::Deny);
    }

    #[test]
    fn test_console_reads_answer_and_shows_preview() {
        colored::control::set_override(false);
        let op = Operation::new("WRITE_FILE", "old.cs").with_content("x".repeat(300));
        let request = ConfirmationRequest {
            operation: &op,
            risk: RiskLevel::Dangerous,
            preview: Some("Modify existing file old.cs (3 -> 300 bytes)"),
        };
        let mut out = Vec::new();
        let verdict = {
            let mut console = ConsoleConfirmation::new("a\n".as_bytes(), &mut out);
            console.request(&request)
        };
        assert_eq!(verdict, Verdict::ApproveAndElevate);

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Operation: WRITE_FILE"));
        assert!(shown.contains(&format!("Content preview: {}...", "x".repeat(200))));
        assert!(shown.contains("Dry run: Modify existing file old.cs"));
    }

    #[test]
    fn test_console_denies_on_eof() {
        let op = Operation::new("delete", "a.txt");
        let request = ConfirmationRequest {
            operation: &op,
            risk: RiskLevel::Dangerous,
            preview: None,
        };
        let mut console = ConsoleConfirmation::new("".as_bytes(), Vec::new());
        assert_eq!(console.request(&request), Verdict::Deny);
    }

    #[test]
    fn test_scripted_records_and_exhausts() {
        let op = Operation::new("delete", "a.txt");
        let request = ConfirmationRequest {
            operation: &op,
            risk: RiskLevel::Dangerous,
            preview: Some("Delete file a.txt (1 bytes)"),
        };
        let mut scripted = ScriptedConfirmation::new([Verdict::Approve]);
        assert_eq!(scripted.request(&request), Verdict::Approve);
        assert_eq!(scripted.request(&request), Verdict::Deny);
        assert_eq!(scripted.requests().len(), 2);
        assert_eq!(scripted.requests()[0].label, "delete a.txt");
    }
}
