//! Text-generation port and the chat round trip built on it.

use crate::core::confirm::ConfirmationChannel;
use crate::core::error::WardenError;
use crate::core::orchestrator::{Orchestrator, ProcessedResponse};
use crate::core::prompt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Opaque prompt-in, completion-out backend.
pub trait Generator {
    fn generate(&mut self, prompt: &str) -> Result<String, WardenError>;
}

/// Runs an external program with the prompt on stdin and takes its stdout
/// as the completion.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Generator for CommandGenerator {
    fn generate(&mut self, prompt: &str) -> Result<String, WardenError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(WardenError::IoError)?;

        // Fed from its own thread so a child that writes before it finishes
        // reading cannot fill the stdout pipe and stall both sides.
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.to_string();
            thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });

        let output = child.wait_with_output().map_err(WardenError::IoError)?;
        let written = match writer.map(|handle| handle.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(io::Error::other("stdin writer panicked")),
            None => Ok(()),
        };
        if !output.status.success() {
            return Err(WardenError::ValidationError(format!(
                "generator '{}' failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        match written {
            // The generator answered without consuming the whole prompt.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!(program = %self.program, "generator closed stdin early");
            }
            Err(e) => return Err(WardenError::IoError(e)),
            Ok(()) => {}
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Generator + orchestrator: context, prompt, generate, mediate.
pub struct Agent<G> {
    generator: G,
    orchestrator: Orchestrator,
}

impl<G: Generator> Agent<G> {
    pub fn new(generator: G, orchestrator: Orchestrator) -> Self {
        Self {
            generator,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn chat(
        &mut self,
        user_prompt: &str,
        file_paths: &[String],
        confirm: &mut dyn ConfirmationChannel,
    ) -> Result<ProcessedResponse, WardenError> {
        let context = prompt::build_file_context(self.orchestrator.store(), file_paths);
        let full_prompt = prompt::build_prompt(user_prompt, &context);
        tracing::debug!(context_files = context.len(), prompt_len = full_prompt.len(), "sending prompt");
        let response = self.generator.generate(&full_prompt)?;
        Ok(self.orchestrator.process_response(&response, confirm))
    }
}
