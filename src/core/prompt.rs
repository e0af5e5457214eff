//! Prompt construction: file context, operation instructions, `@path` mentions.

use crate::core::store::Store;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\S+)").unwrap());

/// Workspace path -> text shown to the generator.
pub type FileContext = BTreeMap<String, String>;

/// Read each path (file content, or a directory listing) into a context map.
/// Per-path failures are recorded in-band; paths that don't exist are skipped.
pub fn build_file_context(store: &Store, paths: &[String]) -> FileContext {
    let mut context = FileContext::new();
    for path in paths {
        match context_entry(store, path) {
            Ok(Some(text)) => {
                context.insert(path.clone(), text);
            }
            Ok(None) => tracing::debug!(path = %path, "context path not found"),
            Err(e) => {
                context.insert(path.clone(), format!("Error reading file: {}", e));
            }
        }
    }
    context
}

fn context_entry(store: &Store, path: &str) -> Result<Option<String>, crate::core::error::WardenError> {
    if store.file_exists(path)? {
        return store.read_file(path).map(Some);
    }
    if store.dir_exists(path)? {
        let files = store.list(path)?;
        return Ok(Some(format!("Directory contents: {}", files.join(", "))));
    }
    Ok(None)
}

/// Instruction preamble + file context + the user's request.
pub fn build_prompt(user_prompt: &str, context: &FileContext) -> String {
    let mut prompt = String::from(
        "You are a helpful coding assistant with file system access. You can perform the following operations:\n\
         - READ_FILE(path): read a file\n\
         - WRITE_FILE(path, content): write or overwrite a file\n\
         - CREATE_FILE(path, content): create a new file\n\
         - DELETE_FILE(path): delete a file\n\
         - LIST_FILES(path): list a directory\n\
         - EXECUTE(command, args): run a command in the workspace\n\
         \n\
         Format file operations like this (IMPORTANT: escape newlines as \\n in JSON content):\n\
         ```fileop\n\
         {\"operation\": \"WRITE_FILE\", \"path\": \"example.cs\", \"content\": \"// code here\\nusing System;\\n\\nclass Program { }\"}\n\
         ```\n\
         For commands, put the program in path and its arguments in a list:\n\
         ```fileop\n\
         {\"operation\": \"EXECUTE\", \"path\": \"dotnet\", \"arguments\": [\"build\"]}\n\
         ```\n\
         \n\
         CRITICAL: In JSON content field, always escape:\n\
         - Newlines as \\n\n\
         - Quotes as \\\"\n\
         - Backslashes as \\\\\n\
         \n",
    );

    if !context.is_empty() {
        prompt.push_str("Current file context:\n");
        for (path, content) in context {
            prompt.push_str(&format!("=== {} ===\n{}\n\n", path, content));
        }
    }

    prompt.push_str("User request:\n");
    prompt.push_str(user_prompt);
    prompt.push('\n');
    prompt
}

/// `@path` tokens in user input, in order of appearance, without duplicates.
pub fn extract_file_mentions(input: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    for caps in MENTION.captures_iter(input) {
        let Some(m) = caps.get(1) else { continue };
        let path = m.as_str().trim_end_matches(['.', ',', ';', ':', '?', '!', ')']);
        if !path.is_empty() && !mentions.iter().any(|p| p == path) {
            mentions.push(path.to_string());
        }
    }
    mentions
}
