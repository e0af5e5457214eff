//! Operation model shared by the extractor, policy engine and executor.
//!
//! An [`Operation`] keeps the name exactly as the generator wrote it (for
//! result lines and audit records); [`OperationKind`] is the normalized,
//! closed category every downstream `match` is exhaustive over.

use crate::core::error::WardenError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Read,
    Write,
    Create,
    Delete,
    List,
    Execute,
}

impl OperationKind {
    /// Strict synonym lookup (case-insensitive). `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "read" | "read_file" => Some(Self::Read),
            "write" | "write_file" => Some(Self::Write),
            "create" | "create_file" => Some(Self::Create),
            "delete" | "delete_file" => Some(Self::Delete),
            "list" | "list_files" => Some(Self::List),
            "execute" | "run_command" => Some(Self::Execute),
            _ => None,
        }
    }

    /// Kind resolution used for dispatch. Unknown names resolve to `Read`.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or(Self::Read)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Execute => "execute",
        }
    }

    /// Kinds that change workspace contents.
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::Write | Self::Create | Self::Delete)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded operation block.
///
/// For `Execute`, `path` holds the command and `arguments` its argv tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operation")]
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<String>>,
}

impl Operation {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            content: None,
            arguments: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = Some(arguments.into_iter().map(Into::into).collect());
        self
    }

    pub fn kind(&self) -> OperationKind {
        OperationKind::from_name(&self.name)
    }

    pub fn arguments(&self) -> &[String] {
        self.arguments.as_deref().unwrap_or(&[])
    }

    pub fn content_len(&self) -> usize {
        self.content.as_deref().map(str::len).unwrap_or(0)
    }

    /// `name path`, the label used in result lines and audit records.
    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.path)
    }

    /// Full command line for `Execute` previews.
    pub fn command_line(&self) -> String {
        let mut line = self.path.clone();
        for arg in self.arguments() {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Build an operation from a decoded JSON object. Keys match
    /// case-insensitively; `operation` and `path` must be strings.
    pub fn from_json_object(object: &Map<String, Value>) -> Result<Self, WardenError> {
        let name = required_string(object, "operation")?;
        let path = required_string(object, "path")?;
        let content = match lookup(object, "content") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(WardenError::ExtractionError(format!(
                    "field 'content' must be a string, got {}",
                    json_type(other)
                )));
            }
        };
        let arguments = match lookup(object, "arguments") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        other => {
                            return Err(WardenError::ExtractionError(format!(
                                "field 'arguments' must contain strings, got {}",
                                json_type(other)
                            )));
                        }
                    }
                }
                Some(out)
            }
            Some(other) => {
                return Err(WardenError::ExtractionError(format!(
                    "field 'arguments' must be an array, got {}",
                    json_type(other)
                )));
            }
        };
        Ok(Self {
            name,
            path,
            content,
            arguments,
        })
    }
}

fn lookup<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn required_string(object: &Map<String, Value>, key: &str) -> Result<String, WardenError> {
    match lookup(object, key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(WardenError::ExtractionError(format!(
            "field '{}' is empty",
            key
        ))),
        Some(other) => Err(WardenError::ExtractionError(format!(
            "field '{}' must be a string, got {}",
            key,
            json_type(other)
        ))),
        None => Err(WardenError::ExtractionError(format!(
            "missing required field '{}'",
            key
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
