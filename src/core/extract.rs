//! Operation block extraction with tolerant decoding.
//!
//! Generated text embeds requests as fenced blocks:
//!
//! ````text
//! ```fileop
//! {"operation": "WRITE_FILE", "path": "hello.cs", "content": "class P { }"}
//! ```
//! ````
//!
//! Each block body is decoded through three recovery tiers, stopping at the
//! first that succeeds:
//!
//! 1. **Strict**: the body as-is must be a JSON object with the operation schema.
//! 2. **Content repair**: re-escape the `content` string span only (raw
//!    newlines, quotes, stray backslashes) and decode again.
//! 3. **Field reconstruction**: pull `operation`, `path`, `content` and
//!    `arguments` out independently and synthesize a record from what was found.
//!
//! Every block yields exactly one `Ok(Decoded)` or `Err(ExtractionFailure)`.

use crate::core::operation::Operation;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;
use thiserror::Error;

static BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```fileop[ \t]*\r?\n(.*?)\r?\n[ \t]*```").unwrap()
});

/// `content` string span terminated by the next known field or the closing brace.
/// Group 1 is the raw value, group 2 the terminator that must be spliced back.
static CONTENT_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)(?i:"content")\s*:\s*"(.*?)"(\s*(?:,\s*(?i:"(?:operation|path|content|arguments)")\s*:|\}\s*\z))"#,
    )
    .unwrap()
});

static FIELD_OPERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i:"operation")\s*:\s*"([^"]+)""#).unwrap());

static FIELD_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i:"path")\s*:\s*"([^"]+)""#).unwrap());

static FIELD_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(?i:"content")\s*:\s*"(.*?)"\s*(?:,\s*"[A-Za-z_]+"\s*:|,?\s*\}\s*\z|\z)"#)
        .unwrap()
});

static FIELD_ARGUMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)(?i:"arguments")\s*:\s*(\[[^\]]*\])"#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    Strict,
    ContentRepair,
    FieldReconstruction,
}

impl fmt::Display for RecoveryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::ContentRepair => write!(f, "content-repair"),
            Self::FieldReconstruction => write!(f, "field-reconstruction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierError {
    #[error("invalid record: {0}")]
    Decode(String),
    #[error("no content field to repair")]
    NoContentField,
    #[error("could not extract required operation and path fields")]
    MissingRequiredFields,
    #[error("malformed arguments list: {0}")]
    MalformedArguments(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub operation: Operation,
    pub tier: RecoveryTier,
}

/// Terminal failure for one block, with the error each tier produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub attempts: Vec<(RecoveryTier, TierError)>,
}

impl ExtractionFailure {
    pub fn reason(&self) -> String {
        self.attempts
            .last()
            .map(|(_, e)| e.to_string())
            .unwrap_or_else(|| "empty operation block".to_string())
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

/// One fenced block found in a response.
#[derive(Debug, Clone)]
pub struct OperationBlock {
    /// Byte range of the whole fenced block (markers included).
    pub span: Range<usize>,
    pub body: String,
    pub decoded: Result<Decoded, ExtractionFailure>,
}

/// Find every operation block in `text`, in left-to-right order.
pub fn extract_blocks(text: &str) -> Vec<OperationBlock> {
    BLOCK_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let decoded = decode_body(body);
            match &decoded {
                Ok(d) => tracing::debug!(tier = %d.tier, op = %d.operation.label(), "decoded operation block"),
                Err(e) => tracing::debug!(reason = %e, "operation block undecodable"),
            }
            Some(OperationBlock {
                span: whole.range(),
                body: body.to_string(),
                decoded,
            })
        })
        .collect()
}

/// Run the recovery tiers over one block body.
pub fn decode_body(body: &str) -> Result<Decoded, ExtractionFailure> {
    let mut attempts = Vec::new();

    match strict_decode(body) {
        Ok(operation) => {
            return Ok(Decoded {
                operation,
                tier: RecoveryTier::Strict,
            });
        }
        Err(e) => attempts.push((RecoveryTier::Strict, e)),
    }

    match repair_content(body).and_then(|repaired| strict_decode(&repaired)) {
        Ok(operation) => {
            return Ok(Decoded {
                operation,
                tier: RecoveryTier::ContentRepair,
            });
        }
        Err(e) => attempts.push((RecoveryTier::ContentRepair, e)),
    }

    match reconstruct(body) {
        Ok(operation) => Ok(Decoded {
            operation,
            tier: RecoveryTier::FieldReconstruction,
        }),
        Err(e) => {
            attempts.push((RecoveryTier::FieldReconstruction, e));
            Err(ExtractionFailure { attempts })
        }
    }
}

/// Tier 1: the body must be a JSON object carrying the operation schema.
pub fn strict_decode(body: &str) -> Result<Operation, TierError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| TierError::Decode(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| TierError::Decode("record is not an object".to_string()))?;
    Operation::from_json_object(object).map_err(|e| TierError::Decode(e.to_string()))
}

/// Tier 2: re-escape the `content` string span and splice it back.
pub fn repair_content(body: &str) -> Result<String, TierError> {
    let caps = CONTENT_SPAN
        .captures(body)
        .ok_or(TierError::NoContentField)?;
    let (Some(whole), Some(raw), Some(terminator)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return Err(TierError::NoContentField);
    };
    Ok(format!(
        "{}\"content\": \"{}\"{}{}",
        &body[..whole.start()],
        reescape_json_string(raw.as_str()),
        terminator.as_str(),
        &body[whole.end()..]
    ))
}

/// Tier 3: extract each known field on its own and synthesize a record.
pub fn reconstruct(body: &str) -> Result<Operation, TierError> {
    let name = FIELD_OPERATION.captures(body).and_then(|c| c.get(1));
    let path = FIELD_PATH.captures(body).and_then(|c| c.get(1));
    let (Some(name), Some(path)) = (name, path) else {
        return Err(TierError::MissingRequiredFields);
    };

    let mut record = Map::new();
    record.insert(
        "operation".to_string(),
        Value::String(decode_loose(name.as_str())),
    );
    record.insert("path".to_string(), Value::String(decode_loose(path.as_str())));

    if let Some(raw) = FIELD_CONTENT.captures(body).and_then(|c| c.get(1)) {
        let quoted = format!("\"{}\"", reescape_json_string(raw.as_str()));
        let content: String =
            serde_json::from_str(&quoted).map_err(|e| TierError::Decode(e.to_string()))?;
        record.insert("content".to_string(), Value::String(content));
    }

    if let Some(raw) = FIELD_ARGUMENTS.captures(body).and_then(|c| c.get(1)) {
        let arguments: Value = serde_json::from_str(raw.as_str())
            .map_err(|e| TierError::MalformedArguments(e.to_string()))?;
        record.insert("arguments".to_string(), arguments);
    }

    Operation::from_json_object(&record).map_err(|e| TierError::Decode(e.to_string()))
}

/// Escape a raw string value so it can sit between JSON quotes.
///
/// Every backslash is escaped, so the decoded value is byte-for-byte the
/// raw text. A generator that emits verbatim source puts literal `\t` or
/// `\n` sequences in it, and those must stay literal.
pub fn reescape_json_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Decode a captured string value, falling back to the raw text when it is
/// not a valid JSON string body (e.g. `C:\temp`).
fn decode_loose(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// Remove every block's span from `text` exactly once.
pub fn strip_blocks(text: &str, blocks: &[OperationBlock]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for block in blocks {
        if block.span.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..block.span.start]);
        cursor = block.span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
