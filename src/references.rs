//! Trailing references block parser.
//!
//! Chat answers may end with a references block of the form
//!
//! ```text
//! References:
//! [REFERENCES: { "files": ["report.pdf", "notes.txt"] }]
//! ```
//!
//! This module splits that block off the answer prose and turns its
//! `files` array into numbered citations.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// `References:` label followed by the marker opener. Group 1 is the opener.
static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)References:\s*(\[REFERENCES:)").expect("label pattern is valid")
});

/// Marker opener plus the whitespace before the JSON payload.
static OPENER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[REFERENCES:\s*").expect("opener pattern is valid"));

/// Errors that can occur when reading a references payload.
#[derive(Error, Debug)]
pub enum ReferencesError {
    #[error("references marker does not contain a JSON object")]
    MissingPayload,

    #[error("Invalid references JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("references payload has no `files` field")]
    MissingFiles,

    #[error("references field `files` must be an array")]
    FilesNotAnArray,
}

/// A message split into its answer prose and its raw references marker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ParsedMessage {
    /// Markdown source of the answer, trimmed
    pub answer: String,
    /// The exact `[REFERENCES: ...]` marker, or an empty string
    pub references_raw: String,
}

impl ParsedMessage {
    /// Returns true if a references marker was found.
    pub fn has_references(&self) -> bool {
        !self.references_raw.is_empty()
    }
}

/// A cited file, numbered by its position in the marker's `files` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// 1-based citation number
    pub number: usize,
    /// The cited value as given in the payload
    pub file: String,
}

/// Splits a trailing references marker off the message text.
///
/// The marker only counts when `References:` (case-insensitive), optional
/// whitespace, and a `[REFERENCES: {...}]` block run to the end of the text.
/// Anything else, including a truncated marker, is left in the answer.
///
/// # Examples
///
/// ```
/// use chat_refs::split_references;
///
/// let parsed = split_references("42.\nReferences: [REFERENCES: {\"files\": [\"a.pdf\"]}]");
/// assert_eq!(parsed.answer, "42.");
/// assert_eq!(parsed.references_raw, "[REFERENCES: {\"files\": [\"a.pdf\"]}]");
/// ```
pub fn split_references(text: &str) -> ParsedMessage {
    // Candidate start positions, found one character apart so that a label
    // hidden inside a previous candidate's opener is still seen.
    let mut candidates: Vec<(usize, usize, usize)> = Vec::new();
    let mut pos = 0;
    while let Some(caps) = LABEL_RE.captures_at(text, pos) {
        let (Some(full), Some(opener)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        candidates.push((full.start(), opener.start(), opener.end()));
        pos = full.start() + text[full.start()..].chars().next().map_or(1, char::len_utf8);
    }

    for (label_start, marker_start, opener_end) in candidates.into_iter().rev() {
        if let Some(marker_end) = anchored_marker_end(text, opener_end) {
            debug!(label_start, marker_end, "found trailing references marker");
            return ParsedMessage {
                answer: text[..label_start].trim().to_string(),
                references_raw: text[marker_start..marker_end].trim().to_string(),
            };
        }
    }

    ParsedMessage {
        answer: text.trim().to_string(),
        references_raw: String::new(),
    }
}

/// Checks that a JSON object and a closing `]` follow the opener and that
/// only whitespace remains after it. Returns the byte offset past the `]`.
fn anchored_marker_end(text: &str, opener_end: usize) -> Option<usize> {
    let rest = &text[opener_end..];
    let object_start = opener_end + (rest.len() - rest.trim_start().len());
    let object_end = scan_json_object(text, object_start)?;

    let tail = text[object_end..].strip_prefix(']')?;
    if tail.trim().is_empty() {
        Some(object_end + 1)
    } else {
        None
    }
}

/// Scans a balanced JSON object starting at `start`.
///
/// String literals (with escapes) are skipped so brackets inside them do
/// not count. Returns the byte offset just past the closing `}`, or `None`
/// when the object is unbalanced or never closes.
fn scan_json_object(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut closers: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => closers.push(b'}'),
            b'[' => closers.push(b']'),
            b'}' | b']' => {
                if closers.pop() != Some(byte) {
                    return None;
                }
                if closers.is_empty() {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extracts numbered citations from a raw references marker.
///
/// Never fails: a malformed payload is logged and yields no citations, so
/// the message still renders, just without a references section.
///
/// # Examples
///
/// ```
/// use chat_refs::extract_citations;
///
/// let citations = extract_citations(r#"[REFERENCES: {"files": ["a.pdf", "b.pdf"]}]"#);
/// assert_eq!(citations.len(), 2);
/// assert_eq!(citations[1].number, 2);
/// assert_eq!(citations[1].file, "b.pdf");
///
/// assert!(extract_citations("[REFERENCES: {not valid json}]").is_empty());
/// ```
pub fn extract_citations(references_raw: &str) -> Vec<Citation> {
    match try_extract_citations(references_raw) {
        Ok(citations) => citations,
        Err(err) => {
            warn!(error = %err, "failed to parse references block");
            Vec::new()
        }
    }
}

/// Like [`extract_citations`], but reports why a payload was rejected.
///
/// An empty marker is not an error and gives an empty list.
pub fn try_extract_citations(references_raw: &str) -> Result<Vec<Citation>, ReferencesError> {
    if references_raw.is_empty() {
        return Ok(Vec::new());
    }

    let payload = marker_payload(references_raw).ok_or(ReferencesError::MissingPayload)?;
    let value: Value = serde_json::from_str(payload)?;

    let files = match value.get("files") {
        None | Some(Value::Null) => return Err(ReferencesError::MissingFiles),
        Some(Value::Array(files)) => files,
        Some(_) => return Err(ReferencesError::FilesNotAnArray),
    };

    Ok(files
        .iter()
        .enumerate()
        .map(|(index, file)| Citation {
            number: index + 1,
            file: file_text(file),
        })
        .collect())
}

/// Returns the JSON object between the marker opener and the final `}]`.
fn marker_payload(references_raw: &str) -> Option<&str> {
    let opener = OPENER_RE.find(references_raw)?;
    let body = &references_raw[opener.end()..];
    let close = body.rfind("}]")?;
    let payload = &body[..=close];
    payload.starts_with('{').then_some(payload)
}

/// Strings are cited verbatim, `null` as empty text; anything else keeps
/// its JSON text.
fn file_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
