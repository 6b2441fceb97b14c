//! Chat message loading.
//!
//! Handles loading messages from JSON files, supporting a single message
//! object, a JSON array of messages, and JSONL (one message per line).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading messages.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid JSONL at line {line}: {message}")]
    JsonlError { line: usize, message: String },
}

/// A single chat message. Only `text` is read; other fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    /// Creates a message with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// The message text, with a missing or null `text` read as empty.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Loads messages from a JSON or JSONL file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains invalid JSON.
pub fn load_messages(path: &Path) -> Result<Vec<Message>, MessageError> {
    let content = fs::read_to_string(path)?;
    parse_messages(&content)
}

/// Parses message content in any of the supported layouts.
///
/// - JSON object: `{"text": "..."}`
/// - JSON array: `[{"text": "..."}, {"text": "..."}]`
/// - JSONL: `{"text": "..."}\n{"text": "..."}`
pub fn parse_messages(content: &str) -> Result<Vec<Message>, MessageError> {
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    // A single (possibly pretty-printed) object
    if let Ok(message) = serde_json::from_str::<Message>(trimmed) {
        return Ok(vec![message]);
    }

    let mut messages = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Message>(line) {
            Ok(message) => messages.push(message),
            Err(e) => {
                return Err(MessageError::JsonlError {
                    line: line_num + 1,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(messages)
}
