//! Shared test helpers for integration tests.

#![allow(dead_code)]

/// Build a `[REFERENCES: {...}]` marker citing the given files.
///
/// The files are encoded with serde_json, so quotes, braces and brackets
/// in names are escaped the way a chat backend would emit them.
pub fn marker(files: &[&str]) -> String {
    let payload = serde_json::json!({ "files": files });
    format!("[REFERENCES: {}]", payload)
}

/// Build a full message: answer, a newline, the label and the marker.
pub fn message_with_refs(answer: &str, files: &[&str]) -> String {
    format!("{}\nReferences: {}", answer, marker(files))
}
