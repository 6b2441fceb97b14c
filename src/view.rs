//! Memoized message view.
//!
//! Holds the split and the citations of the last text it saw, so pushing
//! the same text again (a re-render) does no parsing work.

use tracing::debug;

use crate::output::{generate_output, generate_plain_output};
use crate::references::{extract_citations, split_references, Citation, ParsedMessage};
use crate::render::{render_markdown, OutputFormat, RenderError, RenderOptions};

/// The parsed state of one message, recomputed only when its text changes.
#[derive(Debug, Default)]
pub struct MessageView {
    text: Option<String>,
    parsed: ParsedMessage,
    citations: Vec<Citation>,
}

impl MessageView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a view for `text`.
    pub fn from_text(text: &str) -> Self {
        let mut view = Self::new();
        view.update(text);
        view
    }

    /// Updates the view to `text`. Returns false if the text was unchanged
    /// and nothing was recomputed.
    pub fn update(&mut self, text: &str) -> bool {
        if self.text.as_deref() == Some(text) {
            debug!("message text unchanged, reusing parsed view");
            return false;
        }

        let parsed = split_references(text);
        if parsed.references_raw != self.parsed.references_raw || self.text.is_none() {
            self.citations = extract_citations(&parsed.references_raw);
        }
        self.parsed = parsed;
        self.text = Some(text.to_string());
        true
    }

    pub fn parsed(&self) -> &ParsedMessage {
        &self.parsed
    }

    pub fn answer(&self) -> &str {
        &self.parsed.answer
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    /// Renders the current message in the configured format.
    pub fn render(&self, options: &RenderOptions) -> Result<String, RenderError> {
        match options.format {
            OutputFormat::Html => {
                let body = render_markdown(self.answer(), options)?;
                Ok(generate_output(&body, &self.citations, options))
            }
            OutputFormat::Plain => Ok(generate_plain_output(
                self.answer(),
                &self.citations,
                options,
            )),
        }
    }
}

/// Splits, extracts and renders a message in one call.
///
/// # Examples
///
/// ```
/// use chat_refs::{render_message, OutputFormat, RenderOptions};
///
/// let options = RenderOptions { format: OutputFormat::Plain, ..RenderOptions::default() };
/// let text = "The answer is 42.\nReferences: [REFERENCES: {\"files\": [\"report.pdf\"]}]";
/// let out = render_message(text, &options).unwrap();
/// assert!(out.ends_with("[1] report.pdf"));
/// ```
pub fn render_message(text: &str, options: &RenderOptions) -> Result<String, RenderError> {
    MessageView::from_text(text).render(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_REFS: &str =
        "The answer is 42.\nReferences: [REFERENCES: {\"files\": [\"report.pdf\"]}]";

    #[test]
    fn test_view_from_text() {
        let view = MessageView::from_text(WITH_REFS);
        assert_eq!(view.answer(), "The answer is 42.");
        assert_eq!(view.citations().len(), 1);
        assert_eq!(view.citations()[0].file, "report.pdf");
    }

    #[test]
    fn test_view_update_same_text_is_noop() {
        // Given: a view built from a message
        let mut view = MessageView::from_text(WITH_REFS);

        // When: the same text is pushed again
        let recomputed = view.update(WITH_REFS);

        // Then: nothing is recomputed and the state is unchanged
        assert!(!recomputed);
        assert_eq!(view.citations().len(), 1);
    }

    #[test]
    fn test_view_update_new_text() {
        let mut view = MessageView::from_text(WITH_REFS);
        assert!(view.update("Just an answer, no refs."));
        assert_eq!(view.answer(), "Just an answer, no refs.");
        assert!(view.citations().is_empty());
        assert!(!view.parsed().has_references());
    }

    #[test]
    fn test_view_update_prose_only_change_keeps_citations() {
        let mut view = MessageView::from_text(WITH_REFS);
        let edited = WITH_REFS.replace("42", "43");
        assert!(view.update(&edited));
        assert_eq!(view.answer(), "The answer is 43.");
        assert_eq!(view.citations()[0].file, "report.pdf");
    }

    #[test]
    fn test_view_empty_text() {
        let mut view = MessageView::new();
        assert!(view.update(""));
        assert!(!view.update(""));
        assert_eq!(view.answer(), "");
        assert!(view.citations().is_empty());
    }

    #[test]
    fn test_render_message_html() {
        // Given: a message with a trailing references block
        // When: we render it as HTML
        let html = render_message(WITH_REFS, &RenderOptions::default()).unwrap();

        // Then: the prose paragraph and the citation item are both present
        assert!(html.starts_with("<p>The answer is 42.</p>"));
        assert!(html.contains("<li>[1] report.pdf</li>"));
        assert!(!html.contains("REFERENCES"));
    }

    #[test]
    fn test_render_message_without_refs() {
        let html = render_message("Just an answer, no refs.", &RenderOptions::default()).unwrap();
        assert_eq!(html, "<p>Just an answer, no refs.</p>");
    }

    #[test]
    fn test_render_message_escapes_raw_html_in_prose() {
        // Given: prose with live tags ahead of a references block
        let text = "Hi <script>alert(1)</script>\n\n<img src=x onerror=alert(2)>\nReferences: [REFERENCES: {\"files\": [\"a.pdf\"]}]";

        // When: we render it as HTML
        let html = render_message(text, &RenderOptions::default()).unwrap();

        // Then: the tags are escaped while the references section stays markup
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&lt;img src=x onerror=alert(2)&gt;"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img"));
        assert!(html.contains("<li>[1] a.pdf</li>"));
    }

    #[test]
    fn test_render_message_malformed_payload_has_no_section() {
        // Given: a marker whose JSON is invalid
        let text = "Answer.\nReferences: [REFERENCES: {not valid json}]";

        // When: we render it
        let html = render_message(text, &RenderOptions::default()).unwrap();

        // Then: the answer renders and no references section appears
        assert_eq!(html, "<p>Answer.</p>");
    }
}
