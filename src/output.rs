//! Output generation for rendered messages.
//!
//! This module appends the references section to a rendered answer and
//! provides the citation payload shape used by chat backends.

use serde::Serialize;

use crate::references::Citation;
use crate::render::RenderOptions;

/// A citation in the shape chat backends stream after an answer:
/// `{"id": 1, "source": "report.pdf", "page": null, "content": ""}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCitation {
    pub id: usize,
    pub source: String,
    pub page: Option<u32>,
    pub content: String,
}

/// Wrapper serialized as `{"citations": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationsPayload {
    pub citations: Vec<SourceCitation>,
}

/// Converts numbered citations into the backend citation shape.
pub fn source_citations(citations: &[Citation]) -> CitationsPayload {
    CitationsPayload {
        citations: citations
            .iter()
            .map(|c| SourceCitation {
                id: c.number,
                source: c.file.clone(),
                page: None,
                content: String::new(),
            })
            .collect(),
    }
}

/// Generates the HTML view: the rendered answer plus, when there are
/// citations, a divider, a heading and one `[n] file` item per citation.
///
/// # Arguments
///
/// * `body` - The answer already rendered to HTML
/// * `citations` - The citations extracted from the references block
/// * `options` - Whether to show references and which header to use
pub fn generate_output(body: &str, citations: &[Citation], options: &RenderOptions) -> String {
    let mut output = body.trim_end().to_string();

    if options.show_references && !citations.is_empty() {
        output.push_str("\n<hr class=\"references-divider\" />\n");
        output.push_str(&format!(
            "<p class=\"references-header\"><strong>{}</strong></p>\n",
            html_escape::encode_text(&options.references_header)
        ));
        output.push_str("<ul class=\"references\">\n");
        for citation in citations {
            output.push_str(&format!(
                "<li>[{}] {}</li>\n",
                citation.number,
                html_escape::encode_text(&citation.file)
            ));
        }
        output.push_str("</ul>");
    }

    output
}

/// Generates the plain-text view: the answer source, then a divider, the
/// header and one `[n] file` line per citation.
pub fn generate_plain_output(
    answer: &str,
    citations: &[Citation],
    options: &RenderOptions,
) -> String {
    let mut output = answer.trim_end().to_string();

    if options.show_references && !citations.is_empty() {
        if !output.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str("----\n");
        output.push_str(&options.references_header);
        for citation in citations {
            output.push_str(&format!("\n[{}] {}", citation.number, citation.file));
        }
    }

    output
}
