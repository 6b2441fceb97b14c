//! chat-refs: render chat messages and their trailing references block.
//!
//! This library provides functionality to:
//! - Split a trailing `References: [REFERENCES: {...}]` block off a message
//! - Extract numbered citations from the block's `files` array
//! - Render the answer as Markdown with highlighted code blocks
//! - Generate output with the references list appended

pub mod message;
pub mod output;
pub mod references;
pub mod render;
pub mod view;

pub use message::{load_messages, parse_messages, Message};
pub use output::{generate_output, generate_plain_output, source_citations};
pub use references::{
    extract_citations, split_references, try_extract_citations, Citation, ParsedMessage,
};
pub use render::{render_markdown, theme_names, OutputFormat, RenderOptions};
pub use view::{render_message, MessageView};
