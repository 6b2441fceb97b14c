//! Markdown rendering for answer prose.
//!
//! Renders GFM-flavoured Markdown to HTML with pulldown-cmark. Fenced code
//! blocks tagged with a language syntect knows are highlighted; any other
//! code block is left as plain `<pre><code>`. Raw HTML in the source is
//! escaped and shown as text.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{start_highlighted_html_snippet, styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;
use tracing::warn;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Theme used when none is configured.
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

/// Errors that can occur during rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown highlighting theme '{0}'")]
    UnknownTheme(String),
}

/// Output layout for a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// HTML with highlighted code blocks
    #[default]
    Html,
    /// Markdown source followed by a plain references list
    Plain,
}

/// Settings for rendering a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: OutputFormat,
    /// syntect theme name, see [`theme_names`]
    pub theme: String,
    /// Prefix highlighted code lines with their line number
    pub line_numbers: bool,
    /// Append the references section when citations exist
    pub show_references: bool,
    pub references_header: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            theme: DEFAULT_THEME.to_string(),
            line_numbers: true,
            show_references: true,
            references_header: "References".to_string(),
        }
    }
}

/// Returns the names of the available highlighting themes.
pub fn theme_names() -> Vec<&'static str> {
    THEME_SET.themes.keys().map(String::as_str).collect()
}

/// Looks up a highlighting theme by name.
pub fn find_theme(name: &str) -> Result<&'static Theme, RenderError> {
    THEME_SET
        .themes
        .get(name)
        .ok_or_else(|| RenderError::UnknownTheme(name.to_string()))
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

/// A fenced block being collected for highlighting.
struct PendingCode<'a> {
    syntax: &'static SyntaxReference,
    info: CowStr<'a>,
    source: String,
}

/// Renders Markdown to HTML.
///
/// # Errors
///
/// Returns an error if the configured theme does not exist.
///
/// # Examples
///
/// ```
/// use chat_refs::{render_markdown, RenderOptions};
///
/// let html = render_markdown("~~old~~ **new**", &RenderOptions::default()).unwrap();
/// assert!(html.contains("<del>old</del>"));
/// assert!(html.contains("<strong>new</strong>"));
/// ```
pub fn render_markdown(markdown: &str, options: &RenderOptions) -> Result<String, RenderError> {
    let theme = find_theme(&options.theme)?;

    let mut events: Vec<Event> = Vec::new();
    let mut pending: Option<PendingCode> = None;

    for event in Parser::new_ext(markdown, markdown_options()) {
        if let Some(code) = pending.as_mut() {
            match event {
                Event::Text(text) => code.source.push_str(&text),
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(code) = pending.take() {
                        push_code_block(&mut events, code, theme, options.line_numbers);
                    }
                }
                _ => {}
            }
            continue;
        }

        if let Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) = &event {
            if let Some(syntax) = fence_language(info).and_then(find_syntax) {
                pending = Some(PendingCode {
                    syntax,
                    info: info.clone(),
                    source: String::new(),
                });
                continue;
            }
        }

        events.push(match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });
    }

    let mut output = String::new();
    html::push_html(&mut output, events.into_iter());
    Ok(output)
}

fn push_code_block<'a>(
    events: &mut Vec<Event<'a>>,
    code: PendingCode<'a>,
    theme: &Theme,
    line_numbers: bool,
) {
    match highlight_code(&code.source, code.syntax, theme, line_numbers) {
        Ok(highlighted) => events.push(Event::Html(highlighted.into())),
        Err(err) => {
            warn!(error = %err, language = %code.syntax.name, "highlighting failed, rendering plain code");
            events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(code.info))));
            events.push(Event::Text(code.source.into()));
            events.push(Event::End(TagEnd::CodeBlock));
        }
    }
}

/// First word of a fence info string, e.g. `rust` for ```` ```rust ignore ````.
fn fence_language(info: &str) -> Option<&str> {
    let word = info.trim_start();
    let end = word
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(word.len());
    let lang = &word[..end];
    (!lang.is_empty()).then_some(lang)
}

fn find_syntax(lang: &str) -> Option<&'static SyntaxReference> {
    SYNTAX_SET
        .find_syntax_by_token(lang)
        .or_else(|| SYNTAX_SET.find_syntax_by_name(lang))
        .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang))
}

fn highlight_code(
    source: &str,
    syntax: &SyntaxReference,
    theme: &Theme,
    line_numbers: bool,
) -> Result<String, syntect::Error> {
    let mut highlighter = HighlightLines::new(syntax, theme);
    let (mut output, _background) = start_highlighted_html_snippet(theme);

    let mut source = source.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }
    let width = source.lines().count().to_string().len();

    for (index, line) in LinesWithEndings::from(&source).enumerate() {
        if line_numbers {
            output.push_str(&format!(
                "<span class=\"line-number\">{:>width$} </span>",
                index + 1,
                width = width
            ));
        }
        let regions = highlighter.highlight_line(line, &SYNTAX_SET)?;
        output.push_str(&styled_line_to_highlighted_html(&regions, IncludeBackground::No)?);
    }

    output.push_str("</pre>\n");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(markdown: &str) -> String {
        render_markdown(markdown, &RenderOptions::default()).unwrap()
    }

    #[test]
    fn test_render_paragraph() {
        assert_eq!(render("The answer is 42."), "<p>The answer is 42.</p>\n");
    }

    #[test]
    fn test_render_gfm_table() {
        // Given: a GFM table
        let markdown = "| a | b |\n|---|---|\n| 1 | 2 |";

        // When: we render it
        let html = render(markdown);

        // Then: an HTML table is produced
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_render_task_list_and_strikethrough() {
        let html = render("- [x] done\n- [ ] ~~todo~~");
        assert!(html.contains("checkbox"));
        assert!(html.contains("<del>todo</del>"));
    }

    #[test]
    fn test_render_highlights_known_language() {
        // Given: a fenced block tagged with a known language
        let markdown = "```rust\nfn main() {}\n```";

        // When: we render it
        let html = render(markdown);

        // Then: syntect's styled snippet replaces the plain code element
        assert!(html.contains("<pre style=\"background-color:"));
        assert!(html.contains("<span style=\""));
        assert!(!html.contains("<code"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_render_unknown_language_is_plain() {
        let html = render("```notalanguage\nsome code\n```");
        assert!(html.contains("<pre><code class=\"language-notalanguage\">some code\n</code></pre>"));
    }

    #[test]
    fn test_render_untagged_fence_is_plain() {
        let html = render("```\nplain <b>\n```");
        assert!(html.contains("<pre><code>plain &lt;b&gt;\n</code></pre>"));
    }

    #[test]
    fn test_render_inline_code() {
        let html = render("Use `cargo` here.");
        assert!(html.contains("<code>cargo</code>"));
    }

    #[test]
    fn test_render_line_numbers_by_default() {
        let html = render("```python\na = 1\nb = 2\n```");
        assert!(html.contains("<span class=\"line-number\">1 </span>"));
        assert!(html.contains("<span class=\"line-number\">2 </span>"));
        assert!(!html.contains("<span class=\"line-number\">3 </span>"));
    }

    #[test]
    fn test_render_without_line_numbers() {
        let options = RenderOptions {
            line_numbers: false,
            ..RenderOptions::default()
        };
        let html = render_markdown("```python\na = 1\n```", &options).unwrap();
        assert!(!html.contains("line-number"));
    }

    #[test]
    fn test_render_escapes_inline_html() {
        // Given: prose containing an inline script tag
        let markdown = "Hi <script>alert(1)</script>";

        // When: we render it
        let html = render(markdown);

        // Then: the tags are shown as text, not emitted as markup
        assert_eq!(html, "<p>Hi &lt;script&gt;alert(1)&lt;/script&gt;</p>\n");
    }

    #[test]
    fn test_render_escapes_block_html() {
        let html = render("Intro.\n\n<img src=x onerror=alert(2)>");
        assert!(html.contains("&lt;img src=x onerror=alert(2)&gt;"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_render_unknown_theme() {
        let options = RenderOptions {
            theme: "no-such-theme".to_string(),
            ..RenderOptions::default()
        };
        let err = render_markdown("text", &options).unwrap_err();
        assert!(matches!(err, RenderError::UnknownTheme(name) if name == "no-such-theme"));
    }

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("rust"), Some("rust"));
        assert_eq!(fence_language("rust ignore"), Some("rust"));
        assert_eq!(fence_language("c++"), Some("c"));
        assert_eq!(fence_language(""), None);
        assert_eq!(fence_language("{.python}"), None);
    }

    #[test]
    fn test_theme_names_include_default() {
        assert!(theme_names().contains(&DEFAULT_THEME));
    }
}
