//! Markdown to HTML conversion.

use pulldown_cmark::{Options, Parser, html};

/// Renderer abstraction: convert markdown to (unsanitized) HTML.
pub trait MarkdownToHtml: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// Default implementation using pulldown-cmark.
///
/// Raw HTML in the input is passed through untouched; the sanitizer is
/// responsible for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PulldownMarkdownRenderer;

impl MarkdownToHtml for PulldownMarkdownRenderer {
    fn render(&self, markdown: &str) -> String {
        let options =
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_SMART_PUNCTUATION;
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, options));
        out
    }
}
