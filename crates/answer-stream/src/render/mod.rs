//! Citation-aware answer rendering.
//!
//! Rendering is two-pass: markdown is converted and sanitized first, then
//! citation markers in the sanitized text are turned into links. Linking
//! never sees unsanitized input and never rewrites code or existing links.

mod linkify;
mod markdown;
mod sanitize;

use std::sync::Arc;

pub use linkify::link_citations;
pub use markdown::{MarkdownToHtml, PulldownMarkdownRenderer};
pub use sanitize::{AmmoniaSanitizer, HtmlSanitizer};

use crate::citation::extract_sources;
use crate::model::Source;

/// Converts answer text into sanitized, citation-linked HTML.
#[derive(Clone)]
pub struct CitationRenderer {
    markdown: Arc<dyn MarkdownToHtml>,
    sanitizer: Arc<dyn HtmlSanitizer>,
}

impl Default for CitationRenderer {
    fn default() -> Self {
        Self::new(
            Arc::new(PulldownMarkdownRenderer),
            Arc::new(AmmoniaSanitizer::default()),
        )
    }
}

impl CitationRenderer {
    /// Creates a renderer from explicit markdown and sanitizer collaborators.
    pub fn new(markdown: Arc<dyn MarkdownToHtml>, sanitizer: Arc<dyn HtmlSanitizer>) -> Self {
        Self {
            markdown,
            sanitizer,
        }
    }

    /// Markdown conversion followed by sanitization, without citation links.
    pub fn sanitized(&self, text: &str) -> String {
        self.sanitizer.sanitize(&self.markdown.render(text))
    }

    /// Renders `text` and links its `[n]` markers against `sources`.
    pub fn render(&self, text: &str, sources: &[Source]) -> String {
        let safe = self.sanitized(text);
        if sources.is_empty() {
            return safe;
        }
        link_citations(&safe, sources)
    }

    /// Renders a persisted answer whose references are embedded in the
    /// text itself.
    pub fn render_history(&self, text: &str) -> String {
        let sources = extract_sources(text);
        self.render(text, &sources)
    }
}

/// Status notes painted after the answer body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    /// In-band `error` event from the server.
    Error(String),
    /// Transport failure that ended the request.
    Failure(String),
    /// The user stopped the request.
    Stopped,
}

impl Annotation {
    pub fn to_html(&self) -> String {
        match self {
            Self::Error(message) => format!(
                r#"<div class="answer-error">Error: {}</div>"#,
                ammonia::clean_text(message)
            ),
            Self::Failure(message) => format!(
                r#"<div class="answer-error">Network error: {}</div>"#,
                ammonia::clean_text(message)
            ),
            Self::Stopped => r#"<div class="answer-stopped">[stopped by user]</div>"#.to_string(),
        }
    }
}
