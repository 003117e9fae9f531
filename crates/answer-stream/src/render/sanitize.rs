//! HTML sanitization.

/// Sanitizer abstraction: turn arbitrary HTML into markup safe to insert
/// into a document.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Default sanitizer backed by ammonia.
///
/// Uses ammonia's default allow-list (no scripts, no event handlers, no
/// `javascript:` URLs, `rel="noopener noreferrer"` on links) and additionally
/// keeps `target` on links.
pub struct AmmoniaSanitizer {
    builder: ammonia::Builder<'static>,
}

impl Default for AmmoniaSanitizer {
    fn default() -> Self {
        let mut builder = ammonia::Builder::default();
        builder.add_tag_attributes("a", &["target"]);
        Self { builder }
    }
}

impl HtmlSanitizer for AmmoniaSanitizer {
    fn sanitize(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}
