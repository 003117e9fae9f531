//! Rewriting `[n]` citation markers in sanitized HTML.
//!
//! Input is sanitizer output, so every `<` in it opens a tag and text runs
//! contain no raw markup. Text nested in `a`, `code` or `pre` is copied
//! verbatim.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::model::Source;

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([0-9]+)\]").expect("marker pattern is valid"));

const PROTECTED_TAGS: [&str; 3] = ["a", "code", "pre"];
const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Links citation markers in `html` to their sources.
///
/// Ids are matched by exact string equality, so `[01]` does not resolve a
/// source with id `1`. Unresolved markers stay literal text.
pub fn link_citations(html: &str, sources: &[Source]) -> String {
    let table = source_table(sources);
    if table.is_empty() {
        return html.to_string();
    }

    let mut out = String::with_capacity(html.len() + 64);
    let mut protected_depth = 0usize;
    let mut rest = html;
    while !rest.is_empty() {
        match rest.find('<') {
            Some(0) => {
                let end = tag_end(rest);
                let tag = &rest[..end];
                if let Some((name, closing)) = tag_name(tag)
                    && PROTECTED_TAGS.contains(&name.as_str())
                {
                    if closing {
                        protected_depth = protected_depth.saturating_sub(1);
                    } else if !tag.ends_with("/>") {
                        protected_depth += 1;
                    }
                }
                out.push_str(tag);
                rest = &rest[end..];
            }
            Some(idx) => {
                push_text(&mut out, &rest[..idx], protected_depth > 0, &table);
                rest = &rest[idx..];
            }
            None => {
                push_text(&mut out, rest, protected_depth > 0, &table);
                rest = "";
            }
        }
    }
    out
}

/// First source wins when ids repeat; sources with unsafe URLs are left out.
fn source_table(sources: &[Source]) -> HashMap<&str, &str> {
    let mut table = HashMap::with_capacity(sources.len());
    for source in sources {
        if is_safe_href(&source.url) {
            table.entry(source.id.as_str()).or_insert(source.url.as_str());
        }
    }
    table
}

fn push_text(out: &mut String, text: &str, protected: bool, table: &HashMap<&str, &str>) {
    if protected || !text.contains('[') {
        out.push_str(text);
        return;
    }
    let linked = MARKER_RE.replace_all(text, |caps: &Captures<'_>| {
        let id = &caps[1];
        match table.get(id) {
            Some(url) => format!(
                r#"<a href="{}" target="_blank" rel="noopener noreferrer" class="citation-link">[{id}]</a>"#,
                ammonia::clean_text(url)
            ),
            None => caps[0].to_string(),
        }
    });
    out.push_str(&linked);
}

/// Byte offset just past the `>` closing the tag at the start of `s`,
/// skipping `>` inside quoted attribute values.
fn tag_end(s: &str) -> usize {
    let mut quote: Option<u8> = None;
    for (i, b) in s.bytes().enumerate().skip(1) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return i + 1,
            (None, _) => {}
        }
    }
    s.len()
}

fn tag_name(tag: &str) -> Option<(String, bool)> {
    let inner = tag.strip_prefix('<')?;
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if name.is_empty() {
        None
    } else {
        Some((name, closing))
    }
}

fn is_safe_href(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    match url.find(':') {
        Some(colon) if !url[..colon].contains(['/', '?', '#']) => {
            let scheme = url[..colon].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<Source> {
        vec![Source::new("1", "https://a"), Source::new("2", "https://b")]
    }

    #[test]
    fn links_known_ids_and_leaves_unknown() {
        let html = link_citations("<p>See [1] and [3].</p>", &sources());
        assert_eq!(
            html,
            "<p>See <a href=\"https:&#47;&#47;a\" target=\"_blank\" rel=\"noopener noreferrer\" \
             class=\"citation-link\">[1]</a> and [3].</p>"
        );
    }

    #[test]
    fn protected_regions_are_untouched() {
        let input = concat!(
            "<p><code>[1]</code> <a href=\"https://x\" rel=\"noopener noreferrer\">ref [2]</a></p>",
            "<pre><code class=\"language-rust\">let v = a[1];\n</code></pre>",
            "<p>after [2]</p>"
        );
        let html = link_citations(input, &sources());
        assert!(html.starts_with(
            "<p><code>[1]</code> <a href=\"https://x\" rel=\"noopener noreferrer\">ref [2]</a></p>"
        ));
        assert!(html.contains("let v = a[1];"));
        assert!(html.ends_with("class=\"citation-link\">[2]</a></p>"));
    }

    #[test]
    fn leading_zeros_do_not_match() {
        let html = link_citations("<p>[01] [1]</p>", &sources());
        assert!(html.starts_with("<p>[01] <a "));
    }

    #[test]
    fn first_duplicate_id_wins() {
        let html = link_citations(
            "<p>[1]</p>",
            &[Source::new("1", "https://first"), Source::new("1", "https://second")],
        );
        assert!(html.contains("&#47;&#47;first"));
        assert!(!html.contains("second"));
    }

    #[test]
    fn unsafe_urls_are_not_linked_and_hrefs_are_escaped() {
        let html = link_citations(
            "<p>[1] [2]</p>",
            &[
                Source::new("1", "javascript:alert(1)"),
                Source::new("2", "https://a/?q=\"x\"&y=<z>"),
            ],
        );
        assert!(html.starts_with(
            "<p>[1] <a href=\"https:&#47;&#47;a&#47;?q&#61;&quot;x&quot;&amp;y&#61;&lt;z&gt;\" target"
        ));
        assert!(!html.contains("javascript"));
    }

    #[test]
    fn href_cannot_break_out_of_its_attribute() {
        let html = link_citations(
            "<p>[1]</p>",
            &[Source::new("1", "https://a/x' onmouseover='steal()' \"><script>")],
        );
        let href = html
            .split("href=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .expect("href");
        assert!(!href.contains(['\'', ' ', '<', '>']));
        assert!(!html.contains("<script>"));
        assert!(html.ends_with("class=\"citation-link\">[1]</a></p>"));
    }

    #[test]
    fn quoted_gt_in_attributes_does_not_end_tag() {
        let html = link_citations("<a href=\"https://x/>[1]\">[1]</a><p>[2]</p>", &sources());
        assert!(html.starts_with("<a href=\"https://x/>[1]\">[1]</a><p><a href=\"https:&#47;&#47;b\""));
    }

    #[test]
    fn no_sources_returns_input() {
        assert_eq!(link_citations("<p>[1]</p>", &[]), "<p>[1]</p>");
    }

    #[test]
    fn relative_and_mailto_urls_are_safe() {
        assert!(is_safe_href("#"));
        assert!(is_safe_href("/docs/a:b"));
        assert!(is_safe_href("MAILTO:x@example.com"));
        assert!(!is_safe_href("data:text/html,hi"));
        assert!(!is_safe_href(""));
    }
}
