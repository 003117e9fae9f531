//! Recovering citation sources from persisted answer text.
//!
//! Saved answers carry their reference list inline as lines of the form
//! `[3] [Title](https://example.com)`. Live streams get sources from the
//! `sources` event instead.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Source;

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([0-9]+)\] \[.*?\]\((.*?)\)").expect("reference pattern is valid")
});

/// Returns every `[n] [label](url)` reference in `text`, in order of first
/// occurrence. Duplicates are kept.
pub fn extract_sources(text: &str) -> Vec<Source> {
    REFERENCE_RE
        .captures_iter(text)
        .map(|caps| Source::new(&caps[1], &caps[2]))
        .collect()
}
