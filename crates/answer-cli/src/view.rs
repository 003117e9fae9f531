use answer_stream::{AnswerView, Source};

/// Keeps the latest painted HTML and echoes progress to stderr.
///
/// Each paint rewrites a single `\r` status line; other output ends that
/// line first.
#[derive(Default)]
pub struct TerminalView {
    html: String,
    paints: usize,
    progress_open: bool,
}

impl TerminalView {
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Ends the progress line, if one is showing.
    pub fn finish(&mut self) {
        if std::mem::take(&mut self.progress_open) {
            eprintln!();
        }
    }

    fn progress(&self) -> String {
        format!("· rendering update {} ({} bytes)", self.paints, self.html.len())
    }
}

impl AnswerView for TerminalView {
    fn session_assigned(&mut self, session_id: &str) {
        tracing::info!(session_id, "session assigned");
    }

    fn log(&mut self, message: &str) {
        self.finish();
        eprintln!("· {message}");
    }

    fn sources(&mut self, sources: &[Source]) {
        self.finish();
        for source in sources {
            match &source.title {
                Some(title) => eprintln!("  [{}] {title} <{}>", source.id, source.url),
                None => eprintln!("  [{}] {}", source.id, source.url),
            }
        }
    }

    fn paint(&mut self, html: &str) {
        self.html.clear();
        self.html.push_str(html);
        self.paints += 1;
        self.progress_open = true;
        eprint!("\r{}", self.progress());
    }

    fn error(&mut self, message: &str) {
        self.finish();
        eprintln!("error: {message}");
    }
}
