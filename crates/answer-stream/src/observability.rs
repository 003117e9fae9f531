use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "answer-stream.logs.jsonl";

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    for key in [
        "ANSWER_STREAM_OBSERVABILITY_ENABLED",
        "ANSWER_STREAM_OBSERVABILITY",
    ] {
        if let Ok(value) = std::env::var(key) {
            return parse_bool_env(&value).unwrap_or(true);
        }
    }
    true
}

fn env_filter_from(level: Option<&str>) -> tracing_subscriber::EnvFilter {
    if let Some(level) = level
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn split_log_path(path: &std::path::Path) -> (&std::path::Path, &str) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file_name)
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `ANSWER_STREAM_OBSERVABILITY_ENABLED` / `ANSWER_STREAM_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `ANSWER_STREAM_LOG_LEVEL`: optional level/filter override (`info`, `debug`, etc.).
/// - `ANSWER_STREAM_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, logs go to stderr in a compact console format so stdout stays free for answers.
/// - `RUST_LOG`: optional filter override.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return;
        }

        let level = std::env::var("ANSWER_STREAM_LOG_LEVEL").ok();
        let env_filter = env_filter_from(level.as_deref());
        if let Ok(path_raw) = std::env::var("ANSWER_STREAM_JSON_LOG_PATH") {
            let path = std::path::PathBuf::from(path_raw);
            let (dir, file_name) = split_log_path(&path);
            let _ = std::fs::create_dir_all(dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn bool_env_values() {
        for on in ["1", "true", " YES ", "on", "Enabled"] {
            assert_eq!(parse_bool_env(on), Some(true), "{on}");
        }
        for off in ["0", "false", "No", "off", "disabled"] {
            assert_eq!(parse_bool_env(off), Some(false), "{off}");
        }
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn log_path_is_split_into_dir_and_file() {
        assert_eq!(
            split_log_path(Path::new("logs/run.jsonl")),
            (Path::new("logs"), "run.jsonl")
        );
        assert_eq!(split_log_path(Path::new("run.jsonl")), (Path::new("."), "run.jsonl"));
    }

    #[test]
    fn invalid_level_falls_back() {
        let filter = env_filter_from(Some("answer_stream=debug"));
        assert!(filter.to_string().contains("answer_stream=debug"));
        let _ = env_filter_from(Some("=[not a filter"));
    }
}
