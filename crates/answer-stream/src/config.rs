use std::time::Duration;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Configuration for talking to the answer service.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the service (scheme, host, optional port and prefix).
    pub base_url: String,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Optional whole-request timeout.
    ///
    /// Unset by default: answers stream for as long as the search runs.
    pub request_timeout: Option<Duration>,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            user_agent: concat!("answer-stream/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a config pointing at `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().base_url(base_url)
    }

    /// Builds a config from `ANSWER_STREAM_*` environment variables.
    ///
    /// - `ANSWER_STREAM_BASE_URL`
    /// - `ANSWER_STREAM_CONNECT_TIMEOUT_SECS`
    /// - `ANSWER_STREAM_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("ANSWER_STREAM_BASE_URL") {
            if base_url.trim().is_empty() {
                return Err(ClientError::Config(
                    "ANSWER_STREAM_BASE_URL must not be empty".into(),
                ));
            }
            config.base_url = base_url;
        }
        if let Some(secs) = read_secs("ANSWER_STREAM_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_secs("ANSWER_STREAM_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets a whole-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone());
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn chat_url(&self) -> String {
        self.endpoint("/api/chat")
    }
}

fn read_secs(key: &str) -> Result<Option<u64>, ClientError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ClientError::Config(format!("{key} must be a whole number of seconds"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_trim_trailing_slashes() {
        let config = ClientConfig::new("http://localhost:9000//");
        assert_eq!(config.chat_url(), "http://localhost:9000/api/chat");
        assert_eq!(
            config.endpoint("/api/history/abc"),
            "http://localhost:9000/api/history/abc"
        );
    }

    #[test]
    fn defaults_have_no_request_timeout() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.request_timeout.is_none());
        assert!(config.user_agent.starts_with("answer-stream/"));
    }

    #[test]
    fn empty_base_url_is_rejected_when_building_client() {
        let err = ClientConfig::new("  ").build_http_client().expect_err("empty");
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("base_url")));
    }
}
