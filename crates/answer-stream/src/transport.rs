use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::model::ChatRequest;

/// Raw response body as a stream of byte chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, ClientError>> + Send + 'static>>;

/// Opens answer streams. Dropping the returned stream aborts the request.
#[async_trait::async_trait]
pub trait AnswerTransport: Send + Sync {
    /// Sends `request` and returns the response body once the server has
    /// accepted it (success status).
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ClientError>;
}

/// HTTP transport posting to `{base_url}/api/chat`.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = config.build_http_client()?;
        Ok(Self { client, config })
    }

    /// Creates a transport from `ANSWER_STREAM_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl AnswerTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        debug!(session_id = ?request.session_id, model = ?request.model, "opening answer stream");
        let response = self
            .client
            .post(self.config.chat_url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("chat request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ClientError::transport(format!("stream read failed: {e}"))));
        Ok(Box::pin(stream))
    }
}
