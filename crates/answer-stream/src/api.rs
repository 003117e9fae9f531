//! Settings and chat-history endpoints of the answer service.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::model::QueryOptions;

/// User settings persisted by the service.
///
/// Missing fields take the service defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: String,
    pub api_key: String,
    pub base_url: String,
    /// Comma-separated list of model ids.
    pub model_id: String,
    pub search_engine: String,
    pub max_results: u32,
    pub max_iterations: u32,
    pub interactive_search: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let query = QueryOptions::default();
        Self {
            theme: "light".to_string(),
            api_key: String::new(),
            base_url: String::new(),
            model_id: String::new(),
            search_engine: query.search_engine,
            max_results: query.max_results,
            max_iterations: query.max_iterations,
            interactive_search: query.interactive_search,
        }
    }
}

impl Settings {
    /// Configured model ids, trimmed, empties dropped.
    pub fn models(&self) -> Vec<&str> {
        self.model_id
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect()
    }

    /// Query options for a chat request using `selected_model`, falling back
    /// to the first configured model.
    pub fn query_options(&self, selected_model: Option<&str>) -> QueryOptions {
        let model = selected_model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .or_else(|| self.models().first().copied())
            .map(str::to_string);
        QueryOptions {
            model,
            api_key: non_empty(&self.api_key),
            base_url: non_empty(&self.base_url),
            search_engine: self.search_engine.clone(),
            max_results: self.max_results,
            max_iterations: self.max_iterations,
            interactive_search: self.interactive_search,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// One entry of the history listing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A persisted conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    pub timestamp: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub logs: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// Client for the request/response endpoints next to the chat stream.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = config.build_http_client()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub async fn fetch_settings(&self) -> Result<Settings, ClientError> {
        self.get_json("/api/settings").await
    }

    pub async fn default_settings(&self) -> Result<Settings, ClientError> {
        self.get_json("/api/settings/default").await
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.config.endpoint("/api/settings"))
            .json(settings);
        self.execute(request).await.map(drop)
    }

    pub async fn fetch_history(&self) -> Result<Vec<ChatSummary>, ClientError> {
        self.get_json("/api/history").await
    }

    pub async fn fetch_chat(&self, session_id: &str) -> Result<ChatRecord, ClientError> {
        let path = chat_path(session_id)?;
        self.get_json(&path).await
    }

    pub async fn delete_chat(&self, session_id: &str) -> Result<(), ClientError> {
        let path = chat_path(session_id)?;
        let request = self.client.delete(self.config.endpoint(&path));
        self.execute(request).await.map(drop)
    }

    pub async fn clear_history(&self) -> Result<(), ClientError> {
        let request = self.client.delete(self.config.endpoint("/api/history"));
        self.execute(request).await.map(drop)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .execute(self.client.get(self.config.endpoint(path)))
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(format!("{path}: {e}")))
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "api response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn chat_path(session_id: &str) -> Result<String, ClientError> {
    let id = session_id.trim();
    if id.is_empty() || id.contains(['/', '\\', '?', '#']) || id == "." || id == ".." {
        return Err(ClientError::Validation(format!(
            "invalid session id: {session_id:?}"
        )));
    }
    Ok(format!("/api/history/{id}"))
}
