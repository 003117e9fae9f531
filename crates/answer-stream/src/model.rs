use serde::{Deserialize, Deserializer, Serialize};

/// A citation source announced by the server.
///
/// Identity is `id`. The server emits ids as integers; they are normalized
/// to their decimal string form so citation markers are matched by exact
/// string equality.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Source {
    /// Creates a source without a title.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
        }
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Unsigned(n) => n.to_string(),
        RawId::Signed(n) => n.to_string(),
    })
}

/// Model/engine selection and search bounds sent with every query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub search_engine: String,
    pub max_results: u32,
    pub max_iterations: u32,
    pub interactive_search: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            model: None,
            api_key: None,
            base_url: None,
            search_engine: "google".to_string(),
            max_results: 8,
            max_iterations: 5,
            interactive_search: true,
        }
    }
}

impl QueryOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn search_engine(mut self, engine: impl Into<String>) -> Self {
        self.search_engine = engine.into();
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Body of the chat request that opens an answer stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub search_engine: String,
    pub max_results: u32,
    pub max_iterations: u32,
    pub interactive_search: bool,
}

impl ChatRequest {
    pub(crate) fn new(query: &str, session_id: Option<String>, options: &QueryOptions) -> Self {
        Self {
            query: query.trim().to_string(),
            session_id,
            model: non_empty(options.model.as_deref()),
            api_key: non_empty(options.api_key.as_deref()),
            base_url: non_empty(options.base_url.as_deref()),
            search_engine: options.search_engine.clone(),
            max_results: options.max_results,
            max_iterations: options.max_iterations,
            interactive_search: options.interactive_search,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ids_accept_numbers_and_strings() {
        let sources: Vec<Source> = serde_json::from_value(serde_json::json!([
            {"id": 1, "url": "https://a", "title": "A"},
            {"id": "02", "url": "https://b"}
        ]))
        .expect("sources");
        assert_eq!(sources[0].id, "1");
        assert_eq!(sources[0].title.as_deref(), Some("A"));
        assert_eq!(sources[1].id, "02");
        assert_eq!(sources[1].title, None);
    }

    #[test]
    fn chat_request_omits_absent_optionals() {
        let request = ChatRequest::new("  what is rust?  ", None, &QueryOptions::default());
        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(body["query"], "what is rust?");
        assert_eq!(body["search_engine"], "google");
        assert_eq!(body["max_results"], 8);
        assert_eq!(body["max_iterations"], 5);
        assert_eq!(body["interactive_search"], true);
        assert!(body.get("session_id").is_none());
        assert!(body.get("model").is_none());
    }

    #[test]
    fn chat_request_carries_session_and_model() {
        let options = QueryOptions::default().model(" gpt-4o ").max_results(3);
        let request = ChatRequest::new("q", Some("20250101120000".into()), &options);
        assert_eq!(request.session_id.as_deref(), Some("20250101120000"));
        assert_eq!(request.model.as_deref(), Some("gpt-4o"));
        assert_eq!(request.max_results, 3);
    }
}
