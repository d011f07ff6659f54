use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use anyhow::{Result, anyhow};

use crate::state::Message;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub prompt: String,
    pub history: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub cypher_query: Option<String>,
    #[serde(default)]
    pub results: Option<Value>,
    /// Set by the backend when the generated query failed to run
    #[serde(default)]
    pub error: Option<String>,
}

impl QueryResponse {
    /// Fold the response into the assistant turn it represents, with a
    /// missing explanation shown as empty text. A backend `error` does not
    /// change the turn; the generated query is kept either way.
    pub fn into_message(self) -> Message {
        Message {
            structured_query: self.cypher_query,
            results: self.results,
            ..Message::assistant(self.explanation.unwrap_or_default())
        }
    }
}

/// The remote side of a conversation: one request in, one response out
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let url = self.query_url();

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "backend request failed with status: {}. Make sure the query service is running at {}",
                response.status(),
                self.base_url
            ));
        }

        let body = response.text().await?;
        let query_response: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("backend returned malformed JSON: {}", e))?;
        Ok(query_response)
    }
}
