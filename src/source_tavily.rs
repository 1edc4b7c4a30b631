//! Tavily adapter — the alternate, provider-independent search engine.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::source::{truncate_body, RawRecord, SearchSource, SourceError};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

pub struct Tavily {
    client: Client,
    api_key: String,
}

impl Tavily {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchSource for Tavily {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawRecord>, SourceError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "basic",
            "max_results": limit,
            "include_images": true,
            "include_answer": false,
        });

        let response = self.client.post(TAVILY_SEARCH_URL).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "tavily rejected request");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: truncate_body(&body_text, 400),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(result_records(&data))
    }
}

pub(crate) fn result_records(data: &Value) -> Vec<RawRecord> {
    data.get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
