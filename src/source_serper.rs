//! Serper (Google Shopping / Google Search) adapters.
//!
//! Two adapters share one authenticated POST helper: [`SerperShopping`]
//! for structured shopping results and [`SerperOrganic`] for organic web
//! results. Serper is reachable at two hosts; each call tries
//! `google.serper.dev` first and falls back to `serper.dev`, surfacing
//! the last error only when every endpoint fails.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::source::{truncate_body, RawRecord, SearchSource, SourceError};

const SHOPPING_ENDPOINTS: [&str; 2] = [
    "https://google.serper.dev/shopping",
    "https://serper.dev/shopping",
];
const SEARCH_ENDPOINTS: [&str; 2] = [
    "https://google.serper.dev/search",
    "https://serper.dev/search",
];

/// Primary shopping-style search adapter.
pub struct SerperShopping {
    client: Client,
    api_key: String,
}

impl SerperShopping {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchSource for SerperShopping {
    fn name(&self) -> &str {
        "serper-shopping"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawRecord>, SourceError> {
        let data = post_serper(
            &self.client,
            &SHOPPING_ENDPOINTS,
            &self.api_key,
            query,
            limit,
        )
        .await?;
        Ok(shopping_records(&data))
    }
}

/// Organic web-search adapter on the same provider.
pub struct SerperOrganic {
    client: Client,
    api_key: String,
}

impl SerperOrganic {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchSource for SerperOrganic {
    fn name(&self) -> &str {
        "serper-organic"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawRecord>, SourceError> {
        let data = post_serper(
            &self.client,
            &SEARCH_ENDPOINTS,
            &self.api_key,
            query,
            limit,
        )
        .await?;
        Ok(organic_records(&data))
    }
}

/// POST the query to each endpoint in order, returning the first
/// successful JSON body.
async fn post_serper(
    client: &Client,
    endpoints: &[&str],
    api_key: &str,
    query: &str,
    limit: usize,
) -> Result<Value, SourceError> {
    let body = json!({ "q": query, "num": limit });
    let mut last_err: Option<SourceError> = None;

    for url in endpoints {
        let resp = client
            .post(*url)
            .header("X-API-KEY", api_key)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| SourceError::Decode(e.to_string()));
                }
                let body_text = response.text().await.unwrap_or_default();
                tracing::warn!(url = *url, status = status.as_u16(), "serper endpoint rejected request");
                last_err = Some(SourceError::Status {
                    status: status.as_u16(),
                    body: truncate_body(&body_text, 400),
                });
            }
            Err(e) => {
                tracing::warn!(url = *url, error = %e, "serper request failed");
                last_err = Some(e.into());
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| SourceError::Decode("no serper endpoint produced a response".into())))
}

/// Pull the record list out of a shopping response. Serper labels it
/// `shopping`; compatible providers use `organic` or `products`.
pub(crate) fn shopping_records(data: &Value) -> Vec<RawRecord> {
    for key in ["shopping", "organic", "products"] {
        if let Some(list) = data.get(key).and_then(Value::as_array) {
            if !list.is_empty() {
                return list.clone();
            }
        }
    }
    if data.as_object().is_some_and(|o| !o.is_empty()) {
        tracing::info!(
            keys = ?data.as_object().map(|o| o.keys().collect::<Vec<_>>()),
            "serper returned no shopping list"
        );
    }
    Vec::new()
}

/// Pull the organic result list out of a search response.
pub(crate) fn organic_records(data: &Value) -> Vec<RawRecord> {
    data.get("organic")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
