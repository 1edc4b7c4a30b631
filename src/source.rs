//! The uniform retrieval-source contract and the injected source bundle.
//!
//! Every external retrieval API sits behind [`SearchSource`]: a query and
//! a result limit in, a list of raw JSON records out. An empty list is a
//! valid response; authentication and transport problems surface as
//! [`SourceError`] values so the waterfall controller can decide per kind
//! whether to continue with the next stage.
//!
//! [`SourceSet`] is the request-scoped bundle of configured adapters.
//! Adapters without credentials are simply absent (`None`) — callers
//! check presence before invoking, and no synthetic fallback exists
//! anywhere in the pipeline.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::source_serper::{SerperOrganic, SerperShopping};
use crate::source_tavily::Tavily;

/// A raw candidate record exactly as the upstream API returned it.
/// Normalization into [`crate::models::CanonicalResult`] happens in one
/// place, keyed by source kind.
pub type RawRecord = serde_json::Value;

/// Failure kinds a retrieval source can produce.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The adapter has no API credentials. Construction paths normally
    /// prevent this from being observed; it exists so an adapter can
    /// fail fast instead of silently fabricating results.
    #[error("no API credentials configured")]
    MissingCredentials,

    /// The API answered with a non-success status.
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the JSON shape the adapter expects.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Uniform contract over external retrieval APIs.
///
/// Implementations must never invent records: no results means an empty
/// list, and errors mean a [`SourceError`]. Mock implementations back
/// the waterfall tests.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Short adapter identifier for logs and traces.
    fn name(&self) -> &str;

    /// Fetch up to `limit` raw records for `query`.
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawRecord>, SourceError>;
}

/// The adapters available to one search call.
///
/// Replaces ambient globals/singletons: the pipeline entry point receives
/// this explicitly, so tests can inject mock sources and a key-less
/// deployment is visible as `shopping: None`.
#[derive(Clone, Default)]
pub struct SourceSet {
    /// Primary shopping-style search.
    pub shopping: Option<Arc<dyn SearchSource>>,
    /// Organic web search on the primary provider (link resolution and
    /// the stage-4 fallback).
    pub organic: Option<Arc<dyn SearchSource>>,
    /// Independent alternate search engine.
    pub alternate: Option<Arc<dyn SearchSource>>,
}

impl SourceSet {
    /// Build the adapter set from configuration. Adapters whose
    /// credentials are absent are left out entirely.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.sources.timeout_secs))
            .build()?;

        let mut set = Self::default();
        if let Some(key) = config.sources.serper_key() {
            set.shopping = Some(Arc::new(SerperShopping::new(client.clone(), key.clone())));
            set.organic = Some(Arc::new(SerperOrganic::new(client.clone(), key)));
        }
        if let Some(key) = config.sources.tavily_key() {
            set.alternate = Some(Arc::new(Tavily::new(client, key)));
        }
        Ok(set)
    }

    /// A set with no adapters at all (every search returns nothing).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn shopping_configured(&self) -> bool {
        self.shopping.is_some()
    }

    pub fn alternate_configured(&self) -> bool {
        self.alternate.is_some()
    }
}

/// Clip an upstream error body for logs and traces.
pub(crate) fn truncate_body(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_has_no_adapters() {
        let set = SourceSet::empty();
        assert!(!set.shopping_configured());
        assert!(!set.alternate_configured());
        assert!(set.organic.is_none());
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        assert_eq!(truncate_body("short", 400), "short");
        let clipped = truncate_body("héllo wörld", 3);
        assert!(clipped.len() <= 3);
        assert!("héllo wörld".starts_with(&clipped));
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::Status {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP status 403: forbidden");
        assert_eq!(
            SourceError::MissingCredentials.to_string(),
            "no API credentials configured"
        );
    }
}
