//! Variant/description enrichment for selected results.
//!
//! Shopping APIs frequently return products with no size/color/material
//! data and a search-engine redirect instead of a retailer link. For
//! every selected result missing all three variant categories this
//! engine, under a configurable concurrency cap:
//!
//! 1. resolves a direct merchant link by searching `"{name} {retailer}"`
//!    on the organic adapter (then the alternate adapter),
//! 2. fetches the resolved page and parses variant options out of it,
//! 3. falls back to the page's meta/OpenGraph description when no
//!    structured variants exist and the result has no description yet.
//!
//! Enrichment is strictly best-effort: every failure is logged and
//! swallowed per candidate. Each candidate is written by exactly one
//! task, so there are no concurrent writes by construction.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::extract;
use crate::linkcheck::is_search_redirect;
use crate::models::{CanonicalResult, Variants};
use crate::source::{SearchSource, SourceSet};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Client presenting browser-like headers. Retailer pages serve bot
/// traffic differently (or not at all).
pub(crate) fn browser_client(timeout_secs: u64) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .default_headers(headers)
        .build()
}

/// What one enrichment task found for its candidate. Only `Some` fields
/// are written back.
#[derive(Debug, Default)]
struct EnrichOutcome {
    link: Option<String>,
    description: Option<String>,
    variants: Option<Variants>,
}

/// Enrich every result that has no variant data at all. Mutates the
/// slice in place; never fails the surrounding search.
pub async fn enrich_results(results: &mut [CanonicalResult], sources: &SourceSet, config: &Config) {
    let targets: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.variants.is_empty())
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        return;
    }

    let client = match browser_client(config.enrichment.fetch_timeout_secs) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "enrichment client build failed; skipping enrichment");
            return;
        }
    };

    let semaphore = Arc::new(Semaphore::new(config.enrichment.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for idx in targets {
        let result = results[idx].clone();
        let organic = sources.organic.clone();
        let alternate = sources.alternate.clone();
        let client = client.clone();
        let semaphore = semaphore.clone();
        let resolve_fetch = config.retrieval.resolve_fetch;
        let variant_cap = config.enrichment.variant_cap;
        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (idx, EnrichOutcome::default()),
            };
            let outcome =
                enrich_one(result, organic, alternate, client, resolve_fetch, variant_cap).await;
            (idx, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let Ok((idx, outcome)) = joined else { continue };
        let result = &mut results[idx];
        if let Some(link) = outcome.link {
            result.link = Some(link);
        }
        if let Some(variants) = outcome.variants {
            result.variants = variants;
        }
        if result.short_description.is_none() {
            if let Some(description) = outcome.description {
                result.short_description = Some(description);
            }
        }
    }
}

async fn enrich_one(
    result: CanonicalResult,
    organic: Option<Arc<dyn SearchSource>>,
    alternate: Option<Arc<dyn SearchSource>>,
    client: Client,
    resolve_fetch: usize,
    variant_cap: usize,
) -> EnrichOutcome {
    let mut out = EnrichOutcome::default();
    let mut link = result.link.clone().unwrap_or_default();
    let mut has_description = result.short_description.is_some();
    let query = format!("{} {}", result.name, result.retailer);

    if let Some(organic) = &organic {
        if link.is_empty() || is_search_redirect(&link) {
            match organic.fetch(&query, resolve_fetch).await {
                Ok(records) => {
                    if let Some(first) = records.first() {
                        if let Some(resolved) = record_link(first) {
                            link = resolved.to_string();
                            out.link = Some(link.clone());
                        }
                        if !has_description {
                            if let Some(snippet) = record_text(first, &["snippet"]) {
                                out.description = Some(snippet);
                                has_description = true;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(name = %result.name, error = %e, "merchant link resolution failed");
                }
            }
        }
    }

    if let Some(alternate) = &alternate {
        if link.is_empty() || is_search_redirect(&link) {
            match alternate.fetch(&query, resolve_fetch).await {
                Ok(records) => {
                    for record in &records {
                        let Some(resolved) = record_link(record) else {
                            continue;
                        };
                        link = resolved.to_string();
                        out.link = Some(link.clone());
                        if !has_description {
                            if let Some(text) = record_text(record, &["content", "description"]) {
                                out.description = Some(text);
                                has_description = true;
                            }
                        }
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(name = %result.name, error = %e, "alternate link resolution failed");
                }
            }
        }
    }

    if !link.is_empty() {
        match fetch_html(&client, &link).await {
            Ok(Some(html)) => {
                if let Some(variants) = extract::variants_from_html(&html, variant_cap) {
                    out.variants = Some(variants);
                } else if !has_description {
                    if let Some(description) = extract::meta_description(&html) {
                        out.description = Some(description);
                    }
                }
            }
            Ok(None) => {} // non-HTML page; nothing to parse
            Err(e) => {
                tracing::debug!(name = %result.name, link = %link, error = %e, "product page fetch failed");
            }
        }
    }

    out
}

/// GET the page; `Ok(None)` for non-HTML content types.
async fn fetch_html(client: &Client, url: &str) -> Result<Option<String>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.contains("html") {
        return Ok(None);
    }
    Ok(Some(response.text().await?))
}

fn record_link(record: &Value) -> Option<&str> {
    record
        .get("link")
        .or_else(|| record.get("url"))
        .and_then(Value::as_str)
        .filter(|l| !l.trim().is_empty())
}

fn record_text(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| record.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn needy_result(name: &str) -> CanonicalResult {
        CanonicalResult {
            name: name.to_string(),
            price: 20.0,
            delivery_estimate: "2 days".to_string(),
            variants: Variants::default(),
            retailer: "Zara".to_string(),
            image_url: None,
            link: None,
            short_description: None,
            item: String::new(),
        }
    }

    fn full_result(name: &str) -> CanonicalResult {
        CanonicalResult {
            variants: Variants {
                sizes: vec!["M".to_string()],
                colors: Vec::new(),
                materials: Vec::new(),
            },
            ..needy_result(name)
        }
    }

    #[tokio::test]
    async fn test_results_with_variants_untouched() {
        let mut results = vec![full_result("Shirt")];
        let before = results[0].clone();
        enrich_results(&mut results, &SourceSet::empty(), &Config::default()).await;
        assert_eq!(results[0].variants, before.variants);
    }

    #[tokio::test]
    async fn test_cap_one_and_cap_five_agree_without_sources() {
        // Linkless candidates with no adapters: enrichment has nothing
        // to do, at any concurrency cap, and must not hang or panic.
        let mut serial = vec![needy_result("A"), needy_result("B"), needy_result("C")];
        let mut parallel = serial.clone();

        let mut config = Config::default();
        config.enrichment.concurrency = 1;
        enrich_results(&mut serial, &SourceSet::empty(), &config).await;

        config.enrichment.concurrency = 5;
        enrich_results(&mut parallel, &SourceSet::empty(), &config).await;

        for (a, b) in serial.iter().zip(parallel.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.variants, b.variants);
            assert_eq!(a.link, b.link);
        }
    }
}
