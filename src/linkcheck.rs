//! Dead-link filtering for the final candidate list.
//!
//! Results without any link are dropped outright. Direct retailer links
//! are trusted without a live probe — HEAD/GET traffic against retailer
//! sites trips bot protection and would reject working product pages.
//! Only when every surviving link is a search-engine redirect does the
//! filter probe each distinct URL (bounded concurrency, HEAD falling
//! back to GET) and keep sub-400 responses.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::LinkCheckConfig;
use crate::enrich::browser_client;
use crate::models::CanonicalResult;

/// True for links that bounce through a search engine instead of landing
/// on a retailer page.
pub fn is_search_redirect(link: &str) -> bool {
    link.contains("google.com/search")
}

/// Apply the dead-link policy described in the module docs.
pub async fn filter_working_links(
    results: Vec<CanonicalResult>,
    config: &LinkCheckConfig,
) -> Vec<CanonicalResult> {
    let linked: Vec<CanonicalResult> = results
        .into_iter()
        .filter(|r| r.link.as_deref().is_some_and(|l| !l.is_empty()))
        .collect();
    if linked.is_empty() {
        return Vec::new();
    }

    let (direct, redirects): (Vec<_>, Vec<_>) = linked
        .into_iter()
        .partition(|r| !is_search_redirect(r.link.as_deref().unwrap_or("")));
    if !direct.is_empty() {
        return direct;
    }

    let client = match browser_client(config.timeout_secs) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "link probe client build failed");
            return Vec::new();
        }
    };

    let urls: HashSet<String> = redirects.iter().filter_map(|r| r.link.clone()).collect();
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut probes = JoinSet::new();
    for url in urls {
        let client = client.clone();
        let semaphore = semaphore.clone();
        probes.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (url, false),
            };
            let alive = probe(&client, &url).await;
            (url, alive)
        });
    }

    let mut alive: HashMap<String, bool> = HashMap::new();
    while let Some(joined) = probes.join_next().await {
        if let Ok((url, ok)) = joined {
            alive.insert(url, ok);
        }
    }

    redirects
        .into_iter()
        .filter(|r| {
            r.link
                .as_deref()
                .and_then(|l| alive.get(l).copied())
                .unwrap_or(false)
        })
        .collect()
}

/// HEAD first; some hosts reject HEAD, so retry with GET before giving up.
async fn probe(client: &reqwest::Client, url: &str) -> bool {
    if let Ok(resp) = client.head(url).send().await {
        if resp.status().as_u16() < 400 {
            return true;
        }
    }
    match client.get(url).send().await {
        Ok(resp) => resp.status().as_u16() < 400,
        Err(_) => false,
    }
}
