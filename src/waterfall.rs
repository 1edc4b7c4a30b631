//! The staged retrieval waterfall.
//!
//! For each requested item the controller escalates through retrieval
//! stages, keeping one deduplicated candidate pool that is re-sorted by
//! `(retailer rank, retailer, price)` after every stage:
//!
//! 1. **Scoped primary search** — site-filtered to the trusted retailer
//!    domains; if any allowlisted retailer appears, only those results
//!    are kept.
//! 2. **Expanded search** — same adapter, unrestricted domains, `"buy"`
//!    query. Only fires when stage 1 selected fewer than the target.
//! 3. **Alternate engine** — independent provider, generic query. Only
//!    fires while still under target and only when configured.
//! 4. **Organic fallback** — when enrichment leaves zero direct retailer
//!    links, organic web results *replace* the candidate set (a
//!    deliberately different trust tier; see DESIGN.md).
//!
//! Stages run strictly in order — a later stage's trigger depends on the
//! earlier stage's yield. Any adapter failure is logged, recorded in the
//! trace, and treated as an empty stage; nothing aborts the item.

use std::collections::HashSet;

use crate::config::Config;
use crate::enrich;
use crate::linkcheck::{self, is_search_redirect};
use crate::models::{
    CanonicalResult, ItemSpec, ItemTrace, SearchConstraints, SearchOutcome, SearchTrace,
    SourceKind,
};
use crate::normalize;
use crate::query;
use crate::retailers::RetailerBook;
use crate::source::{SearchSource, SourceError, SourceSet};

/// Run the full waterfall for every requested item and return the merged
/// result list plus the diagnostic trace.
///
/// Without a configured shopping adapter the result list is empty — no
/// synthetic data is ever substituted. An empty item list short-circuits
/// the same way — invalid input, not an error.
pub async fn search_products(
    config: &Config,
    sources: &SourceSet,
    constraints: &SearchConstraints,
) -> SearchOutcome {
    let book = RetailerBook::from_config(&config.retailers);
    let mut trace = SearchTrace {
        shopping_key_set: sources.shopping_configured(),
        alternate_key_set: sources.alternate_configured(),
        ..Default::default()
    };

    if constraints.items.is_empty() {
        return SearchOutcome {
            results: Vec::new(),
            trace,
        };
    }

    let mut all_results = Vec::new();
    if let Some(shopping) = &sources.shopping {
        for item in &constraints.items {
            let (selected, item_trace) = search_item(
                config,
                shopping.as_ref(),
                sources,
                &book,
                constraints,
                item,
            )
            .await;
            all_results.extend(selected);
            trace.items.insert(item.name.clone(), item_trace);
        }
    } else {
        tracing::warn!("no shopping adapter configured; returning empty result list");
    }

    // Defensive re-check across the merged set; idempotent with the
    // per-stage filtering.
    let results = apply_global_filter(all_results, constraints);
    SearchOutcome { results, trace }
}

async fn search_item(
    config: &Config,
    shopping: &dyn SearchSource,
    sources: &SourceSet,
    book: &RetailerBook,
    constraints: &SearchConstraints,
    item: &ItemSpec,
) -> (Vec<CanonicalResult>, ItemTrace) {
    let mut trace = ItemTrace::default();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut pool: Vec<CanonicalResult> = Vec::new();
    let mut selected: Vec<CanonicalResult> = Vec::new();
    let target = config.retrieval.target_count;

    // ============ Stage 1: scoped primary search ============

    let scoped = query::scoped_query(&item.name, constraints, book.domains());
    match shopping.fetch(&scoped, config.retrieval.shopping_fetch).await {
        Ok(raw) => {
            trace.shopping_raw = raw.len();
            let (candidates, malformed) =
                normalize::parse_and_filter(&raw, SourceKind::Shopping, constraints);
            trace.dropped_malformed += malformed;
            trace.shopping_parsed = candidates.len();
            let candidates = primary_only_if_any(candidates, book);
            trace.primary_only = candidates.len();
            merge_new(&mut pool, &mut seen, candidates);
            sort_candidates(&mut pool, book);
            selected = select_per_item(&pool, target);
            trace.selected_initial = selected.len();
        }
        Err(e) => record_stage_error(&mut trace, &item.name, "scoped", &e),
    }

    // ============ Stage 2: expanded search ============

    let expanded = query::expanded_query(&item.name, constraints);
    if selected.len() < target {
        match shopping.fetch(&expanded, config.retrieval.expanded_fetch).await {
            Ok(raw) => {
                trace.expanded_raw = raw.len();
                let (candidates, malformed) =
                    normalize::parse_and_filter(&raw, SourceKind::Shopping, constraints);
                trace.dropped_malformed += malformed;
                trace.expanded_parsed = candidates.len();
                merge_new(&mut pool, &mut seen, candidates);
                sort_candidates(&mut pool, book);
                selected = select_per_item(&pool, target);
                trace.selected_expanded = selected.len();
            }
            Err(e) => record_stage_error(&mut trace, &item.name, "expanded", &e),
        }
    }

    // ============ Stage 3: alternate engine ============

    if selected.len() < target {
        if let Some(alternate) = &sources.alternate {
            let generic = query::alternate_query(&item.name, constraints);
            match alternate.fetch(&generic, config.retrieval.alternate_fetch).await {
                Ok(raw) => {
                    trace.alternate_raw = raw.len();
                    let (candidates, malformed) =
                        normalize::parse_and_filter(&raw, SourceKind::Alternate, constraints);
                    trace.dropped_malformed += malformed;
                    trace.alternate_parsed = candidates.len();
                    merge_new(&mut pool, &mut seen, candidates);
                    sort_candidates(&mut pool, book);
                    selected = select_per_item(&pool, target);
                    trace.selected_after_alternate = selected.len();
                }
                Err(e) => record_stage_error(&mut trace, &item.name, "alternate", &e),
            }
        }
    }

    // ============ Enrichment + requested-variant overrides ============

    enrich::enrich_results(&mut selected, sources, config).await;
    apply_variant_overrides(&mut selected, constraints, item);
    trace.after_enrich = selected.len();

    let direct_links = selected
        .iter()
        .filter(|r| {
            r.link
                .as_deref()
                .is_some_and(|l| !l.is_empty() && !is_search_redirect(l))
        })
        .count();
    trace.direct_links = direct_links;

    // ============ Stage 4: organic fallback (replace, not merge) ============

    if direct_links == 0 {
        if let Some(organic) = &sources.organic {
            trace.organic_fallback_used = true;
            match organic.fetch(&expanded, config.retrieval.organic_fetch).await {
                Ok(raw) => {
                    trace.organic_raw = raw.len();
                    let (mut candidates, malformed) =
                        normalize::parse_and_filter(&raw, SourceKind::Organic, constraints);
                    trace.dropped_malformed += malformed;
                    trace.organic_parsed = candidates.len();
                    if !candidates.is_empty() {
                        sort_candidates(&mut candidates, book);
                        selected = select_per_item(&candidates, target);
                    }
                }
                Err(e) => record_stage_error(&mut trace, &item.name, "organic-fallback", &e),
            }
        }

        if selected.len() < target {
            if let Some(alternate) = &sources.alternate {
                trace.alternate_fallback_used = true;
                match alternate.fetch(&expanded, config.retrieval.organic_fetch).await {
                    Ok(raw) => {
                        let (mut candidates, malformed) =
                            normalize::parse_and_filter(&raw, SourceKind::Alternate, constraints);
                        trace.dropped_malformed += malformed;
                        if !candidates.is_empty() {
                            sort_candidates(&mut candidates, book);
                            selected = select_per_item(&candidates, target);
                        }
                    }
                    Err(e) => record_stage_error(&mut trace, &item.name, "alternate-fallback", &e),
                }
            }
        }
    }

    // ============ Dead-link filter + category tagging ============

    let mut selected = linkcheck::filter_working_links(selected, &config.linkcheck).await;
    trace.after_link_filter = selected.len();

    for result in &mut selected {
        result.item = item.name.clone();
    }
    (selected, trace)
}

fn record_stage_error(trace: &mut ItemTrace, item: &str, stage: &str, error: &SourceError) {
    tracing::warn!(item, stage, error = %error, "stage failed; continuing waterfall");
    trace.stage_errors.push(format!("{stage}: {error}"));
}

/// Deterministic candidate ordering: retailer trust rank, then retailer
/// name (case-insensitive), then price ascending.
pub fn sort_candidates(candidates: &mut [CanonicalResult], book: &RetailerBook) {
    candidates.sort_by(|a, b| {
        book.rank(&a.retailer)
            .cmp(&book.rank(&b.retailer))
            .then_with(|| a.retailer.to_lowercase().cmp(&b.retailer.to_lowercase()))
            .then_with(|| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
    });
}

/// Keep only allowlisted retailers when at least one is present;
/// otherwise keep the full list (stage-1 special mode).
pub fn primary_only_if_any(
    candidates: Vec<CanonicalResult>,
    book: &RetailerBook,
) -> Vec<CanonicalResult> {
    let any_primary = candidates.iter().any(|c| book.is_primary(&c.retailer));
    if !any_primary {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| book.is_primary(&c.retailer))
        .collect()
}

/// Append candidates whose `(name, retailer)` key has not been seen yet.
fn merge_new(
    pool: &mut Vec<CanonicalResult>,
    seen: &mut HashSet<(String, String)>,
    incoming: Vec<CanonicalResult>,
) {
    for candidate in incoming {
        let key = (candidate.name.clone(), candidate.retailer.clone());
        if seen.insert(key) {
            pool.push(candidate);
        }
    }
}

/// The per-item selection rule: iterate candidates in sorted order and
/// take the first result per distinct retailer up to `target`; if supply
/// is scarce, fill remaining slots with leftover candidates (any
/// retailer) without duplicating an already-selected result.
pub fn select_per_item(candidates: &[CanonicalResult], target: usize) -> Vec<CanonicalResult> {
    let mut selected: Vec<CanonicalResult> = Vec::new();
    let mut retailers_seen: HashSet<&str> = HashSet::new();

    for candidate in candidates {
        if selected.len() >= target {
            break;
        }
        if !retailers_seen.insert(candidate.retailer.as_str()) {
            continue;
        }
        selected.push(candidate.clone());
    }

    if selected.len() < target {
        for candidate in candidates {
            if selected.len() >= target {
                break;
            }
            let taken = selected
                .iter()
                .any(|s| s.dedup_key() == candidate.dedup_key());
            if !taken {
                selected.push(candidate.clone());
            }
        }
    }
    selected
}

/// Force the requested size/color onto every selected result as
/// single-element variant lists. Reported availability is a label, not a
/// stock check — a documented simplification.
fn apply_variant_overrides(
    results: &mut [CanonicalResult],
    constraints: &SearchConstraints,
    item: &ItemSpec,
) {
    let size = item
        .size
        .as_deref()
        .unwrap_or(&constraints.size)
        .trim()
        .to_string();
    let color = item
        .color
        .as_deref()
        .unwrap_or(&constraints.color)
        .trim()
        .to_string();

    for result in results {
        if !size.is_empty() {
            result.variants.sizes = vec![size.clone()];
        }
        if !color.is_empty() {
            result.variants.colors = vec![color.clone()];
        }
    }
}

/// Re-apply budget/delivery constraints across the merged set.
pub fn apply_global_filter(
    results: Vec<CanonicalResult>,
    constraints: &SearchConstraints,
) -> Vec<CanonicalResult> {
    results
        .into_iter()
        .filter(|r| normalize::passes_constraints(r, constraints))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetailersConfig;

    fn make_result(name: &str, retailer: &str, price: f64) -> CanonicalResult {
        CanonicalResult {
            name: name.to_string(),
            price,
            delivery_estimate: "2 days".to_string(),
            variants: Default::default(),
            retailer: retailer.to_string(),
            image_url: None,
            link: Some(format!("https://{}.example/{}", retailer.to_lowercase(), name)),
            short_description: None,
            item: String::new(),
        }
    }

    fn book() -> RetailerBook {
        RetailerBook::from_config(&RetailersConfig::default())
    }

    #[test]
    fn test_sort_orders_by_rank_then_name_then_price() {
        let mut candidates = vec![
            make_result("A", "Obscure Outlet", 5.0),
            make_result("B", "Nike", 30.0),
            make_result("C", "Nike", 20.0),
            make_result("D", "Zara", 50.0),
        ];
        sort_candidates(&mut candidates, &book());
        // Zara ranks 0, Nike ranks 9, unknown ranks last.
        assert_eq!(candidates[0].name, "D");
        assert_eq!(candidates[1].name, "C");
        assert_eq!(candidates[2].name, "B");
        assert_eq!(candidates[3].name, "A");
    }

    #[test]
    fn test_select_prefers_distinct_retailers() {
        let candidates = vec![
            make_result("A", "Zara", 10.0),
            make_result("B", "Zara", 12.0),
            make_result("C", "Nike", 14.0),
            make_result("D", "Amazon", 16.0),
        ];
        let selected = select_per_item(&candidates, 3);
        let retailers: Vec<&str> = selected.iter().map(|r| r.retailer.as_str()).collect();
        assert_eq!(retailers, vec!["Zara", "Nike", "Amazon"]);
    }

    #[test]
    fn test_select_fills_from_leftovers_when_scarce() {
        let candidates = vec![
            make_result("A", "Zara", 10.0),
            make_result("B", "Zara", 12.0),
            make_result("C", "Zara", 14.0),
        ];
        let selected = select_per_item(&candidates, 3);
        assert_eq!(selected.len(), 3);
        // No candidate selected twice.
        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                assert_ne!(a.dedup_key(), b.dedup_key());
            }
        }
    }

    #[test]
    fn test_select_never_exceeds_target() {
        let candidates: Vec<_> = (0..20)
            .map(|i| make_result(&format!("P{i}"), &format!("R{i}"), 10.0))
            .collect();
        assert_eq!(select_per_item(&candidates, 5).len(), 5);
        assert!(select_per_item(&[], 5).is_empty());
    }

    #[test]
    fn test_primary_only_mode() {
        let mixed = vec![
            make_result("A", "Zara", 10.0),
            make_result("B", "Corner Shop", 8.0),
        ];
        let filtered = primary_only_if_any(mixed, &book());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].retailer, "Zara");

        let unknown_only = vec![make_result("B", "Corner Shop", 8.0)];
        assert_eq!(primary_only_if_any(unknown_only, &book()).len(), 1);
    }

    #[test]
    fn test_merge_deduplicates_by_name_and_retailer() {
        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        merge_new(
            &mut pool,
            &mut seen,
            vec![make_result("Item X", "Amazon", 10.0)],
        );
        merge_new(
            &mut pool,
            &mut seen,
            vec![
                make_result("Item X", "Amazon", 11.0), // same key, later stage
                make_result("Item X", "Zara", 11.0),
            ],
        );
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].price, 10.0); // first sighting wins
    }

    #[test]
    fn test_variant_overrides_prefer_item_spec() {
        let constraints = SearchConstraints {
            size: "M".to_string(),
            color: "blue".to_string(),
            ..Default::default()
        };
        let item = ItemSpec {
            name: "shirt".to_string(),
            color: Some("red".to_string()),
            size: None,
        };
        let mut results = vec![make_result("A", "Zara", 10.0)];
        apply_variant_overrides(&mut results, &constraints, &item);
        assert_eq!(results[0].variants.sizes, vec!["M"]);
        assert_eq!(results[0].variants.colors, vec!["red"]);
    }

    #[test]
    fn test_global_filter_is_idempotent() {
        let constraints = SearchConstraints {
            max_price: Some(15.0),
            ..Default::default()
        };
        let results = vec![
            make_result("A", "Zara", 10.0),
            make_result("B", "Nike", 20.0),
        ];
        let once = apply_global_filter(results, &constraints);
        assert_eq!(once.len(), 1);
        let twice = apply_global_filter(once.clone(), &constraints);
        assert_eq!(once.len(), twice.len());
    }
}
