//! Core data models used throughout the search and ranking pipeline.
//!
//! All retrieval sources are mapped into a single [`CanonicalResult`] shape
//! at the normalization boundary; no downstream code branches on the
//! originating API's representation. Scoring produces [`ScoredProduct`]
//! records that live only for the duration of one ranking call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One requested item (e.g. `"shirt"`), with optional per-item overrides
/// for the requested color and size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemSpec {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl ItemSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            size: None,
        }
    }
}

/// The immutable input to one search call: parsed budget/deadline limits
/// plus the free-text style attributes and the ordered item list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConstraints {
    /// Maximum unit price, parsed from the budget text. `None` = no limit.
    pub max_price: Option<f64>,
    /// Maximum acceptable delivery time in days. `None` = no limit.
    pub max_delivery_days: Option<u32>,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

/// Which retrieval channel a raw record came from. Normalization rules
/// differ per kind (field names, retailer derivation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Shopping-style results from the primary adapter (structured price,
    /// delivery, thumbnails).
    Shopping,
    /// Organic web results from the primary adapter.
    Organic,
    /// Results from the alternate search engine.
    Alternate,
}

/// Size/color/material option lists attached to a result.
///
/// Lists are deduplicated and capped at the extraction boundary; order is
/// the order of first appearance on the product page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variants {
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub materials: Vec<String>,
}

impl Variants {
    /// True when no variant category holds any value — the trigger for
    /// the enrichment engine.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty() && self.colors.is_empty() && self.materials.is_empty()
    }
}

/// The canonical product record every source is normalized into.
///
/// Invariant: `price > 0`. Records that fail price parsing never enter
/// the candidate pool. Identity for deduplication is `(name, retailer)`,
/// case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalResult {
    pub name: String,
    pub price: f64,
    pub delivery_estimate: String,
    #[serde(default)]
    pub variants: Variants,
    pub retailer: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    /// Category key of the requested item this result belongs to.
    /// Tagged by the waterfall controller.
    #[serde(default)]
    pub item: String,
}

impl CanonicalResult {
    /// Deduplication identity: exact `(name, retailer)` pair.
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.name, &self.retailer)
    }
}

/// Per-item diagnostic counters recording the waterfall's decision path.
///
/// Observability only — nothing reads these for control flow.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemTrace {
    pub shopping_raw: usize,
    pub shopping_parsed: usize,
    pub primary_only: usize,
    pub selected_initial: usize,
    pub expanded_raw: usize,
    pub expanded_parsed: usize,
    pub selected_expanded: usize,
    pub alternate_raw: usize,
    pub alternate_parsed: usize,
    pub selected_after_alternate: usize,
    pub after_enrich: usize,
    /// Selected results whose link is a direct retailer page rather than
    /// a search-engine redirect.
    pub direct_links: usize,
    pub organic_fallback_used: bool,
    pub organic_raw: usize,
    pub organic_parsed: usize,
    pub alternate_fallback_used: bool,
    pub after_link_filter: usize,
    /// Raw records rejected at the normalization boundary (empty name,
    /// unparseable or non-positive price).
    pub dropped_malformed: usize,
    /// Human-readable stage failures (adapter errors treated as empty
    /// stages).
    pub stage_errors: Vec<String>,
}

/// Diagnostic record for one whole search call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchTrace {
    /// Whether the primary shopping adapter had credentials. Without
    /// them the result list is empty — no synthetic data is substituted.
    pub shopping_key_set: bool,
    /// Whether the alternate search engine had credentials.
    pub alternate_key_set: bool,
    pub items: BTreeMap<String, ItemTrace>,
}

/// Search output: the final candidate list plus the diagnostic trace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<CanonicalResult>,
    pub trace: SearchTrace,
}

/// Per-dimension scoring weights. Always sums to 1.0 (within rounding
/// tolerance); derived once per ranking request and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub price: f64,
    pub delivery: f64,
    pub style: f64,
}

/// A product flattened into the fields the scoring engine consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankableProduct {
    pub name: String,
    pub price: f64,
    pub delivery_days: f64,
    pub retailer: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub color: String,
    /// Persona style-match score in `[0, 1]`, set during ranking.
    #[serde(default)]
    pub preference_match: f64,
}

/// Per-dimension contribution breakdown of a final score, each term
/// rounded to 3 decimals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Decomposition {
    pub price_contrib: f64,
    pub delivery_contrib: f64,
    pub style_contrib: f64,
}

impl Decomposition {
    /// The dimension contributing the most to the final score, used by
    /// both explanation paths. Ties resolve price → delivery → style.
    pub fn strongest(&self) -> (&'static str, f64) {
        let mut best = ("price", self.price_contrib);
        if self.delivery_contrib > best.1 {
            best = ("delivery", self.delivery_contrib);
        }
        if self.style_contrib > best.1 {
            best = ("style", self.style_contrib);
        }
        best
    }
}

/// A scored candidate within one category. Created fresh per ranking
/// call, never mutated after creation, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredProduct {
    pub product: RankableProduct,
    /// Weighted score in `[0, 1]`, rounded to 3 decimals.
    pub score: f64,
    pub decomposition: Decomposition,
    /// Deterministic one-sentence explanation naming the strongest
    /// dimension. Always present.
    pub local_explanation: String,
    /// Natural-language explanation from the collaborator, top-1 per
    /// category only. Falls back to deterministic text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_explanation: Option<String>,
}

/// Ranking output: the request's weights plus scored candidates grouped
/// by category, each group sorted by descending score.
#[derive(Debug, Clone, Serialize)]
pub struct RankedOutput {
    pub weights: Weights,
    pub results: BTreeMap<String, Vec<ScoredProduct>>,
}

/// Structured output of the (out-of-scope) natural-language requirement
/// extractor. Any field may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRequirements {
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub target: String,
    /// Preference keywords driving the scoring weights.
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub style: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
}
