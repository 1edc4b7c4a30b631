//! Deterministic multi-factor scoring and category ranking.
//!
//! Every candidate gets a weighted price/delivery/style score in `[0, 1]`
//! with a per-dimension decomposition (each term rounded to 3 decimals)
//! and a deterministic one-line explanation. The top-ranked candidate
//! per category additionally receives a natural-language explanation
//! from the collaborator, falling back to local text on failure.

use std::collections::BTreeMap;

use crate::explain::{self, Explainer};
use crate::models::{
    CanonicalResult, Decomposition, ExtractedRequirements, RankableProduct, RankedOutput,
    ScoredProduct, Weights,
};
use crate::persona::{FixedPersona, Persona, PersonaProvider};
use crate::query;

/// Ranking inputs derived once per request.
#[derive(Debug, Clone)]
pub struct RankingRequest {
    pub budget: f64,
    pub max_delivery_days: f64,
    pub preferences: Vec<String>,
}

/// Derive scoring weights from the clicked preference keywords.
///
/// With no preferences the split is the neutral `{0.33, 0.33, 0.34}`.
/// Otherwise every dimension starts at 0.15 and each keyword hit adds
/// 0.35 to its dimension; the triple is renormalized to sum to 1.0 and
/// rounded to 3 decimals.
pub fn weights_from_preferences(preferences: &[String]) -> Weights {
    if preferences.is_empty() {
        return Weights {
            price: 0.33,
            delivery: 0.33,
            style: 0.34,
        };
    }

    let mut price = 0.15;
    let mut delivery = 0.15;
    let mut style = 0.15;
    for preference in preferences {
        let p = preference.to_lowercase();
        if p.contains("budget") || p.contains("price") {
            price += 0.35;
        } else if p.contains("delivery") || p.contains("fast") {
            delivery += 0.35;
        } else if p.contains("style") || p.contains("look") {
            style += 0.35;
        }
    }

    let total = price + delivery + style;
    Weights {
        price: round3(price / total),
        delivery: round3(delivery / total),
        style: round3(style / total),
    }
}

/// Persona match in `[0, 1]`: color agreement weighs 0.4, style
/// agreement 0.6, each binary on a case-insensitive exact match. The
/// degenerate zero-weight case scores a neutral 0.5.
pub fn style_match(product: &RankableProduct, persona: &Persona) -> f64 {
    let mut score = 0.0;
    let mut total_weight = 0.0;

    let product_color = product.color.to_lowercase();
    let color_match = persona
        .preferred_colors
        .iter()
        .any(|c| c.to_lowercase() == product_color);
    score += if color_match { 0.4 } else { 0.0 };
    total_weight += 0.4;

    let product_style = product.style.to_lowercase();
    let style_hit = persona
        .preferred_styles
        .iter()
        .any(|s| s.to_lowercase() == product_style);
    score += if style_hit { 0.6 } else { 0.0 };
    total_weight += 0.6;

    if total_weight > 0.0 {
        round3(score / total_weight)
    } else {
        0.5
    }
}

/// Score one product against the request. `budget <= 0` or
/// `max_delivery_days <= 0` neutralizes the respective dimension at 0.5
/// instead of dividing by zero.
pub fn score_product(
    product: &RankableProduct,
    weights: &Weights,
    budget: f64,
    max_delivery_days: f64,
) -> ScoredProduct {
    let price_score = if budget > 0.0 {
        (1.0 - product.price / budget).max(0.0)
    } else {
        0.5
    };
    let delivery_score = if max_delivery_days > 0.0 {
        ((max_delivery_days - product.delivery_days) / max_delivery_days).max(0.0)
    } else {
        0.5
    };
    let style_score = product.preference_match;

    let final_score =
        weights.price * price_score + weights.delivery * delivery_score + weights.style * style_score;

    let decomposition = Decomposition {
        price_contrib: round3(weights.price * price_score),
        delivery_contrib: round3(weights.delivery * delivery_score),
        style_contrib: round3(weights.style * style_score),
    };
    let (strongest, value) = decomposition.strongest();
    let local_explanation =
        format!("boosted mainly by {strongest} ({value:.3}) as it contributes the most to the score");

    ScoredProduct {
        product: product.clone(),
        score: round3(final_score),
        decomposition,
        local_explanation,
        llm_explanation: None,
    }
}

/// Score and rank products per category. Categories are processed in
/// key order; within a category the sort is stable descending by score,
/// so ties keep their original candidate order.
pub async fn process_and_rank(
    items: BTreeMap<String, Vec<RankableProduct>>,
    request: &RankingRequest,
    persona_provider: &dyn PersonaProvider,
    explainer: &dyn Explainer,
) -> RankedOutput {
    let persona = persona_provider.persona();
    let weights = weights_from_preferences(&request.preferences);
    tracing::info!(
        budget = request.budget,
        max_delivery_days = request.max_delivery_days,
        preferences = ?request.preferences,
        ?weights,
        "ranking start"
    );

    let mut results: BTreeMap<String, Vec<ScoredProduct>> = BTreeMap::new();
    for (category, mut products) in items {
        if products.is_empty() {
            continue;
        }

        for product in &mut products {
            product.preference_match = style_match(product, &persona);
        }

        let mut scored: Vec<ScoredProduct> = products
            .iter()
            .map(|p| score_product(p, &weights, request.budget, request.max_delivery_days))
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(best) = scored.first_mut() {
            let text =
                explain::explain_top(explainer, best, &category, &weights, &request.preferences)
                    .await;
            best.llm_explanation = Some(text);
            tracing::info!(
                category = %category,
                top = %best.product.name,
                score = best.score,
                price = best.product.price,
                delivery_days = best.product.delivery_days,
                "category winner"
            );
        }

        for (idx, entry) in scored.iter().take(5).enumerate() {
            tracing::info!(
                category = %category,
                rank = idx + 1,
                name = %entry.product.name,
                price = entry.product.price,
                delivery_days = entry.product.delivery_days,
                preference_match = entry.product.preference_match,
                score = entry.score,
                decomposition = ?entry.decomposition,
                "ranked"
            );
        }

        results.insert(category, scored);
    }

    RankedOutput { weights, results }
}

/// Group waterfall results by their item category; untagged results land
/// under `"other"`.
pub fn group_results_by_item(results: &[CanonicalResult]) -> BTreeMap<String, Vec<CanonicalResult>> {
    let mut grouped: BTreeMap<String, Vec<CanonicalResult>> = BTreeMap::new();
    for result in results {
        let key = result.item.trim();
        let key = if key.is_empty() { "other" } else { key };
        grouped.entry(key.to_string()).or_default().push(result.clone());
    }
    grouped
}

/// Rank canonical search results using the requirement extractor's
/// output as the ranking request: budget/deadline parsed from free text
/// (defaults 400.0 / 5 days), preferences from the constraint keywords,
/// persona from the extracted styles/colors.
pub async fn rank_search_results(
    extract: &ExtractedRequirements,
    results: &[CanonicalResult],
    explainer: &dyn Explainer,
) -> RankedOutput {
    let request = RankingRequest {
        budget: query::parse_budget(&extract.budget).unwrap_or(400.0),
        max_delivery_days: query::parse_deadline_days(&extract.deadline)
            .map(f64::from)
            .unwrap_or(5.0),
        preferences: extract.constraints.clone(),
    };
    let persona = FixedPersona(Persona {
        preferred_styles: extract.style.clone(),
        preferred_colors: extract.colors.clone(),
    });

    let first_style = extract.style.first().cloned().unwrap_or_default();
    let first_color = extract.colors.first().cloned().unwrap_or_default();

    let grouped = group_results_by_item(results);
    let mut items: BTreeMap<String, Vec<RankableProduct>> = BTreeMap::new();
    for (category, members) in grouped {
        let converted = members
            .into_iter()
            .map(|r| RankableProduct {
                name: r.name,
                price: r.price,
                delivery_days: query::delivery_days_for_scoring(Some(&r.delivery_estimate)),
                retailer: r.retailer,
                style: first_style.clone(),
                color: first_color.clone(),
                preference_match: 0.0,
            })
            .collect();
        items.insert(category, converted);
    }

    tracing::info!(
        grouped = ?items.iter().map(|(k, v)| (k.clone(), v.len())).collect::<Vec<_>>(),
        "ranking extractor-grouped results"
    );
    process_and_rank(items, &request, &persona, explainer).await
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::DisabledExplainer;

    fn product(name: &str, price: f64, delivery_days: f64) -> RankableProduct {
        RankableProduct {
            name: name.to_string(),
            price,
            delivery_days,
            retailer: "Zara".to_string(),
            style: "casual".to_string(),
            color: "blue".to_string(),
            preference_match: 0.5,
        }
    }

    fn assert_weights_sum_to_one(weights: &Weights) {
        let sum = weights.price + weights.delivery + weights.style;
        assert!(
            (sum - 1.0).abs() < 0.001,
            "weights sum {sum} out of tolerance"
        );
    }

    #[test]
    fn test_weights_default_split() {
        let w = weights_from_preferences(&[]);
        assert_eq!(w.price, 0.33);
        assert_eq!(w.delivery, 0.33);
        assert_eq!(w.style, 0.34);
        assert_weights_sum_to_one(&w);
    }

    #[test]
    fn test_weights_budget_preference_dominates() {
        let w = weights_from_preferences(&["Budget".to_string()]);
        assert!(w.price > w.delivery);
        assert!(w.price > w.style);
        assert_weights_sum_to_one(&w);
    }

    #[test]
    fn test_weights_sum_for_many_combinations() {
        let cases: Vec<Vec<String>> = vec![
            vec!["Budget".into(), "Fast delivery".into()],
            vec!["My Style".into()],
            vec!["budget".into(), "budget".into(), "look".into()],
            vec!["unrelated keyword".into()],
        ];
        for prefs in cases {
            assert_weights_sum_to_one(&weights_from_preferences(&prefs));
        }
    }

    #[test]
    fn test_style_match_full_and_none() {
        let persona = Persona {
            preferred_styles: vec!["casual".to_string()],
            preferred_colors: vec!["blue".to_string()],
        };
        let hit = RankableProduct {
            color: "Blue".to_string(),
            style: "Casual".to_string(),
            ..Default::default()
        };
        assert_eq!(style_match(&hit, &persona), 1.0);

        let miss = RankableProduct {
            color: "red".to_string(),
            style: "formal".to_string(),
            ..Default::default()
        };
        assert_eq!(style_match(&miss, &persona), 0.0);
    }

    #[test]
    fn test_style_match_partial() {
        let persona = Persona {
            preferred_styles: vec!["casual".to_string()],
            preferred_colors: vec!["blue".to_string()],
        };
        let color_only = RankableProduct {
            color: "blue".to_string(),
            style: "formal".to_string(),
            ..Default::default()
        };
        assert_eq!(style_match(&color_only, &persona), 0.4);
    }

    #[test]
    fn test_price_monotonicity() {
        let weights = weights_from_preferences(&[]);
        let cheaper = score_product(&product("A", 30.0, 3.0), &weights, 100.0, 5.0);
        let pricier = score_product(&product("B", 60.0, 3.0), &weights, 100.0, 5.0);
        assert!(cheaper.decomposition.price_contrib > pricier.decomposition.price_contrib);
        assert!(cheaper.score > pricier.score);
    }

    #[test]
    fn test_degenerate_budget_and_deadline_neutralize() {
        let weights = weights_from_preferences(&[]);
        let scored = score_product(&product("A", 30.0, 3.0), &weights, 0.0, 0.0);
        // price and delivery both pinned at 0.5
        assert_eq!(scored.decomposition.price_contrib, round3(weights.price * 0.5));
        assert_eq!(
            scored.decomposition.delivery_contrib,
            round3(weights.delivery * 0.5)
        );
    }

    #[test]
    fn test_over_budget_price_score_floors_at_zero() {
        let weights = weights_from_preferences(&[]);
        let scored = score_product(&product("A", 300.0, 3.0), &weights, 100.0, 5.0);
        assert_eq!(scored.decomposition.price_contrib, 0.0);
    }

    #[test]
    fn test_local_explanation_names_strongest() {
        let weights = weights_from_preferences(&["Budget".to_string()]);
        let scored = score_product(&product("A", 10.0, 5.0), &weights, 100.0, 5.0);
        assert!(scored.local_explanation.contains("boosted mainly by price"));
    }

    #[tokio::test]
    async fn test_process_and_rank_orders_descending() {
        let mut items = BTreeMap::new();
        items.insert(
            "shirt".to_string(),
            vec![
                product("Pricy", 90.0, 3.0),
                product("Cheap", 20.0, 3.0),
                product("Middle", 50.0, 3.0),
            ],
        );
        let request = RankingRequest {
            budget: 100.0,
            max_delivery_days: 5.0,
            preferences: vec!["Budget".to_string()],
        };
        let ranked = process_and_rank(items, &request, &FixedPersona::default(), &DisabledExplainer)
            .await;
        let shirt = &ranked.results["shirt"];
        assert_eq!(shirt[0].product.name, "Cheap");
        assert_eq!(shirt[2].product.name, "Pricy");
        // Only the winner carries a natural-language explanation.
        assert!(shirt[0].llm_explanation.is_some());
        assert!(shirt[1].llm_explanation.is_none());
    }

    #[tokio::test]
    async fn test_rank_search_results_groups_by_item() {
        let results = vec![
            CanonicalResult {
                name: "Shirt A".to_string(),
                price: 20.0,
                delivery_estimate: "2 days".to_string(),
                variants: Default::default(),
                retailer: "Zara".to_string(),
                image_url: None,
                link: None,
                short_description: None,
                item: "shirt".to_string(),
            },
            CanonicalResult {
                name: "Mystery".to_string(),
                price: 15.0,
                delivery_estimate: "1 day".to_string(),
                variants: Default::default(),
                retailer: "Nike".to_string(),
                image_url: None,
                link: None,
                short_description: None,
                item: String::new(),
            },
        ];
        let extract = ExtractedRequirements {
            budget: "$100".to_string(),
            deadline: "1 week".to_string(),
            ..Default::default()
        };
        let ranked = rank_search_results(&extract, &results, &DisabledExplainer).await;
        assert!(ranked.results.contains_key("shirt"));
        assert!(ranked.results.contains_key("other"));
        assert_weights_sum_to_one(&ranked.weights);
    }
}
