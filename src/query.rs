//! Free-text budget/deadline normalization and stage query builders.
//!
//! All parsers here are pure: they either extract a numeric constraint or
//! return `None`. Unparseable text is never an error — the filters treat
//! a missing constraint as "no limit".

use regex::Regex;
use std::sync::LazyLock;

use crate::models::SearchConstraints;

static DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Extract a numeric budget from strings like `"$200"`, `"under 100"`,
/// `"50 USD"`. Thousands separators are ignored; the first numeric token
/// wins.
pub fn parse_budget(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    DECIMAL
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Parse a deadline into a maximum number of delivery days.
/// `"3 days"` → 3, `"1 week"` → 7, `"2 months"` → 60.
pub fn parse_deadline_days(text: &str) -> Option<u32> {
    let s = text.trim().to_lowercase();
    let n = INTEGER.find(&s)?.as_str().parse::<u32>().ok()?;
    if s.contains("week") {
        Some(n * 7)
    } else if s.contains("month") {
        Some(n * 30)
    } else {
        Some(n)
    }
}

/// Parse a delivery estimate (`"3 days"`, `"2-4 days"`, `"1 week"`) into
/// a maximum day count for constraint filtering.
///
/// Takes the largest integer found; `"week"` multiplies by 7. Text with
/// no digits maps to 7 days if it mentions a week, otherwise `None` —
/// unparseable estimates pass the delivery filter.
pub fn estimate_days(estimate: &str) -> Option<u32> {
    let s = estimate.trim().to_lowercase();
    let max_n = INTEGER
        .find_iter(&s)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .max();
    match max_n {
        Some(n) if s.contains("week") => Some(n * 7),
        Some(n) => Some(n),
        None if s.contains("week") => Some(7),
        None => None,
    }
}

/// Delivery days as consumed by the scoring engine. Missing or
/// unparseable estimates score as 5 days; `"tomorrow"` as 1.
pub fn delivery_days_for_scoring(estimate: Option<&str>) -> f64 {
    let Some(text) = estimate else {
        return 5.0;
    };
    let s = text.to_lowercase();
    if let Some(days) = INTEGER
        .find_iter(&s)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .max()
    {
        return f64::from(days);
    }
    if s.contains("tomorrow") {
        return 1.0;
    }
    5.0
}

/// Stage-1 query: item + style attributes + size + budget clause,
/// scoped to the trusted retailer domains with `site:` filters.
pub fn scoped_query(item: &str, constraints: &SearchConstraints, domains: &[String]) -> String {
    let mut query = join_terms(&[
        item,
        &constraints.style,
        &constraints.target,
        &constraints.color,
    ]);
    if !constraints.size.trim().is_empty() {
        query.push_str(&format!(" size {}", constraints.size.trim()));
    }
    push_budget_clause(&mut query, constraints.max_price);
    if !domains.is_empty() {
        let site_filters = domains
            .iter()
            .map(|d| format!("site:{d}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        query.push_str(&format!(" ({site_filters})"));
    }
    query
}

/// Stage-2/4 query: unrestricted `"buy <item> ..."` phrasing.
pub fn expanded_query(item: &str, constraints: &SearchConstraints) -> String {
    let mut query = format!(
        "buy {}",
        join_terms(&[
            item,
            &constraints.style,
            &constraints.target,
            &constraints.color,
        ])
    );
    push_budget_clause(&mut query, constraints.max_price);
    query
}

/// Stage-3 query for the alternate engine: generic, no `"buy"` prefix.
pub fn alternate_query(item: &str, constraints: &SearchConstraints) -> String {
    let mut query = join_terms(&[
        item,
        &constraints.style,
        &constraints.target,
        &constraints.color,
    ]);
    push_budget_clause(&mut query, constraints.max_price);
    query
}

fn join_terms(terms: &[&str]) -> String {
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_budget_clause(query: &mut String, max_price: Option<f64>) {
    if let Some(max_price) = max_price {
        if max_price > 0.0 {
            query.push_str(&format!(" under ${max_price:.0}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchConstraints;

    #[test]
    fn test_parse_budget_variants() {
        assert_eq!(parse_budget("$200"), Some(200.0));
        assert_eq!(parse_budget("under 100"), Some(100.0));
        assert_eq!(parse_budget("50 USD"), Some(50.0));
        assert_eq!(parse_budget("1,250.50"), Some(1250.5));
        assert_eq!(parse_budget("no limit"), None);
        assert_eq!(parse_budget(""), None);
    }

    #[test]
    fn test_parse_deadline_days() {
        assert_eq!(parse_deadline_days("3 days"), Some(3));
        assert_eq!(parse_deadline_days("1 week"), Some(7));
        assert_eq!(parse_deadline_days("2 Months"), Some(60));
        assert_eq!(parse_deadline_days("whenever"), None);
    }

    #[test]
    fn test_estimate_days_takes_max() {
        assert_eq!(estimate_days("2-4 days"), Some(4));
        assert_eq!(estimate_days("1 week"), Some(7));
        assert_eq!(estimate_days("2 weeks"), Some(14));
        assert_eq!(estimate_days("free shipping"), None);
        assert_eq!(estimate_days("within a week"), Some(7));
    }

    #[test]
    fn test_delivery_days_for_scoring_defaults() {
        assert_eq!(delivery_days_for_scoring(None), 5.0);
        assert_eq!(delivery_days_for_scoring(Some("arrives tomorrow")), 1.0);
        assert_eq!(delivery_days_for_scoring(Some("3-5 days")), 5.0);
        assert_eq!(delivery_days_for_scoring(Some("no estimate")), 5.0);
    }

    fn constraints() -> SearchConstraints {
        SearchConstraints {
            max_price: Some(50.0),
            max_delivery_days: Some(3),
            size: "M".to_string(),
            style: "casual".to_string(),
            target: "men".to_string(),
            color: "blue".to_string(),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_scoped_query_includes_site_filters() {
        let domains = vec!["zara.com".to_string(), "hm.com".to_string()];
        let q = scoped_query("shirt", &constraints(), &domains);
        assert!(q.starts_with("shirt casual men blue size M under $50"));
        assert!(q.ends_with("(site:zara.com OR site:hm.com)"));
    }

    #[test]
    fn test_expanded_query_has_buy_prefix_and_no_sites() {
        let q = expanded_query("shirt", &constraints());
        assert_eq!(q, "buy shirt casual men blue under $50");
    }

    #[test]
    fn test_empty_attributes_collapse() {
        let c = SearchConstraints {
            max_price: None,
            ..Default::default()
        };
        assert_eq!(expanded_query("shoes", &c), "buy shoes");
        assert_eq!(alternate_query("shoes", &c), "shoes");
    }
}
