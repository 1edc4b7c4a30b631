//! Raw record → [`CanonicalResult`] normalization and constraint filtering.
//!
//! This is the only place that understands upstream field names. Records
//! that fail normalization (empty name, unparseable or non-positive
//! price) are dropped here and never enter the candidate pool, so every
//! downstream component can rely on `price > 0`.

use serde_json::Value;

use crate::models::{CanonicalResult, SearchConstraints, SourceKind, Variants};
use crate::query;
use crate::retailers;

/// Map one raw record into the canonical shape, or `None` if the record
/// is malformed for its source kind.
pub fn normalize(raw: &Value, kind: SourceKind) -> Option<CanonicalResult> {
    match kind {
        SourceKind::Shopping => normalize_shopping(raw),
        SourceKind::Organic => normalize_organic(raw),
        SourceKind::Alternate => normalize_alternate(raw),
    }
}

fn normalize_shopping(raw: &Value) -> Option<CanonicalResult> {
    let name = first_str(raw, &["title", "name"])?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let price = parse_price(raw)?;

    let delivery = first_str(raw, &["delivery", "delivery_estimate"])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("3-5 days")
        .to_string();

    let link = first_str(raw, &["link", "url", "product_url"]).map(str::to_string);
    let retailer = first_str(raw, &["source"])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| retailers::domain_retailer(link.as_deref().unwrap_or("")));

    Some(CanonicalResult {
        name,
        price: round2(price),
        delivery_estimate: delivery,
        variants: Variants {
            sizes: string_list(raw.get("sizes")),
            colors: string_list(raw.get("colors")),
            materials: string_list(raw.get("material")),
        },
        retailer,
        image_url: extract_image(raw),
        link,
        short_description: coerce_description(
            raw.get("snippet")
                .or_else(|| raw.get("description"))
                .or_else(|| raw.get("richSnippet"))
                .or_else(|| raw.get("rich_snippet")),
        ),
        item: String::new(),
    })
}

fn normalize_organic(raw: &Value) -> Option<CanonicalResult> {
    let name = first_str(raw, &["title"])?.trim().to_string();
    let link = first_str(raw, &["link", "url"])?.to_string();
    if name.is_empty() || link.is_empty() {
        return None;
    }
    // Organic results rarely expose structured pricing; without it the
    // record cannot satisfy the price invariant and is dropped.
    let price = parse_price(raw)?;

    Some(CanonicalResult {
        name,
        price: round2(price),
        delivery_estimate: "Unknown".to_string(),
        variants: Variants::default(),
        retailer: retailers::domain_retailer(&link),
        image_url: None,
        link: Some(link),
        short_description: coerce_description(raw.get("snippet")),
        item: String::new(),
    })
}

fn normalize_alternate(raw: &Value) -> Option<CanonicalResult> {
    let name = first_str(raw, &["title"])?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let price = parse_price(raw)?;
    let link = first_str(raw, &["url", "link"]).map(str::to_string);
    let retailer = link
        .as_deref()
        .map(retailers::domain_retailer)
        .unwrap_or_else(|| "Unknown".to_string());

    Some(CanonicalResult {
        name,
        price: round2(price),
        delivery_estimate: "Unknown".to_string(),
        variants: Variants::default(),
        retailer,
        image_url: first_str(raw, &["image"]).map(str::to_string),
        link,
        short_description: coerce_description(
            raw.get("content").or_else(|| raw.get("description")),
        ),
        item: String::new(),
    })
}

/// Budget/delivery constraint check. Unparseable delivery estimates pass
/// the filter — only an estimate that provably exceeds the deadline
/// drops a result.
pub fn passes_constraints(result: &CanonicalResult, constraints: &SearchConstraints) -> bool {
    if let Some(max_price) = constraints.max_price {
        if max_price > 0.0 && result.price > max_price {
            return false;
        }
    }
    if let Some(max_days) = constraints.max_delivery_days {
        if let Some(days) = query::estimate_days(&result.delivery_estimate) {
            if days > max_days {
                return false;
            }
        }
    }
    true
}

/// Normalize a raw batch and apply constraint filtering. Returns the
/// surviving candidates plus the count of malformed records dropped at
/// the normalization boundary (for the debug trace).
pub fn parse_and_filter(
    raw: &[Value],
    kind: SourceKind,
    constraints: &SearchConstraints,
) -> (Vec<CanonicalResult>, usize) {
    let mut candidates = Vec::new();
    let mut malformed = 0usize;
    for record in raw {
        match normalize(record, kind) {
            Some(result) => {
                if passes_constraints(&result, constraints) {
                    candidates.push(result);
                }
            }
            None => malformed += 1,
        }
    }
    (candidates, malformed)
}

// ============ Field extraction helpers ============

fn first_str<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| raw.get(*k).and_then(Value::as_str))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Price may arrive as a number or as text with currency noise
/// (`"$1,299.00"`). Strips everything but digits and dots before
/// parsing; non-positive and unparseable values are rejected.
fn parse_price(raw: &Value) -> Option<f64> {
    let value = raw
        .get("price")
        .or_else(|| raw.get("extractedPrice"))
        .or_else(|| raw.get("extracted_price"))?;

    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if price > 0.0 {
        Some(price)
    } else {
        None
    }
}

/// Try the known image field names, then thumbnail lists. Only absolute
/// http(s) URLs are accepted.
fn extract_image(raw: &Value) -> Option<String> {
    const FIELDS: [&str; 7] = [
        "image",
        "imageUrl",
        "image_url",
        "thumbnail",
        "product_image",
        "image_link",
        "productImage",
    ];
    for field in FIELDS {
        if let Some(url) = raw.get(field).and_then(Value::as_str) {
            let url = url.trim();
            if is_absolute_http(url) {
                return Some(url.to_string());
            }
        }
    }

    let thumbnails = raw
        .get("thumbnails")
        .or_else(|| raw.get("serpapi_thumbnails"))
        .and_then(Value::as_array)?;
    let first = thumbnails.first()?;
    let url = match first {
        Value::String(s) => s.trim(),
        Value::Object(o) => o
            .get("image")
            .or_else(|| o.get("url"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim(),
        _ => "",
    };
    if is_absolute_http(url) {
        Some(url.to_string())
    } else {
        None
    }
}

fn is_absolute_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Descriptions arrive as plain text, rich-snippet objects, or string
/// arrays; flatten all of them to trimmed text.
fn coerce_description(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("content")
            .or_else(|| o.get("text"))
            .and_then(Value::as_str)?
            .to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => return None,
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shopping_record(price: Value) -> Value {
        json!({
            "title": "Linen Shirt",
            "price": price,
            "source": "Zara",
            "link": "https://www.zara.com/shirt",
            "delivery": "2 days",
        })
    }

    #[test]
    fn test_normalize_shopping_basic() {
        let r = normalize(&shopping_record(json!("$45.99")), SourceKind::Shopping).unwrap();
        assert_eq!(r.name, "Linen Shirt");
        assert_eq!(r.price, 45.99);
        assert_eq!(r.retailer, "Zara");
        assert_eq!(r.delivery_estimate, "2 days");
    }

    #[test]
    fn test_price_noise_stripped() {
        let r = normalize(&shopping_record(json!("$1,299.00")), SourceKind::Shopping).unwrap();
        assert_eq!(r.price, 1299.0);
    }

    #[test]
    fn test_nonpositive_price_rejected() {
        assert!(normalize(&shopping_record(json!(0)), SourceKind::Shopping).is_none());
        assert!(normalize(&shopping_record(json!(-5.0)), SourceKind::Shopping).is_none());
        assert!(normalize(&shopping_record(json!("free")), SourceKind::Shopping).is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let record = json!({ "title": "  ", "price": 10.0 });
        assert!(normalize(&record, SourceKind::Shopping).is_none());
    }

    #[test]
    fn test_missing_delivery_gets_placeholder() {
        let record = json!({ "title": "Cap", "price": 12.0, "source": "Nike" });
        let r = normalize(&record, SourceKind::Shopping).unwrap();
        assert_eq!(r.delivery_estimate, "3-5 days");
    }

    #[test]
    fn test_retailer_falls_back_to_domain() {
        let record = json!({
            "title": "Cap",
            "price": 12.0,
            "link": "https://www.amazon.com/cap",
        });
        let r = normalize(&record, SourceKind::Shopping).unwrap();
        assert_eq!(r.retailer, "Amazon.com");
    }

    #[test]
    fn test_image_field_priority_and_scheme_check() {
        let record = json!({
            "title": "Cap",
            "price": 12.0,
            "image": "not-a-url",
            "thumbnail": "https://img.example.com/cap.jpg",
        });
        let r = normalize(&record, SourceKind::Shopping).unwrap();
        assert_eq!(
            r.image_url.as_deref(),
            Some("https://img.example.com/cap.jpg")
        );
    }

    #[test]
    fn test_image_from_thumbnail_list() {
        let record = json!({
            "title": "Cap",
            "price": 12.0,
            "thumbnails": [{ "image": "https://img.example.com/t0.jpg" }],
        });
        let r = normalize(&record, SourceKind::Shopping).unwrap();
        assert_eq!(
            r.image_url.as_deref(),
            Some("https://img.example.com/t0.jpg")
        );
    }

    #[test]
    fn test_rich_snippet_object_coerced() {
        let record = json!({
            "title": "Cap",
            "price": 12.0,
            "richSnippet": { "content": "A fine cap." },
        });
        let r = normalize(&record, SourceKind::Shopping).unwrap();
        assert_eq!(r.short_description.as_deref(), Some("A fine cap."));
    }

    #[test]
    fn test_organic_requires_link_and_price() {
        let no_link = json!({ "title": "Cap", "price": 10.0 });
        assert!(normalize(&no_link, SourceKind::Organic).is_none());

        let no_price = json!({ "title": "Cap", "link": "https://zara.com/cap" });
        assert!(normalize(&no_price, SourceKind::Organic).is_none());

        let full = json!({
            "title": "Cap",
            "link": "https://zara.com/cap",
            "price": "19.99",
            "snippet": "A cap.",
        });
        let r = normalize(&full, SourceKind::Organic).unwrap();
        assert_eq!(r.retailer, "Zara.com");
        assert_eq!(r.price, 19.99);
    }

    #[test]
    fn test_alternate_maps_url_and_content() {
        let record = json!({
            "title": "Trail Shoe",
            "url": "https://www.decathlon.com/shoe",
            "content": "Sturdy shoe.",
            "price": 59.0,
            "image": "https://img.example.com/shoe.jpg",
        });
        let r = normalize(&record, SourceKind::Alternate).unwrap();
        assert_eq!(r.retailer, "Decathlon.com");
        assert_eq!(r.short_description.as_deref(), Some("Sturdy shoe."));
    }

    fn constraints(max_price: Option<f64>, max_days: Option<u32>) -> SearchConstraints {
        SearchConstraints {
            max_price,
            max_delivery_days: max_days,
            ..Default::default()
        }
    }

    #[test]
    fn test_budget_filter() {
        let r = normalize(&shopping_record(json!(60.0)), SourceKind::Shopping).unwrap();
        assert!(!passes_constraints(&r, &constraints(Some(50.0), None)));
        assert!(passes_constraints(&r, &constraints(Some(80.0), None)));
        assert!(passes_constraints(&r, &constraints(None, None)));
    }

    #[test]
    fn test_delivery_filter_passes_unparseable() {
        let mut r = normalize(&shopping_record(json!(40.0)), SourceKind::Shopping).unwrap();
        r.delivery_estimate = "5 days".to_string();
        assert!(!passes_constraints(&r, &constraints(None, Some(3))));

        r.delivery_estimate = "fast shipping".to_string();
        assert!(passes_constraints(&r, &constraints(None, Some(3))));
    }

    #[test]
    fn test_filter_decision_is_idempotent() {
        let c = constraints(Some(50.0), Some(3));
        let raw = vec![
            shopping_record(json!(40.0)),
            shopping_record(json!(60.0)),
            json!({ "title": "", "price": 5.0 }),
        ];
        let (first_pass, malformed) = parse_and_filter(&raw, SourceKind::Shopping, &c);
        assert_eq!(first_pass.len(), 1);
        assert_eq!(malformed, 1);

        // Feeding the already-canonical survivors back through the
        // constraint filter changes nothing.
        let second_pass: Vec<_> = first_pass
            .iter()
            .filter(|r| passes_constraints(r, &c))
            .collect();
        assert_eq!(second_pass.len(), first_pass.len());
    }
}
