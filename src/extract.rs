//! Structured extraction from fetched product pages.
//!
//! Retailer product pages expose variant options in a handful of common
//! shapes: `<select>`/`<option>` controls, `data-size`/`data-color`
//! attributes, and `aria-label`ed swatch elements. This module parses
//! those patterns into a [`Variants`] value, and pulls the meta /
//! OpenGraph description as a fallback when no structured variants exist.

use scraper::{Html, Selector};

use crate::models::Variants;

/// Colors accepted from bare `aria-label` attributes (swatches without a
/// telling class name).
const COMMON_COLORS: [&str; 18] = [
    "black", "white", "gray", "grey", "blue", "navy", "red", "green", "olive", "brown", "beige",
    "tan", "cream", "yellow", "orange", "purple", "pink", "burgundy",
];

/// Placeholder option labels that are controls, not values.
const BLOCKED_VALUES: [&str; 8] = [
    "select",
    "select size",
    "select color",
    "select colour",
    "choose",
    "choose size",
    "choose color",
    "choose colour",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariantKind {
    Size,
    Color,
    Material,
}

/// Parse size/color/material option lists out of a product page.
/// Returns `None` when no variant signal was found at all.
pub fn variants_from_html(html: &str, cap: usize) -> Option<Variants> {
    let doc = Html::parse_document(html);
    let mut sizes = Vec::new();
    let mut colors = Vec::new();
    let mut materials = Vec::new();

    let select_sel = Selector::parse("select").unwrap();
    let option_sel = Selector::parse("option").unwrap();
    for select in doc.select(&select_sel) {
        let Some(kind) = detect_variant_kind(select.value().attrs()) else {
            continue;
        };
        for option in select.select(&option_sel) {
            let text = option.text().collect::<String>();
            let raw = option
                .value()
                .attr("value")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(text.trim());
            if let Some(value) = clean_variant_value(raw) {
                match kind {
                    VariantKind::Size => sizes.push(value),
                    VariantKind::Color => colors.push(value),
                    VariantKind::Material => materials.push(value),
                }
            }
        }
    }

    let any_sel = Selector::parse("*").unwrap();
    for element in doc.select(&any_sel) {
        for (key, value) in element.value().attrs() {
            let key = key.to_lowercase();
            if key.contains("data-size") {
                if let Some(v) = clean_variant_value(value) {
                    sizes.push(v);
                }
            }
            if key.contains("data-color") || key.contains("data-colour") {
                if let Some(v) = clean_variant_value(value) {
                    colors.push(v);
                }
            }
            if key.contains("data-material") {
                if let Some(v) = clean_variant_value(value) {
                    materials.push(v);
                }
            }
        }

        if let Some(aria_label) = element.value().attr("aria-label") {
            let class = element.value().attr("class").unwrap_or("").to_lowercase();
            if class.contains("color") || class.contains("colour") || class.contains("swatch") {
                if let Some(v) = clean_variant_value(aria_label) {
                    colors.push(v);
                }
            } else if COMMON_COLORS.contains(&aria_label.to_lowercase().as_str()) {
                colors.push(aria_label.trim().to_string());
            }
        }
    }

    let variants = Variants {
        sizes: dedupe_capped(sizes, cap),
        colors: dedupe_capped(colors, cap),
        materials: dedupe_capped(materials, cap),
    };
    if variants.is_empty() {
        None
    } else {
        Some(variants)
    }
}

/// Page description from `<meta name="description">` or the OpenGraph /
/// Twitter equivalents. The last matching tag wins.
pub fn meta_description(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let meta_sel = Selector::parse("meta").unwrap();
    let mut description = None;

    for meta in doc.select(&meta_sel) {
        let name = meta.value().attr("name").unwrap_or("").to_lowercase();
        let property = meta.value().attr("property").unwrap_or("").to_lowercase();
        if name == "description"
            || property == "og:description"
            || property == "twitter:description"
        {
            let content = meta.value().attr("content").unwrap_or("").trim();
            if !content.is_empty() {
                description = Some(content.to_string());
            }
        }
    }
    description
}

/// Classify a `<select>` by its identifying attributes.
fn detect_variant_kind<'a>(
    attrs: impl Iterator<Item = (&'a str, &'a str)>,
) -> Option<VariantKind> {
    let hay: String = attrs
        .filter(|(k, _)| matches!(*k, "name" | "id" | "aria-label" | "data-testid" | "class"))
        .map(|(_, v)| v.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if hay.contains("size") {
        Some(VariantKind::Size)
    } else if hay.contains("color") || hay.contains("colour") || hay.contains("swatch") {
        Some(VariantKind::Color)
    } else if hay.contains("material") || hay.contains("fabric") {
        Some(VariantKind::Material)
    } else {
        None
    }
}

fn clean_variant_value(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    let lower = v.to_lowercase();
    if BLOCKED_VALUES.contains(&lower.as_str()) {
        return None;
    }
    let v = if lower.starts_with("size ") {
        v[5..].trim()
    } else {
        v
    };
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

fn dedupe_capped(values: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for v in values {
        if !seen.insert(v.clone()) {
            continue;
        }
        out.push(v);
        if out.len() >= cap {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_options_by_kind() {
        let html = r#"
            <select name="product-size">
                <option value="">Select size</option>
                <option value="S">S</option>
                <option value="M">M</option>
            </select>
            <select id="colour-picker">
                <option>Choose colour</option>
                <option>Navy</option>
            </select>
        "#;
        let v = variants_from_html(html, 12).unwrap();
        assert_eq!(v.sizes, vec!["S", "M"]);
        assert_eq!(v.colors, vec!["Navy"]);
        assert!(v.materials.is_empty());
    }

    #[test]
    fn test_data_attributes_and_swatches() {
        let html = r#"
            <div data-size="42"></div>
            <button class="swatch" aria-label="Burnt Sienna"></button>
            <button aria-label="navy"></button>
            <span data-material="Cotton"></span>
        "#;
        let v = variants_from_html(html, 12).unwrap();
        assert_eq!(v.sizes, vec!["42"]);
        assert_eq!(v.colors, vec!["Burnt Sienna", "navy"]);
        assert_eq!(v.materials, vec!["Cotton"]);
    }

    #[test]
    fn test_bare_aria_label_needs_common_color() {
        let html = r#"<button aria-label="Add to cart"></button>"#;
        assert!(variants_from_html(html, 12).is_none());
    }

    #[test]
    fn test_size_prefix_stripped_and_dedup_capped() {
        let html = r#"
            <select name="size">
                <option value="Size M">Size M</option>
                <option value="M">M</option>
                <option value="L">L</option>
            </select>
        "#;
        let v = variants_from_html(html, 2).unwrap();
        // "Size M" and "M" collapse; cap of 2 keeps the list short.
        assert_eq!(v.sizes, vec!["M", "L"]);
    }

    #[test]
    fn test_no_signal_returns_none() {
        assert!(variants_from_html("<p>Plain page</p>", 12).is_none());
    }

    #[test]
    fn test_meta_description_sources() {
        let html = r#"
            <meta name="description" content="A plain description.">
            <meta property="og:description" content="An OpenGraph description.">
        "#;
        assert_eq!(
            meta_description(html).as_deref(),
            Some("An OpenGraph description.")
        );
        assert!(meta_description("<p>no meta</p>").is_none());
    }
}
