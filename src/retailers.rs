//! Retailer trust ranking against the curated allowlist.
//!
//! The allowlist is loaded once from configuration and read-only for the
//! life of the process. Rank is derived on demand from the retailer
//! string — it is a sort key, never a stored field, and never a filter
//! (except the stage-1 primary-only mode in the waterfall).

use url::Url;

use crate::config::RetailersConfig;

/// The retailer allowlist with precomputed normalized forms.
#[derive(Debug, Clone)]
pub struct RetailerBook {
    names: Vec<String>,
    normalized: Vec<String>,
    keywords: Vec<String>,
    domains: Vec<String>,
}

impl RetailerBook {
    pub fn from_config(config: &RetailersConfig) -> Self {
        let normalized = config.allowlist.iter().map(|n| normalize(n)).collect();
        Self {
            names: config.allowlist.clone(),
            normalized,
            keywords: config.match_keywords.iter().map(|k| normalize(k)).collect(),
            domains: config.domains.clone(),
        }
    }

    /// Trust rank for a retailer name. Lower is better: allowlist entries
    /// rank by position (substring match in either direction), unknown
    /// retailers rank `len(allowlist)`.
    pub fn rank(&self, retailer: &str) -> usize {
        if retailer.is_empty() {
            return self.names.len();
        }
        let r = normalize(retailer);
        for (i, kn) in self.normalized.iter().enumerate() {
            if r.contains(kn.as_str()) || kn.contains(r.as_str()) {
                return i;
            }
        }
        self.names.len()
    }

    /// True if the retailer is on the trusted list (exact normalized
    /// match or known-keyword substring).
    pub fn is_primary(&self, retailer: &str) -> bool {
        if retailer.is_empty() {
            return false;
        }
        let r = normalize(retailer);
        if self.normalized.iter().any(|n| *n == r) {
            return true;
        }
        self.keywords.iter().any(|k| r.contains(k.as_str()))
    }

    /// Rank assigned to retailers absent from the allowlist.
    pub fn unknown_rank(&self) -> usize {
        self.names.len()
    }

    /// Domains for the stage-1 `site:` filter.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Allowlist names in priority order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Canonical matching form: lowercase with spaces and `&` removed, so
/// `"H&M"`, `"h & m"`, and `"hm"` all compare equal.
pub fn normalize(name: &str) -> String {
    name.to_lowercase().replace([' ', '&'], "")
}

/// Derive a display retailer name from a result link's domain
/// (`https://www.amazon.co.uk/...` → `"Amazon.com"`).
pub fn domain_retailer(link: &str) -> String {
    if link.is_empty() {
        return "Unknown".to_string();
    }
    let host = Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| {
            // Not an absolute URL; peel scheme/path by hand.
            link.trim_start_matches("https://")
                .trim_start_matches("http://")
                .split('/')
                .next()
                .unwrap_or("")
                .to_string()
        });
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let base = host.split('.').next().unwrap_or(host);
    if base.is_empty() {
        return "Unknown".to_string();
    }
    let mut chars = base.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => return "Unknown".to_string(),
    };
    format!("{capitalized}.com")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetailersConfig;

    fn book() -> RetailerBook {
        RetailerBook::from_config(&RetailersConfig::default())
    }

    #[test]
    fn test_exact_allowlist_rank() {
        let book = book();
        assert_eq!(book.rank("Zara"), 0);
        assert_eq!(book.rank("H&M"), 1);
    }

    #[test]
    fn test_normalized_match_either_direction() {
        let book = book();
        // "nike.com" normalizes to "nike.com" which contains "nike".
        assert_eq!(book.rank("Nike Store"), book.rank("Nike"));
        assert!(book.rank("h & m") < book.unknown_rank());
    }

    #[test]
    fn test_unknown_retailer_ranks_last() {
        let book = book();
        assert_eq!(book.rank("Bob's Discount Shed"), book.unknown_rank());
        assert_eq!(book.rank(""), book.unknown_rank());
    }

    #[test]
    fn test_is_primary_keyword_match() {
        let book = book();
        assert!(book.is_primary("Uniqlo"));
        assert!(book.is_primary("uniqlo.com"));
        assert!(book.is_primary("Amazon.com"));
        assert!(!book.is_primary("Totally Unknown Shop"));
        assert!(!book.is_primary(""));
    }

    #[test]
    fn test_rank_is_sort_key_not_filter() {
        let book = book();
        // Unknown retailers get a valid rank rather than being rejected.
        assert_eq!(book.rank("corner-store"), book.names().len());
    }

    #[test]
    fn test_domain_retailer() {
        assert_eq!(domain_retailer("https://www.amazon.co.uk/dp/B0"), "Amazon.com");
        assert_eq!(domain_retailer("http://zara.com/shirt"), "Zara.com");
        assert_eq!(domain_retailer("nike.com/air"), "Nike.com");
        assert_eq!(domain_retailer(""), "Unknown");
    }
}
