use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub linkcheck: LinkCheckConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
    #[serde(default)]
    pub retailers: RetailersConfig,
}

/// Credentials and timeouts for the external retrieval APIs.
///
/// Keys may be set in the config file or via the `SERPER_API_KEY` /
/// `TAVILY_API_KEY` environment variables (environment wins). A missing
/// key makes the corresponding adapter unavailable — the pipeline treats
/// that as "return nothing", never as an error.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default)]
    pub serper_api_key: Option<String>,
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    /// Timeout applied to every search/shopping API call.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            serper_api_key: None,
            tavily_api_key: None,
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_timeout_secs() -> u64 {
    15
}

impl SourcesConfig {
    pub fn serper_key(&self) -> Option<String> {
        resolve_key("SERPER_API_KEY", self.serper_api_key.as_deref())
    }

    pub fn tavily_key(&self) -> Option<String> {
        resolve_key("TAVILY_API_KEY", self.tavily_api_key.as_deref())
    }
}

/// Environment variable wins over config; blank values count as unset.
fn resolve_key(env_name: &str, configured: Option<&str>) -> Option<String> {
    let from_env = std::env::var(env_name).ok();
    let value = from_env.as_deref().or(configured)?.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Waterfall stage targets and per-stage fetch sizes.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of results to select per requested item.
    #[serde(default = "default_target_count")]
    pub target_count: usize,
    /// Raw records requested from the scoped primary search (stage 1).
    #[serde(default = "default_shopping_fetch")]
    pub shopping_fetch: usize,
    /// Raw records requested from the expanded search (stage 2).
    #[serde(default = "default_expanded_fetch")]
    pub expanded_fetch: usize,
    /// Raw records requested from the alternate engine (stage 3).
    #[serde(default = "default_alternate_fetch")]
    pub alternate_fetch: usize,
    /// Raw records requested from the organic fallback (stage 4).
    #[serde(default = "default_organic_fetch")]
    pub organic_fetch: usize,
    /// Organic results requested when resolving a merchant link during
    /// enrichment.
    #[serde(default = "default_resolve_fetch")]
    pub resolve_fetch: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            shopping_fetch: default_shopping_fetch(),
            expanded_fetch: default_expanded_fetch(),
            alternate_fetch: default_alternate_fetch(),
            organic_fetch: default_organic_fetch(),
            resolve_fetch: default_resolve_fetch(),
        }
    }
}

fn default_target_count() -> usize {
    5
}
fn default_shopping_fetch() -> usize {
    20
}
fn default_expanded_fetch() -> usize {
    25
}
fn default_alternate_fetch() -> usize {
    10
}
fn default_organic_fetch() -> usize {
    10
}
fn default_resolve_fetch() -> usize {
    3
}

/// Variant/description enrichment limits.
#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    /// Maximum concurrent product-page fetches.
    #[serde(default = "default_enrich_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_enrich_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Maximum values kept per variant category.
    #[serde(default = "default_variant_cap")]
    pub variant_cap: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: default_enrich_concurrency(),
            fetch_timeout_secs: default_enrich_timeout_secs(),
            variant_cap: default_variant_cap(),
        }
    }
}

fn default_enrich_concurrency() -> usize {
    5
}
fn default_enrich_timeout_secs() -> u64 {
    12
}
fn default_variant_cap() -> usize {
    12
}

/// Link-liveness probe limits.
#[derive(Debug, Deserialize, Clone)]
pub struct LinkCheckConfig {
    /// Maximum concurrent HEAD/GET probes.
    #[serde(default = "default_linkcheck_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_linkcheck_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            concurrency: default_linkcheck_concurrency(),
            timeout_secs: default_linkcheck_timeout_secs(),
        }
    }
}

fn default_linkcheck_concurrency() -> usize {
    6
}
fn default_linkcheck_timeout_secs() -> u64 {
    10
}

/// Natural-language explanation collaborator.
///
/// `provider = "disabled"` (the default) keeps ranking fully local; the
/// deterministic explanation is used for every entry including top-1.
#[derive(Debug, Deserialize, Clone)]
pub struct ExplainConfig {
    #[serde(default = "default_explain_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Overridden by the `GROQ_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_explain_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_explain_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            provider: default_explain_provider(),
            model: None,
            api_key: None,
            timeout_secs: default_explain_timeout_secs(),
            max_tokens: default_explain_max_tokens(),
        }
    }
}

fn default_explain_provider() -> String {
    "disabled".to_string()
}
fn default_explain_timeout_secs() -> u64 {
    20
}
fn default_explain_max_tokens() -> u32 {
    150
}

impl ExplainConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn key(&self) -> Option<String> {
        resolve_key("GROQ_API_KEY", self.api_key.as_deref())
    }
}

/// Curated retailer allowlist used for trust ranking and the stage-1
/// site filter. Loaded once; read-only afterwards.
#[derive(Debug, Deserialize, Clone)]
pub struct RetailersConfig {
    /// Trusted retailer names in priority order (index = trust rank).
    #[serde(default = "default_retailer_allowlist")]
    pub allowlist: Vec<String>,
    /// Domains used to scope the stage-1 query (`site:` filters).
    #[serde(default = "default_retailer_domains")]
    pub domains: Vec<String>,
    /// Normalized keywords matched as substrings against retailer names
    /// (covers domain-derived variants like `uniqlo.com` → Uniqlo).
    #[serde(default = "default_retailer_keywords")]
    pub match_keywords: Vec<String>,
}

impl Default for RetailersConfig {
    fn default() -> Self {
        Self {
            allowlist: default_retailer_allowlist(),
            domains: default_retailer_domains(),
            match_keywords: default_retailer_keywords(),
        }
    }
}

fn default_retailer_allowlist() -> Vec<String> {
    [
        "Zara",
        "H&M",
        "Uniqlo",
        "Pull&Bear",
        "Bershka",
        "Stradivarius",
        "Mango",
        "COS",
        "Massimo Dutti",
        "Nike",
        "Adidas",
        "Puma",
        "New Balance",
        "Reebok",
        "Under Armour",
        "Decathlon",
        "Amazon",
        "ASOS",
        "Zalando",
        "Farfetch",
        "SSENSE",
        "eBay",
        "Uniqlo U",
        "Arket",
        "Banana Republic",
        "Gap",
        "Abercrombie & Fitch",
        "Foot Locker",
        "JD Sports",
        "DSW",
        "Aldo",
        "Clarks",
        "Dr. Martens",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_retailer_domains() -> Vec<String> {
    [
        "nike.com",
        "adidas.com",
        "zara.com",
        "hm.com",
        "target.com",
        "uniqlo.com",
        "decathlon.com",
        "amazon.com",
        "asos.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_retailer_keywords() -> Vec<String> {
    [
        "zara",
        "hm",
        "h&m",
        "uniqlo",
        "pull&bear",
        "pullandbear",
        "bershka",
        "stradivarius",
        "mango",
        "cos",
        "massimodutti",
        "massimo",
        "nike",
        "adidas",
        "puma",
        "newbalance",
        "reebok",
        "underarmour",
        "decathlon",
        "amazon",
        "asos",
        "zalando",
        "farfetch",
        "ssense",
        "ebay",
        "arket",
        "bananarepublic",
        "gap",
        "abercrombie",
        "fitch",
        "footlocker",
        "jdsports",
        "dsw",
        "aldo",
        "clarks",
        "drmartens",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.target_count == 0 {
        anyhow::bail!("retrieval.target_count must be >= 1");
    }
    if config.enrichment.concurrency == 0 {
        anyhow::bail!("enrichment.concurrency must be >= 1");
    }
    if config.linkcheck.concurrency == 0 {
        anyhow::bail!("linkcheck.concurrency must be >= 1");
    }
    if config.retailers.allowlist.is_empty() {
        anyhow::bail!("retailers.allowlist must not be empty");
    }

    match config.explain.provider.as_str() {
        "disabled" | "groq" => {}
        other => anyhow::bail!(
            "Unknown explanation provider: '{}'. Must be disabled or groq.",
            other
        ),
    }

    Ok(())
}
