//! Explanation provider abstraction and implementations.
//!
//! Defines the [`Explainer`] trait and concrete implementations:
//! - **[`DisabledExplainer`]** — returns errors; used when no provider is
//!   configured. Ranking then uses the deterministic fallback text.
//! - **[`GroqExplainer`]** — calls Groq's OpenAI-compatible chat endpoint
//!   with a bounded-token, bounded-time request.
//!
//! The collaborator may fail or be unavailable at any time; callers go
//! through [`explain_top`], which never fails — any provider error
//! degrades to [`fallback_explanation`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ExplainConfig;
use crate::models::{ScoredProduct, Weights};

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";

/// Trait for natural-language explanation providers.
#[async_trait]
pub trait Explainer: Send + Sync {
    /// Provider identifier for logs (e.g. `"groq"`).
    fn provider_name(&self) -> &str;

    /// Produce a short explanation of why `best` ranks #1 in `category`.
    async fn generate(
        &self,
        best: &ScoredProduct,
        category: &str,
        weights: &Weights,
        preferences: &[String],
    ) -> Result<String>;
}

/// Create the appropriate [`Explainer`] based on configuration.
///
/// # Errors
///
/// Returns an error for unknown provider names or if the Groq provider
/// cannot be initialized (missing API key).
pub fn create_explainer(config: &ExplainConfig) -> Result<Box<dyn Explainer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledExplainer)),
        "groq" => Ok(Box::new(GroqExplainer::new(config)?)),
        other => bail!("Unknown explanation provider: {}", other),
    }
}

/// Explain the category winner, falling back to the deterministic local
/// text on any provider failure. Never errors, never blocks past the
/// provider's own timeout.
pub async fn explain_top(
    explainer: &dyn Explainer,
    best: &ScoredProduct,
    category: &str,
    weights: &Weights,
    preferences: &[String],
) -> String {
    match explainer.generate(best, category, weights, preferences).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback_explanation(best, category),
        Err(e) => {
            tracing::debug!(
                provider = explainer.provider_name(),
                category,
                error = %e,
                "explanation provider failed; using local fallback"
            );
            fallback_explanation(best, category)
        }
    }
}

// ============ Disabled provider ============

/// A no-op provider that always returns errors, routing every
/// explanation through the deterministic fallback.
pub struct DisabledExplainer;

#[async_trait]
impl Explainer for DisabledExplainer {
    fn provider_name(&self) -> &str {
        "disabled"
    }

    async fn generate(
        &self,
        _best: &ScoredProduct,
        _category: &str,
        _weights: &Weights,
        _preferences: &[String],
    ) -> Result<String> {
        bail!("explanation provider is disabled")
    }
}

// ============ Groq provider ============

/// Explanation provider using Groq's OpenAI-compatible chat API.
pub struct GroqExplainer {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl GroqExplainer {
    /// # Errors
    ///
    /// Returns an error if no API key is available from config or the
    /// `GROQ_API_KEY` environment variable.
    pub fn new(config: &ExplainConfig) -> Result<Self> {
        let api_key = config
            .key()
            .ok_or_else(|| anyhow::anyhow!("GROQ_API_KEY not set"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Explainer for GroqExplainer {
    fn provider_name(&self) -> &str {
        "groq"
    }

    async fn generate(
        &self,
        best: &ScoredProduct,
        category: &str,
        weights: &Weights,
        preferences: &[String],
    ) -> Result<String> {
        let prompt = build_prompt(best, category, weights, preferences);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.7,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(GROQ_CHAT_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Groq API error {}: {}", status, body_text);
        }

        let data: Value = response.json().await?;
        let content = data
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Groq response missing message content"))?;
        Ok(content.trim().to_string())
    }
}

/// The prompt sent to the provider: product facts, score breakdown with
/// weight percentages, and the user's stated preferences.
pub fn build_prompt(
    best: &ScoredProduct,
    category: &str,
    weights: &Weights,
    preferences: &[String],
) -> String {
    let p = &best.product;
    let d = &best.decomposition;
    let prefs = if preferences.is_empty() {
        "balanced".to_string()
    } else {
        preferences.join(", ")
    };
    format!(
        "You are an expert shopping assistant. Write a short, natural, and convincing \
         English explanation (3-4 sentences) of why this product is ranked #1 in the \
         \"{category}\" category.\n\n\
         Product: {name} from {retailer}\n\
         Price: ${price:.2}\n\
         Delivery: {days:.0} days\n\
         Style match: {style_match:.3}\n\n\
         Final score: {score:.3}\n\n\
         Score breakdown:\n\
         - Price contribution: {pc:.3} (weight {pw:.0}%)\n\
         - Delivery contribution: {dc:.3} (weight {dw:.0}%)\n\
         - Style contribution: {sc:.3} (weight {sw:.0}%)\n\n\
         User preferences: {prefs}\n\n\
         Be honest, focus on the strongest factor, use friendly tone. Return only the \
         explanation.",
        category = category,
        name = p.name,
        retailer = p.retailer,
        price = p.price,
        days = p.delivery_days,
        style_match = p.preference_match,
        score = best.score,
        pc = d.price_contrib,
        pw = weights.price * 100.0,
        dc = d.delivery_contrib,
        dw = weights.delivery * 100.0,
        sc = d.style_contrib,
        sw = weights.style * 100.0,
        prefs = prefs,
    )
}

/// Deterministic explanation built from the decomposition alone. Used
/// whenever the provider is unavailable or fails.
pub fn fallback_explanation(best: &ScoredProduct, category: &str) -> String {
    let p = &best.product;
    let d = &best.decomposition;
    let (strongest, _) = d.strongest();

    let mut sentences: Vec<String> = Vec::new();
    match strongest {
        "price" => {
            sentences.push(format!(
                "This {category} offers excellent value at ${:.2}.",
                p.price
            ));
            if d.price_contrib > 0.3 {
                sentences
                    .push("The competitive price significantly boosted its ranking.".to_string());
            }
        }
        "delivery" => {
            let days = p.delivery_days;
            let plural = if (days - 1.0).abs() < f64::EPSILON { "" } else { "s" };
            sentences.push(format!(
                "Fast delivery ({days:.0} day{plural}) makes this a top choice."
            ));
            if d.delivery_contrib > 0.2 {
                sentences.push("Quick shipping was a key factor in its high ranking.".to_string());
            }
        }
        _ => {
            sentences.push(format!(
                "This product closely matches your preferences ({:.0}% match).",
                p.preference_match * 100.0
            ));
            if d.style_contrib > 0.3 {
                sentences
                    .push("Strong style alignment contributed most to its #1 ranking.".to_string());
            }
        }
    }
    sentences.push(format!(
        "Final score: {:.3} (weighted across all criteria).",
        best.score
    ));
    sentences.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Decomposition, RankableProduct};

    fn best(price_contrib: f64, delivery_contrib: f64, style_contrib: f64) -> ScoredProduct {
        ScoredProduct {
            product: RankableProduct {
                name: "Linen Shirt".to_string(),
                price: 39.99,
                delivery_days: 2.0,
                retailer: "Zara".to_string(),
                style: "casual".to_string(),
                color: "blue".to_string(),
                preference_match: 0.8,
            },
            score: 0.712,
            decomposition: Decomposition {
                price_contrib,
                delivery_contrib,
                style_contrib,
            },
            local_explanation: String::new(),
            llm_explanation: None,
        }
    }

    #[test]
    fn test_fallback_names_strongest_factor() {
        let text = fallback_explanation(&best(0.4, 0.1, 0.1), "shirt");
        assert!(text.contains("excellent value"));
        assert!(text.contains("Final score: 0.712"));

        let text = fallback_explanation(&best(0.1, 0.4, 0.1), "shirt");
        assert!(text.contains("Fast delivery (2 days)"));

        let text = fallback_explanation(&best(0.1, 0.1, 0.4), "shirt");
        assert!(text.contains("80% match"));
    }

    #[test]
    fn test_prompt_contains_breakdown() {
        let weights = Weights {
            price: 0.5,
            delivery: 0.25,
            style: 0.25,
        };
        let prompt = build_prompt(&best(0.3, 0.2, 0.2), "shirt", &weights, &["Budget".to_string()]);
        assert!(prompt.contains("Linen Shirt"));
        assert!(prompt.contains("weight 50%"));
        assert!(prompt.contains("User preferences: Budget"));
    }

    #[tokio::test]
    async fn test_explain_top_falls_back_when_disabled() {
        let weights = Weights {
            price: 0.33,
            delivery: 0.33,
            style: 0.34,
        };
        let text = explain_top(&DisabledExplainer, &best(0.4, 0.1, 0.1), "shirt", &weights, &[])
            .await;
        assert!(text.contains("excellent value"));
    }

    #[test]
    fn test_create_explainer_dispatch() {
        let disabled = create_explainer(&ExplainConfig::default()).unwrap();
        assert_eq!(disabled.provider_name(), "disabled");
    }
}
