//! # Outfitter CLI (`fit`)
//!
//! The `fit` binary drives the search and ranking pipeline from the
//! command line.
//!
//! ## Usage
//!
//! ```bash
//! fit --config ./config/fit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fit search <items>` | Run the retrieval waterfall for one or more items |
//! | `fit rank <file>` | Rank previously saved search results |
//! | `fit retailers` | Show the retailer allowlist and trust ranks |
//!
//! ## Examples
//!
//! ```bash
//! # Search two items under a budget with a deadline
//! fit search shirt pants --budget '$120' --deadline '5 days' --style casual
//!
//! # Search and rank in one pass, JSON output
//! fit search shirt --budget '$50' --rank --preference Budget --json
//!
//! # Rank a saved result file against extracted requirements
//! fit rank results.json --budget '$200' --preference 'My Style' \
//!     --persona-style casual --persona-color blue
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use outfitter::config::{self, Config};
use outfitter::explain;
use outfitter::models::{
    CanonicalResult, ExtractedRequirements, ItemSpec, RankedOutput, SearchConstraints,
    SearchOutcome,
};
use outfitter::query;
use outfitter::retailers::RetailerBook;
use outfitter::scoring;
use outfitter::source::SourceSet;
use outfitter::waterfall;

/// Outfitter — a retailer-aware shopping search aggregation and ranking
/// engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to built-in defaults with API keys
/// read from the environment.
#[derive(Parser)]
#[command(
    name = "fit",
    about = "Outfitter — retailer-aware shopping search aggregation and ranking",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the retrieval waterfall for the given items.
    ///
    /// Aggregates candidates from the configured sources, filters them
    /// by budget and deadline, enriches variants, and prints the final
    /// candidate list with the per-item debug trace.
    Search {
        /// Item names to search for (e.g. `shirt pants shoes`).
        #[arg(required = true)]
        items: Vec<String>,

        /// Budget as free text (e.g. `"$50"`, `"under 100"`).
        #[arg(long, default_value = "")]
        budget: String,

        /// Deadline as free text (e.g. `"3 days"`, `"1 week"`).
        #[arg(long, default_value = "")]
        deadline: String,

        /// Requested size, forced onto every result's variant set.
        #[arg(long, default_value = "")]
        size: String,

        /// Style descriptor included in queries (e.g. `casual`).
        #[arg(long, default_value = "")]
        style: String,

        /// Target audience descriptor (e.g. `men`, `kids`).
        #[arg(long, default_value = "")]
        target: String,

        /// Requested color, forced onto every result's variant set.
        #[arg(long, default_value = "")]
        color: String,

        /// Also rank the results per category after searching.
        #[arg(long)]
        rank: bool,

        /// Preference keywords steering the scoring weights
        /// (repeatable; e.g. `--preference Budget`).
        #[arg(long = "preference")]
        preferences: Vec<String>,

        /// Persona style for ranking (repeatable).
        #[arg(long = "persona-style")]
        persona_styles: Vec<String>,

        /// Persona color for ranking (repeatable).
        #[arg(long = "persona-color")]
        persona_colors: Vec<String>,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Rank previously saved canonical results.
    ///
    /// Reads a JSON array of canonical results (as produced by
    /// `fit search --json`) and ranks it per category.
    Rank {
        /// Path to the JSON results file.
        file: PathBuf,

        #[arg(long, default_value = "")]
        budget: String,

        #[arg(long, default_value = "")]
        deadline: String,

        /// Preference keywords steering the scoring weights (repeatable).
        #[arg(long = "preference")]
        preferences: Vec<String>,

        /// Persona style (repeatable).
        #[arg(long = "persona-style")]
        persona_styles: Vec<String>,

        /// Persona color (repeatable).
        #[arg(long = "persona-color")]
        persona_colors: Vec<String>,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Show the retailer allowlist in trust-rank order.
    Retailers,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Search {
            items,
            budget,
            deadline,
            size,
            style,
            target,
            color,
            rank,
            preferences,
            persona_styles,
            persona_colors,
            json,
        } => {
            let constraints = SearchConstraints {
                max_price: query::parse_budget(&budget),
                max_delivery_days: query::parse_deadline_days(&deadline),
                size,
                style,
                target,
                color,
                items: items.into_iter().map(ItemSpec::named).collect(),
            };

            let sources = SourceSet::from_config(&cfg)?;
            let outcome = waterfall::search_products(&cfg, &sources, &constraints).await;

            if rank {
                let extract = ExtractedRequirements {
                    budget,
                    deadline,
                    constraints: preferences,
                    style: persona_styles,
                    colors: persona_colors,
                    ..Default::default()
                };
                let explainer = explain::create_explainer(&cfg.explain)?;
                let ranked =
                    scoring::rank_search_results(&extract, &outcome.results, explainer.as_ref())
                        .await;
                print_ranked(&ranked, json)?;
            } else {
                print_search(&outcome, json)?;
            }
        }

        Commands::Rank {
            file,
            budget,
            deadline,
            preferences,
            persona_styles,
            persona_colors,
            json,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read results file: {}", file.display()))?;
            let results: Vec<CanonicalResult> =
                serde_json::from_str(&content).with_context(|| "Failed to parse results file")?;

            let extract = ExtractedRequirements {
                budget,
                deadline,
                constraints: preferences,
                style: persona_styles,
                colors: persona_colors,
                ..Default::default()
            };
            let explainer = explain::create_explainer(&cfg.explain)?;
            let ranked =
                scoring::rank_search_results(&extract, &results, explainer.as_ref()).await;
            print_ranked(&ranked, json)?;
        }

        Commands::Retailers => {
            let book = RetailerBook::from_config(&cfg.retailers);
            for (rank, name) in book.names().iter().enumerate() {
                println!("{rank:3}  {name}");
            }
            println!("{:3}  (unknown retailers)", book.unknown_rank());
        }
    }

    Ok(())
}

fn print_search(outcome: &SearchOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    if outcome.results.is_empty() {
        println!("No results.");
    }
    for (i, result) in outcome.results.iter().enumerate() {
        println!(
            "{}. [{}] {} — ${:.2} ({})",
            i + 1,
            result.item,
            result.name,
            result.price,
            result.retailer
        );
        println!("    delivery: {}", result.delivery_estimate);
        if !result.variants.sizes.is_empty() {
            println!("    sizes: {}", result.variants.sizes.join(", "));
        }
        if !result.variants.colors.is_empty() {
            println!("    colors: {}", result.variants.colors.join(", "));
        }
        if let Some(ref link) = result.link {
            println!("    link: {link}");
        }
        if let Some(ref description) = result.short_description {
            println!("    about: {description}");
        }
        println!();
    }

    for (item, trace) in &outcome.trace.items {
        println!(
            "trace {item}: raw={} parsed={} selected={} after_links={}{}",
            trace.shopping_raw,
            trace.shopping_parsed,
            trace.selected_initial.max(trace.selected_expanded),
            trace.after_link_filter,
            if trace.organic_fallback_used {
                " (organic fallback)"
            } else {
                ""
            }
        );
    }
    if !outcome.trace.shopping_key_set {
        println!("note: no shopping API key configured; search returned nothing.");
    }
    Ok(())
}

fn print_ranked(ranked: &RankedOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(ranked)?);
        return Ok(());
    }

    println!(
        "weights: price {:.3} / delivery {:.3} / style {:.3}",
        ranked.weights.price, ranked.weights.delivery, ranked.weights.style
    );
    for (category, entries) in &ranked.results {
        println!("\n{category}:");
        for (i, entry) in entries.iter().enumerate() {
            println!(
                "  {}. [{:.3}] {} — ${:.2} ({}, {:.0} days)",
                i + 1,
                entry.score,
                entry.product.name,
                entry.product.price,
                entry.product.retailer,
                entry.product.delivery_days
            );
            println!("     {}", entry.local_explanation);
            if let Some(ref explanation) = entry.llm_explanation {
                println!("     why: {explanation}");
            }
        }
    }
    Ok(())
}
