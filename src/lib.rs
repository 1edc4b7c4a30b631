//! # Outfitter
//!
//! A retailer-aware shopping search aggregation and ranking engine.
//!
//! Outfitter takes one shopping request (budget, deadline, size, style,
//! color, item list), aggregates product candidates from multiple
//! external retrieval APIs through an escalating search waterfall,
//! normalizes and deduplicates them, enriches missing variant/description
//! data from the product pages themselves, and ranks the survivors with
//! a deterministic weighted scoring model driven by the user's
//! preferences and style persona.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌────────────┐
//! │   Sources     │──▶│   Waterfall    │──▶│  Enrich +   │
//! │ Serper/Tavily │   │ stage 1→2→3→4 │   │ Link check  │
//! └──────────────┘   └───────────────┘   └─────┬──────┘
//!                                              │
//!                           ┌──────────────────┤
//!                           ▼                  ▼
//!                      ┌─────────┐       ┌──────────┐
//!                      │ Scoring  │       │   CLI     │
//!                      │ +Explain │       │  (fit)    │
//!                      └─────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`query`] | Budget/deadline parsing and query building |
//! | [`retailers`] | Retailer allowlist and trust ranking |
//! | [`source`] | Retrieval-source contract and injection |
//! | [`source_serper`] | Serper shopping/organic adapters |
//! | [`source_tavily`] | Tavily adapter |
//! | [`normalize`] | Raw record normalization and filtering |
//! | [`waterfall`] | Staged retrieval orchestration |
//! | [`enrich`] | Variant/description enrichment |
//! | [`extract`] | HTML variant and description extraction |
//! | [`linkcheck`] | Dead-link filtering |
//! | [`scoring`] | Weighted scoring and category ranking |
//! | [`explain`] | Explanation provider abstraction |
//! | [`persona`] | Persona collaborator seam |

pub mod config;
pub mod enrich;
pub mod explain;
pub mod extract;
pub mod linkcheck;
pub mod models;
pub mod normalize;
pub mod persona;
pub mod query;
pub mod retailers;
pub mod scoring;
pub mod source;
pub mod source_serper;
pub mod source_tavily;
pub mod waterfall;
