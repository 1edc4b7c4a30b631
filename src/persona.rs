//! The persona collaborator seam.
//!
//! A persona is the user's inferred style/color taste, owned by an
//! external memory store that is out of scope here. The pipeline only
//! needs a value it can match products against; an empty persona is
//! valid and scores neutrally (see the scoring engine's defaults).

use serde::{Deserialize, Serialize};

/// Inferred style/color preferences. Both lists may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub preferred_styles: Vec<String>,
    #[serde(default)]
    pub preferred_colors: Vec<String>,
}

impl Persona {
    pub fn is_empty(&self) -> bool {
        self.preferred_styles.is_empty() && self.preferred_colors.is_empty()
    }
}

/// Supplier of the current persona. The production implementation wraps
/// the external memory store; tests and the CLI use [`FixedPersona`].
pub trait PersonaProvider: Send + Sync {
    fn persona(&self) -> Persona;
}

/// A persona fixed at construction time (e.g. assembled from the
/// requirement extractor's style/color fields).
#[derive(Debug, Clone, Default)]
pub struct FixedPersona(pub Persona);

impl PersonaProvider for FixedPersona {
    fn persona(&self) -> Persona {
        self.0.clone()
    }
}
