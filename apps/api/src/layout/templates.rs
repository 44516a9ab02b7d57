//! Template registry — closed set of template identifiers and the rendering
//! capabilities each one needs from the presentation layer.
//!
//! Resolution is a pure table lookup. Unknown identifiers never fail: they
//! resolve to the ATS-safe `classic` descriptor and are logged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::editor::EditorError;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Font family each template is typeset in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontFamily {
    /// Clean humanist sans-serif.
    Inter,
    /// Classic old-style serif.
    EbGaramond,
    /// Geometric humanist sans-serif.
    Lato,
    /// Condensed display sans-serif.
    Oswald,
    /// Traditional TeX font.
    ComputerModern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateId {
    Hacker,
    Researcher,
    Operator,
    Founder,
    Classic,
}

impl TemplateId {
    pub const ALL: [TemplateId; 5] = [
        TemplateId::Hacker,
        TemplateId::Researcher,
        TemplateId::Operator,
        TemplateId::Founder,
        TemplateId::Classic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Hacker => "hacker",
            TemplateId::Researcher => "researcher",
            TemplateId::Operator => "operator",
            TemplateId::Founder => "founder",
            TemplateId::Classic => "classic",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| EditorError::UnknownTemplate(s.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Descriptors
// ────────────────────────────────────────────────────────────────────────────

/// Capability metadata for one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateDescriptor {
    pub id: TemplateId,
    pub font: FontFamily,
    /// The template paints full-bleed backgrounds (sidebar bands, header
    /// blocks). Default printer margins clip those differently on every page,
    /// so the presentation layer must emit explicit per-page margins.
    pub needs_explicit_print_margin: bool,
}

pub const DEFAULT_TEMPLATE: TemplateId = TemplateId::Classic;

static REGISTRY: [TemplateDescriptor; 5] = [
    TemplateDescriptor {
        id: TemplateId::Hacker,
        font: FontFamily::Inter,
        needs_explicit_print_margin: false,
    },
    TemplateDescriptor {
        id: TemplateId::Researcher,
        font: FontFamily::EbGaramond,
        needs_explicit_print_margin: false,
    },
    TemplateDescriptor {
        id: TemplateId::Operator,
        font: FontFamily::Lato,
        needs_explicit_print_margin: true,
    },
    TemplateDescriptor {
        id: TemplateId::Founder,
        font: FontFamily::Oswald,
        needs_explicit_print_margin: true,
    },
    TemplateDescriptor {
        id: TemplateId::Classic,
        font: FontFamily::ComputerModern,
        needs_explicit_print_margin: false,
    },
];

/// Every registered descriptor, in registration order.
pub fn registry() -> &'static [TemplateDescriptor] {
    &REGISTRY
}

pub fn descriptor(id: TemplateId) -> &'static TemplateDescriptor {
    // REGISTRY is declared in TemplateId::ALL order.
    &REGISTRY[id as usize]
}

/// Resolves a stored template identifier to its descriptor.
///
/// Unknown identifiers fall back to the `classic` descriptor.
pub fn resolve(template_id: &str) -> &'static TemplateDescriptor {
    match template_id.parse::<TemplateId>() {
        Ok(id) => descriptor(id),
        Err(e) => {
            warn!("{e}; falling back to '{DEFAULT_TEMPLATE}'");
            descriptor(DEFAULT_TEMPLATE)
        }
    }
}
