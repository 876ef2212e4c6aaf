//! Modifier rule table and design-guidance selection.
//!
//! Both are pure functions of their inputs: no randomness, no I/O.

use serde::{Deserialize, Serialize};

use crate::dimensions::{clamp_unit, DimensionScores, PredictabilityLevel};
use crate::profile::{Expertise, Stakes, SystemProfile};

/// Auxiliary scores derived from the deployment profile, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModifierScores {
    /// Observability.
    #[serde(rename = "O")]
    pub o: f64,
    /// Interruptibility.
    #[serde(rename = "I")]
    pub i: f64,
    /// Explainability.
    #[serde(rename = "X")]
    pub x: f64,
    /// Learnability of the interface.
    #[serde(rename = "Lp")]
    pub lp: f64,
    /// Feedback.
    #[serde(rename = "F")]
    pub f: f64,
    /// Safety.
    #[serde(rename = "S")]
    pub s: f64,
    /// Accountability.
    #[serde(rename = "A")]
    pub a: f64,
    /// Delegation.
    #[serde(rename = "D")]
    pub d: f64,
}

pub const BASELINE_MODIFIERS: ModifierScores = ModifierScores {
    o: 0.6,
    i: 0.5,
    x: 0.5,
    lp: 0.8,
    f: 0.6,
    s: 0.6,
    a: 0.5,
    d: 0.4,
};

/// Thresholds below which guidance about safety / observability fires.
const SAFETY_FLOOR: f64 = 0.7;
const OBSERVABILITY_FLOOR: f64 = 0.7;

pub fn compute_modifiers(profile: &SystemProfile) -> ModifierScores {
    let mut m = BASELINE_MODIFIERS;

    match profile.stakes {
        Stakes::High => {
            m.s += 0.25;
            m.o += 0.10;
        }
        Stakes::Low => m.s -= 0.10,
        Stakes::Medium => {}
    }
    match profile.expertise {
        Expertise::Novice => {
            m.o += 0.10;
            m.f += 0.10;
        }
        Expertise::Expert => m.o -= 0.05,
        Expertise::Intermediate => {}
    }
    if profile.confidence_badges {
        m.o += 0.15;
    }
    if profile.interrupt_button {
        m.i += 0.20;
    }
    if profile.safe_mode {
        m.s += 0.20;
    }
    if profile.rationale_view {
        m.o += 0.10;
        m.a += 0.05;
    }

    ModifierScores {
        o: clamp_unit(m.o),
        i: clamp_unit(m.i),
        x: clamp_unit(m.x),
        lp: clamp_unit(m.lp),
        f: clamp_unit(m.f),
        s: clamp_unit(m.s),
        a: clamp_unit(m.a),
        d: clamp_unit(m.d),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceCategory {
    Interface,
    Explanation,
    Trust,
    Transition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceItem {
    pub id: String,
    pub level: u8,
    pub category: GuidanceCategory,
    pub title: String,
    pub summary: String,
}

struct CatalogEntry {
    id: &'static str,
    category: GuidanceCategory,
    title: &'static str,
    summary: &'static str,
}

impl CatalogEntry {
    fn emit(&self, level: PredictabilityLevel) -> GuidanceItem {
        GuidanceItem {
            id: self.id.to_string(),
            level: level.get(),
            category: self.category,
            title: self.title.to_string(),
            summary: self.summary.to_string(),
        }
    }
}

const DETERMINISTIC_SURFACES: CatalogEntry = CatalogEntry {
    id: "deterministic-surfaces",
    category: GuidanceCategory::Interface,
    title: "Keep surfaces simple and deterministic",
    summary: "Outputs are stable enough to present as direct answers. Favour plain controls and consistent layouts over hedging or variation cues.",
};

const EXPERTISE_GATING: CatalogEntry = CatalogEntry {
    id: "expertise-gating",
    category: GuidanceCategory::Interface,
    title: "Gate advanced behaviour behind expertise",
    summary: "Variability is bounded. Expose the predictable core by default and put open-ended behaviour behind explicit opt-in for experienced users.",
};

const SCAFFOLDS: CatalogEntry = CatalogEntry {
    id: "scaffolds-safe-defaults",
    category: GuidanceCategory::Trust,
    title: "Provide scaffolds and safe defaults",
    summary: "Outputs vary a lot. Offer templates, previews and reversible actions so users can recover when the system surprises them.",
};

const ADVISORY_ONLY: CatalogEntry = CatalogEntry {
    id: "advisory-only",
    category: GuidanceCategory::Trust,
    title: "Treat outputs as advisory only",
    summary: "Behaviour is open-ended. Never act on outputs automatically; frame them as suggestions that a person reviews.",
};

const SAFETY_POSTURE: CatalogEntry = CatalogEntry {
    id: "safety-posture",
    category: GuidanceCategory::Trust,
    title: "Strengthen safety posture",
    summary: "Add confirmation steps, safe-mode fallbacks and escalation paths before outputs reach consequential actions.",
};

const OBSERVABILITY: CatalogEntry = CatalogEntry {
    id: "observability",
    category: GuidanceCategory::Explanation,
    title: "Increase observability",
    summary: "Show confidence, sources and the reasoning behind outputs so users can judge when to rely on them.",
};

const NOVICE_TRANSITION: CatalogEntry = CatalogEntry {
    id: "novice-transition",
    category: GuidanceCategory::Transition,
    title: "Build a novice transition pathway",
    summary: "Start novices in a constrained mode with worked examples, and unlock variable behaviour as they demonstrate an accurate mental model.",
};

/// Select guidance for a probe result. Rules are independent; several items
/// can fire together. Dimension scores are accepted for callers that pass a
/// full result, but no current rule reads them.
pub fn compute_guidance(
    level: PredictabilityLevel,
    _dimensions: &DimensionScores,
    modifiers: &ModifierScores,
    profile: &SystemProfile,
) -> Vec<GuidanceItem> {
    let mut items = Vec::new();

    let level_entry = match level.get() {
        1 | 2 => &DETERMINISTIC_SURFACES,
        3 => &EXPERTISE_GATING,
        4 => &SCAFFOLDS,
        _ => &ADVISORY_ONLY,
    };
    items.push(level_entry.emit(level));

    if profile.stakes == Stakes::High || modifiers.s < SAFETY_FLOOR {
        items.push(SAFETY_POSTURE.emit(level));
    }
    if modifiers.o < OBSERVABILITY_FLOOR {
        items.push(OBSERVABILITY.emit(level));
    }
    if profile.expertise == Expertise::Novice && level.get() >= 3 {
        items.push(NOVICE_TRANSITION.emit(level));
    }

    items
}
