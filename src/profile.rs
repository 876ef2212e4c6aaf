//! Deployment profile of the system under evaluation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stakes {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expertise {
    Novice,
    #[default]
    Intermediate,
    Expert,
}

/// Stakes, user expertise and the UI affordances the deployment offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemProfile {
    pub stakes: Stakes,
    pub expertise: Expertise,
    pub confidence_badges: bool,
    pub interrupt_button: bool,
    pub safe_mode: bool,
    pub rationale_view: bool,
}
