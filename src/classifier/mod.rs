//! Semantic classifier seam.
//!
//! The classifier is an external oracle: given a system description, a
//! prompt and one response it returns approximate T/C/L scores, a level and
//! rationale. Any of those may be missing. Failures come back as
//! [`ClassifyError`], never as panics.

pub mod llm;
pub mod parse;
pub mod prompts;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dimensions::{DimensionScores, PredictabilityLevel};
use crate::gateway::ProviderError;

pub use llm::LlmClassifier;
pub use parse::{extract_json, parse_estimate, strip_code_fences};

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// Oracle unreachable or errored.
    #[error("classifier transport error: {0}")]
    Transport(#[from] ProviderError),
    /// Oracle answered, but not with a usable JSON object.
    #[error("classifier parse error: {0}")]
    Parse(String),
}

impl ClassifyError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::Parse(_) => "parse_error",
        }
    }
}

/// Free-text justification returned by the oracle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<String>,
    #[serde(rename = "T", default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub l: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cues: Vec<String>,
}

/// One classifier run. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticEstimate {
    #[serde(rename = "T", default, skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    pub c: Option<f64>,
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub l: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<PredictabilityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<Rationale>,
}

impl SemanticEstimate {
    /// Fill missing dimensions from `fallback`.
    pub fn dimensions_or(&self, fallback: DimensionScores) -> DimensionScores {
        DimensionScores::new(
            self.t.unwrap_or(fallback.t),
            self.c.unwrap_or(fallback.c),
            self.l.unwrap_or(fallback.l),
        )
    }
}

#[async_trait::async_trait]
pub trait SemanticClassifier: Send + Sync {
    /// `probe_id` attributes any provider calls to the probe being run.
    async fn classify(
        &self,
        probe_id: Uuid,
        description: &str,
        prompt: &str,
        response: &str,
    ) -> Result<SemanticEstimate, ClassifyError>;
}
