//! End-to-end probe: samples in, classification plus guidance out.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::{apply_expectations, average_runs, single_run, Aggregated, ExactScores};
use crate::classifier::{ClassifyError, Rationale, SemanticClassifier, SemanticEstimate};
use crate::config::{ConfigError, ProbeConfig};
use crate::dimensions::{score_to_level, DimensionScores, PredictabilityLevel, HEURISTIC_DEFAULTS};
use crate::distribution::{build_mental_model, EmpiricalDistribution, UserExpectations};
use crate::estimator::{Estimate, SemanticEstimator};
use crate::generator::OutputGenerator;
use crate::guidance::{compute_guidance, compute_modifiers, GuidanceItem, ModifierScores};
use crate::metrics::{compute_c, compute_l, temporal_metrics, TemporalMetrics};
use crate::profile::SystemProfile;
use crate::trace::TraceSink;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeRequest {
    pub system_description: String,
    pub prompt: String,
    pub profile: SystemProfile,
    pub samples: Vec<String>,
    /// Primary response. Defaults to the first non-blank sample.
    pub response: Option<String>,
    pub expectations: Option<UserExpectations>,
}

impl ProbeRequest {
    pub fn new(system_description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_description: system_description.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn samples<S: Into<String>>(mut self, samples: impl IntoIterator<Item = S>) -> Self {
        self.samples = samples.into_iter().map(Into::into).collect();
        self
    }

    pub fn response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn profile(mut self, profile: SystemProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn expectations(mut self, expectations: UserExpectations) -> Self {
        self.expectations = Some(expectations);
        self
    }
}

/// Explicit response, else the first non-blank sample, else "".
pub fn default_response(explicit: Option<&str>, samples: &[String]) -> String {
    if let Some(response) = explicit {
        return response.to_string();
    }
    samples
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Oracle-free view of a request: both distributions and the exact scores.
#[derive(Debug, Clone, Serialize)]
pub struct OfflineMetrics {
    pub valid_samples: usize,
    pub empirical: BTreeMap<String, f64>,
    pub mental_model: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalMetrics>,
    pub c_exact: Option<f64>,
    pub l_exact: Option<f64>,
}

/// Exact metrics for the request's samples. Without expectations the mental
/// model is uniform over the observed outputs.
pub fn offline_metrics(request: &ProbeRequest) -> OfflineMetrics {
    let empirical = EmpiricalDistribution::from_samples(&request.samples);
    let expectations = request.expectations.clone().unwrap_or_default();
    let mental_model = build_mental_model(empirical.as_ref(), &expectations);

    OfflineMetrics {
        valid_samples: empirical.as_ref().map_or(0, |p| p.valid_count()),
        empirical: empirical
            .as_ref()
            .map(|p| p.masses().clone())
            .unwrap_or_default(),
        mental_model: mental_model.masses().clone(),
        temporal: temporal_metrics(&request.samples),
        c_exact: empirical.as_ref().and_then(|p| compute_c(p, &mental_model)),
        l_exact: empirical.as_ref().and_then(|p| compute_l(p, &mental_model)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Semantic,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub probe_id: Uuid,
    pub dimensions: DimensionScores,
    pub overall: f64,
    pub level: PredictabilityLevel,
    pub source: ScoreSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<Rationale>,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_stability: Option<f64>,
    pub exact: ExactScores,
    pub samples_classified: usize,
    pub modifiers: ModifierScores,
    pub guidance: Vec<GuidanceItem>,
}

/// What the semantic phase produced before exact metrics are blended in.
struct SemanticPhase {
    aggregated: Option<Aggregated>,
    primary: Option<SemanticEstimate>,
    classified: usize,
    notes: Vec<String>,
}

impl SemanticPhase {
    fn fallback(note: String) -> Self {
        Self {
            aggregated: None,
            primary: None,
            classified: 0,
            notes: vec![note],
        }
    }

    fn from_single(result: Result<Option<Estimate>, ClassifyError>) -> Self {
        match result {
            Ok(Some(estimate)) => Self {
                aggregated: Some(single_run(&estimate)),
                classified: estimate.runs.len(),
                primary: Some(estimate.primary),
                notes: Vec::new(),
            },
            Ok(None) => Self::fallback(
                "Could not parse the semantic classifier output; using heuristic defaults."
                    .to_string(),
            ),
            Err(err) => Self::fallback(unavailable_note(&err)),
        }
    }
}

fn unavailable_note(err: &ClassifyError) -> String {
    format!("Semantic classifier unavailable ({err}); using heuristic defaults.")
}

pub struct ProbeEngine {
    classifier: Arc<dyn SemanticClassifier>,
    generator: Option<Arc<dyn OutputGenerator>>,
    config: ProbeConfig,
    trace: Option<Arc<dyn TraceSink>>,
}

impl ProbeEngine {
    pub fn new(classifier: Arc<dyn SemanticClassifier>) -> Self {
        Self {
            classifier,
            generator: None,
            config: ProbeConfig::default(),
            trace: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn OutputGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_config(mut self, config: ProbeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run one probe. Oracle failures never surface as `Err`; they fall back
    /// to heuristic scores with an explanatory note.
    pub async fn run_probe(
        &self,
        mut request: ProbeRequest,
    ) -> Result<ClassificationOutput, ProbeError> {
        if request.prompt.trim().is_empty() {
            return Err(ProbeError::InvalidRequest("prompt must be non-empty".to_string()));
        }
        self.config.validate()?;

        let probe_id = Uuid::new_v4();
        let mut notes = Vec::new();

        let mut samples = std::mem::take(&mut request.samples);
        if samples.is_empty() {
            if let Some(generator) = &self.generator {
                samples = generator
                    .generate(
                        probe_id,
                        &request.prompt,
                        &request.system_description,
                        self.config.default_sample_count,
                    )
                    .await;
                if samples.is_empty() {
                    notes.push("Sample generation returned no outputs.".to_string());
                }
            }
        }

        let response = default_response(request.response.as_deref(), &samples);

        let mut estimator = SemanticEstimator::new(self.classifier.as_ref(), probe_id);
        if let Some(trace) = &self.trace {
            estimator = estimator.with_trace(trace.as_ref());
        }

        let k = if samples.len() > 1 {
            self.config.max_classified_samples.min(samples.len())
        } else {
            1
        };

        let phase = if k > 1 {
            self.classify_samples(&estimator, &request, &samples[..k], &response)
                .await
        } else {
            SemanticPhase::from_single(
                estimator
                    .estimate(
                        &request.system_description,
                        &request.prompt,
                        std::slice::from_ref(&response),
                    )
                    .await,
            )
        };
        notes.extend(phase.notes);

        let (dimensions, level, temporal_stability, source) = match &phase.aggregated {
            Some(agg) => (
                agg.dimensions,
                Some(agg.level),
                agg.temporal_stability,
                ScoreSource::Semantic,
            ),
            None => {
                warn!(%probe_id, "falling back to heuristic dimension scores");
                (HEURISTIC_DEFAULTS, None, None, ScoreSource::Heuristic)
            }
        };

        let (rationale, estimator_note) = match phase.primary {
            Some(primary) => (primary.rationale, primary.note),
            None => (None, None),
        };
        notes.extend(estimator_note);

        let temporal = temporal_metrics(&samples);
        let (dimensions, exact) = apply_expectations(
            dimensions,
            &samples,
            request.expectations.as_ref(),
            &response,
            temporal.as_ref(),
        );

        let overall = dimensions.overall();
        let level = level.unwrap_or_else(|| score_to_level(overall));
        let modifiers = compute_modifiers(&request.profile);
        let guidance = compute_guidance(level, &dimensions, &modifiers, &request.profile);

        info!(
            %probe_id,
            level = level.get(),
            overall,
            source = ?source,
            samples = samples.len(),
            classified = phase.classified,
            "probe complete"
        );

        Ok(ClassificationOutput {
            probe_id,
            dimensions,
            overall,
            level,
            source,
            rationale,
            notes,
            temporal,
            temporal_stability,
            exact,
            samples_classified: phase.classified,
            modifiers,
            guidance,
        })
    }

    /// One sequential oracle call per sample. The first sample's transport
    /// failure is fatal for the batch; every other failure is skipped.
    async fn classify_samples(
        &self,
        estimator: &SemanticEstimator<'_>,
        request: &ProbeRequest,
        samples: &[String],
        response: &str,
    ) -> SemanticPhase {
        let mut runs: Vec<SemanticEstimate> = Vec::with_capacity(samples.len());

        for (index, sample) in samples.iter().enumerate() {
            let result = estimator
                .estimate(
                    &request.system_description,
                    &request.prompt,
                    std::slice::from_ref(sample),
                )
                .await;
            match result {
                Ok(Some(estimate)) => runs.push(estimate.primary),
                Ok(None) => {
                    warn!(sample = index, "sample classification unparseable; skipping");
                }
                Err(err) if index == 0 => {
                    return SemanticPhase::fallback(unavailable_note(&err));
                }
                Err(err) => {
                    warn!(sample = index, error = %err, "sample classification failed; skipping");
                }
            }
        }

        if runs.is_empty() {
            let mut phase = SemanticPhase::from_single(
                estimator
                    .estimate(
                        &request.system_description,
                        &request.prompt,
                        &[response.to_string()],
                    )
                    .await,
            );
            phase.notes.insert(
                0,
                format!(
                    "All {} sample classifications failed; retried with a single response.",
                    samples.len()
                ),
            );
            return phase;
        }

        SemanticPhase {
            aggregated: Some(average_runs(&runs)),
            classified: runs.len(),
            primary: runs.into_iter().next(),
            notes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_response_prefers_explicit() {
        let samples = vec!["  ".to_string(), " second ".to_string()];
        assert_eq!(default_response(Some("mine"), &samples), "mine");
        assert_eq!(default_response(None, &samples), "second");
        assert_eq!(default_response(None, &[]), "");
    }

    #[test]
    fn offline_metrics_without_expectations_use_uniform_model() {
        let request = ProbeRequest::new("bot", "q").samples(["a", "a", "b", " "]);
        let metrics = offline_metrics(&request);
        assert_eq!(metrics.valid_samples, 3);
        assert_eq!(metrics.empirical.len(), 2);
        assert!((metrics.mental_model["a"] - 0.5).abs() < 1e-9);
        assert!((metrics.temporal.unwrap().variation_rate - 0.5).abs() < 1e-9);
        assert!((metrics.c_exact.unwrap() - 0.5).abs() < 1e-9);
        assert!(metrics.l_exact.unwrap() < 1.0);
    }

    #[test]
    fn offline_metrics_blank_samples_have_no_scores() {
        let metrics = offline_metrics(&ProbeRequest::new("bot", "q").samples([""]));
        assert_eq!(metrics.valid_samples, 0);
        assert!(metrics.empirical.is_empty());
        assert_eq!(metrics.c_exact, None);
        assert_eq!(metrics.l_exact, None);
    }

    #[test]
    fn request_deserializes_camel_case() {
        let raw = r#"{
            "systemDescription": "A weather bot",
            "prompt": "Rain?",
            "samples": ["yes", "no"],
            "expectations": {"expectedVariation": 0.2}
        }"#;
        let request: ProbeRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.system_description, "A weather bot");
        assert_eq!(request.samples.len(), 2);
        assert_eq!(
            request.expectations.and_then(|e| e.expected_variation),
            Some(0.2)
        );
        assert_eq!(request.response, None);
    }
}
