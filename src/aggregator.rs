//! Blending rules that turn estimator runs and exact metrics into final
//! dimension scores.
//!
//! Weights are fixed constants. Each `blend` keeps `1 - w` of the current
//! score and takes `w` from the other signal.

use serde::{Deserialize, Serialize};

use crate::classifier::SemanticEstimate;
use crate::dimensions::{
    clamp_unit, score_to_level, DimensionScores, PredictabilityLevel, HEURISTIC_DEFAULTS,
};
use crate::distribution::{build_mental_model, EmpiricalDistribution, UserExpectations};
use crate::estimator::{temporal_stability, Estimate};
use crate::metrics::{compute_c, compute_l, token_jaccard, TemporalMetrics};

/// Weight of classifier spread stability in the final T.
pub const STABILITY_WEIGHT: f64 = 0.3;
/// Weight of C_exact against the semantic C.
pub const EXACT_C_WEIGHT: f64 = 0.5;
/// Weight of the variation-alignment proxy against the semantic C.
pub const ALIGNMENT_WEIGHT: f64 = 0.3;
/// Weight of L_exact against the semantic L.
pub const EXACT_L_WEIGHT: f64 = 0.5;
/// Weight of token overlap against the semantic L.
pub const TOKEN_OVERLAP_WEIGHT: f64 = 0.4;

pub fn blend(current: f64, other: f64, weight: f64) -> f64 {
    clamp_unit((1.0 - weight) * current + weight * other)
}

fn blend_stability(t: f64, stability: Option<f64>) -> f64 {
    match stability {
        Some(s) => blend(t, s, STABILITY_WEIGHT),
        None => t,
    }
}

/// Aggregate of one or more classifier runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    pub dimensions: DimensionScores,
    pub level: PredictabilityLevel,
    pub temporal_stability: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Average per-sample runs. Each dimension is averaged over the runs that
/// reported it and falls back to the heuristic default otherwise.
pub fn average_runs(runs: &[SemanticEstimate]) -> Aggregated {
    let t = mean(runs.iter().filter_map(|r| r.t)).unwrap_or(HEURISTIC_DEFAULTS.t);
    let c = mean(runs.iter().filter_map(|r| r.c)).unwrap_or(HEURISTIC_DEFAULTS.c);
    let l = mean(runs.iter().filter_map(|r| r.l)).unwrap_or(HEURISTIC_DEFAULTS.l);

    let stability = temporal_stability(runs);
    let level = mean(runs.iter().filter_map(|r| r.level).map(|l| l.get() as f64))
        .and_then(PredictabilityLevel::from_reported)
        .unwrap_or(PredictabilityLevel::MOSTLY_PREDICTABLE);

    Aggregated {
        dimensions: DimensionScores::new(blend_stability(t, stability), c, l),
        level,
        temporal_stability: stability,
    }
}

/// Single-call aggregation. A missing level is derived from the scores.
pub fn single_run(estimate: &Estimate) -> Aggregated {
    let mut dimensions = estimate.primary.dimensions_or(HEURISTIC_DEFAULTS);
    dimensions.t = blend_stability(dimensions.t, estimate.temporal_stability);
    let level = estimate
        .primary
        .level
        .unwrap_or_else(|| score_to_level(dimensions.overall()));

    Aggregated {
        dimensions,
        level,
        temporal_stability: estimate.temporal_stability,
    }
}

/// Exact and proxy signals computed from samples and user expectations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExactScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_exact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_exact: Option<f64>,
    /// `1 - |expected variation - observed variation rate|`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<f64>,
    /// Token Jaccard between the expected output and the primary response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_overlap: Option<f64>,
}

/// Blend exact metrics into `dimensions`.
///
/// Does nothing without expectations or without samples. The alignment proxy
/// only runs when C_exact is `None` despite an expected variation, which
/// needs an empty P_t; blank samples also leave `temporal` empty, so that
/// branch is normally unreachable.
pub fn apply_expectations<S: AsRef<str>>(
    dimensions: DimensionScores,
    samples: &[S],
    expectations: Option<&UserExpectations>,
    response: &str,
    temporal: Option<&TemporalMetrics>,
) -> (DimensionScores, ExactScores) {
    let mut exact = ExactScores::default();
    let Some(expectations) = expectations.filter(|e| !e.is_empty()) else {
        return (dimensions, exact);
    };
    if samples.is_empty() {
        return (dimensions, exact);
    }

    let empirical = EmpiricalDistribution::from_samples(samples);
    let mental_model = build_mental_model(empirical.as_ref(), expectations);
    let mut out = dimensions;

    if let Some(expected_variation) = expectations.expected_variation {
        exact.c_exact = empirical.as_ref().and_then(|p| compute_c(p, &mental_model));
        match exact.c_exact {
            Some(c_exact) => out.c = blend(out.c, c_exact, EXACT_C_WEIGHT),
            None => {
                if let Some(temporal) = temporal {
                    let alignment =
                        clamp_unit(1.0 - (expected_variation - temporal.variation_rate).abs());
                    exact.alignment = Some(alignment);
                    out.c = blend(out.c, alignment, ALIGNMENT_WEIGHT);
                }
            }
        }
    }

    let expected_output = expectations
        .expected_output
        .as_deref()
        .filter(|s| !s.trim().is_empty());
    if let Some(expected_output) = expected_output {
        if !response.trim().is_empty() {
            exact.l_exact = empirical.as_ref().and_then(|p| compute_l(p, &mental_model));
        }
        match exact.l_exact {
            Some(l_exact) => out.l = blend(out.l, l_exact, EXACT_L_WEIGHT),
            None => {
                let overlap = token_jaccard(expected_output, response);
                exact.token_overlap = Some(overlap);
                out.l = blend(out.l, overlap, TOKEN_OVERLAP_WEIGHT);
            }
        }
    }

    (out, exact)
}
