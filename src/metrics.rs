//! Information metrics over output samples and distributions.
//!
//! All functions are pure. `None` means "not enough data" and must not be
//! confused with a score of 0.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::distribution::{count_outputs, EmpiricalDistribution, MentalModelDistribution};

/// Stand-in for Q(x) when Q has no (or zero) mass on an observed outcome.
pub const KL_FLOOR: f64 = 0.0001;

/// Sample-level temporal statistics used as the T proxy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalMetrics {
    /// Shannon entropy over valid samples, normalized by log2(distinct).
    pub entropy: f64,
    /// Distinct non-empty outputs divided by the raw sample count.
    pub variation_rate: f64,
}

/// Entropy and variation rate of raw samples.
///
/// The variation rate's denominator is the raw sample count, empties
/// included, while its numerator only counts distinct non-empty outputs.
pub fn temporal_metrics<S: AsRef<str>>(samples: &[S]) -> Option<TemporalMetrics> {
    let counts = count_outputs(samples);
    let valid: usize = counts.values().sum();
    if valid == 0 {
        return None;
    }

    let distinct = counts.len();
    let variation_rate = distinct as f64 / samples.len() as f64;

    let entropy = if distinct <= 1 {
        0.0
    } else {
        let h: f64 = counts
            .values()
            .map(|&count| {
                let p = count as f64 / valid as f64;
                -p * p.log2()
            })
            .sum();
        h / (distinct as f64).log2()
    };

    Some(TemporalMetrics {
        entropy,
        variation_rate,
    })
}

/// Exact confidence score.
///
/// Restricts P_t to the outcomes at or above the median mass θ (element
/// `n / 2` of the masses sorted descending) and returns the P-weighted mean
/// of Q over them. `None` iff P_t is empty.
pub fn compute_c(p: &EmpiricalDistribution, q: &MentalModelDistribution) -> Option<f64> {
    if p.is_empty() {
        return None;
    }

    let mut sorted: Vec<f64> = p.iter().map(|(_, mass)| mass).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let theta = sorted[sorted.len() / 2];

    let (weighted, denominator) = p
        .iter()
        .filter(|(_, mass)| *mass >= theta)
        .fold((0.0, 0.0), |(num, den), (x, mass)| {
            (num + mass * q.get(x).unwrap_or(0.0), den + mass)
        });

    if denominator == 0.0 {
        return Some(0.0);
    }
    Some(weighted / denominator)
}

/// Exact learning score: `exp(-D_KL(P || Q) / log2 |Ω|)`, clamped to `[0, 1]`.
///
/// A single observed outcome is fully learnable and scores 1 without
/// evaluating the divergence. `None` when no outcome carries mass.
pub fn compute_l(p: &EmpiricalDistribution, q: &MentalModelDistribution) -> Option<f64> {
    let omega = p.len();
    if omega == 0 {
        return None;
    }
    let h_max = (omega as f64).log2();
    if h_max == 0.0 {
        return Some(1.0);
    }
    let lambda = 1.0 / h_max;

    let terms: Vec<f64> = p
        .iter()
        .filter(|(_, mass)| *mass > 0.0)
        .map(|(x, mass)| {
            let qx = q.get(x).filter(|v| *v > 0.0).unwrap_or(KL_FLOOR);
            mass * (mass / qx).log2()
        })
        .collect();

    if terms.is_empty() {
        return None;
    }
    let d_kl: f64 = terms.iter().sum();
    Some((-lambda * d_kl).exp().clamp(0.0, 1.0))
}

/// Lower-cased whitespace-token Jaccard similarity; 0 if either side is blank.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> HashSet<String> {
        s.split_whitespace().map(|t| t.to_lowercase()).collect()
    };
    let (ta, tb) = (tokens(a), tokens(b));
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}
