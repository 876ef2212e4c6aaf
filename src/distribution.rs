//! Empirical output distributions (P_t) and user mental-model
//! distributions (Q_t^u).
//!
//! Both are immutable once built: every transform produces a fresh map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Additive smoothing weight mixed into every mental model.
pub const SMOOTHING_EPSILON: f64 = 0.01;

/// Anchor concentration when only an expected output is given.
pub const DEFAULT_CONCENTRATION: f64 = 0.8;

pub const MIN_ANCHOR_MASS: f64 = 0.10;
pub const MAX_ANCHOR_MASS: f64 = 0.95;

/// What a user expects the system to produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExpectations {
    #[serde(default)]
    pub expected_output: Option<String>,
    /// Expected variation in `[0, 1]`; 0 = "always the same answer".
    #[serde(default)]
    pub expected_variation: Option<f64>,
}

impl UserExpectations {
    pub fn is_empty(&self) -> bool {
        self.expected_output.is_none() && self.expected_variation.is_none()
    }
}

/// P_t: mass(x) = count(x) / number of non-empty samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmpiricalDistribution {
    masses: BTreeMap<String, f64>,
    valid_count: usize,
}

impl EmpiricalDistribution {
    /// Build P_t from raw samples.
    ///
    /// Samples are trimmed and empties dropped; distinct outputs are compared
    /// by exact string equality. Returns `None` when no sample survives, which
    /// is distinct from a single-point distribution.
    pub fn from_samples<S: AsRef<str>>(samples: &[S]) -> Option<Self> {
        let counts = count_outputs(samples);
        let valid_count: usize = counts.values().sum();
        if valid_count == 0 {
            return None;
        }

        let masses = counts
            .into_iter()
            .map(|(output, count)| (output, count as f64 / valid_count as f64))
            .collect();

        Some(Self {
            masses,
            valid_count,
        })
    }

    /// Wrap precomputed masses. No normalization is applied, and the sample
    /// count is taken to be one per outcome.
    #[cfg(test)]
    pub(crate) fn from_masses(masses: BTreeMap<String, f64>) -> Self {
        Self {
            valid_count: masses.len(),
            masses,
        }
    }

    pub fn mass(&self, output: &str) -> f64 {
        self.masses.get(output).copied().unwrap_or(0.0)
    }

    pub fn masses(&self) -> &BTreeMap<String, f64> {
        &self.masses
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.masses.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Ω: the distinct observed outputs.
    pub fn outcomes(&self) -> impl Iterator<Item = &str> {
        self.masses.keys().map(String::as_str)
    }

    /// |Ω|.
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// Number of non-empty samples the masses were computed over.
    pub fn valid_count(&self) -> usize {
        self.valid_count
    }
}

/// Q_t^u after smoothing and renormalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentalModelDistribution {
    masses: BTreeMap<String, f64>,
}

impl MentalModelDistribution {
    pub fn get(&self, output: &str) -> Option<f64> {
        self.masses.get(output).copied()
    }

    pub fn masses(&self) -> &BTreeMap<String, f64> {
        &self.masses
    }

    pub fn len(&self) -> usize {
        self.masses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.masses.values().sum()
    }
}

/// Trimmed, non-empty output -> occurrence count.
pub(crate) fn count_outputs<S: AsRef<str>>(samples: &[S]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for sample in samples {
        let trimmed = sample.as_ref().trim();
        if !trimmed.is_empty() {
            *counts.entry(trimmed.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Build Q_t^u from a user's expectations over the outcomes of `empirical`.
///
/// With an expected output, that output (matched case-insensitively against
/// Ω, otherwise inserted as a new outcome) receives the anchor mass and the
/// remainder is spread uniformly over the other original outcomes. Without
/// one, Q is uniform over Ω. The result is always smoothed with a uniform
/// distribution at weight [`SMOOTHING_EPSILON`] and renormalized.
pub fn build_mental_model(
    empirical: Option<&EmpiricalDistribution>,
    expectations: &UserExpectations,
) -> MentalModelDistribution {
    let omega: Vec<&str> = empirical
        .map(|p| p.outcomes().collect())
        .unwrap_or_default();

    let expected_output = expectations
        .expected_output
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let raw = match expected_output {
        Some(anchor) => anchored(&omega, anchor, expectations.expected_variation),
        None => uniform(&omega),
    };

    MentalModelDistribution {
        masses: smooth(raw),
    }
}

fn uniform(omega: &[&str]) -> BTreeMap<String, f64> {
    let share = 1.0 / omega.len().max(1) as f64;
    omega.iter().map(|x| (x.to_string(), share)).collect()
}

fn anchored(
    omega: &[&str],
    anchor: &str,
    expected_variation: Option<f64>,
) -> BTreeMap<String, f64> {
    let concentration = expected_variation
        .map(|v| 1.0 - v)
        .unwrap_or(DEFAULT_CONCENTRATION);
    let p_anchor = if concentration.is_nan() {
        MIN_ANCHOR_MASS
    } else {
        concentration.clamp(MIN_ANCHOR_MASS, MAX_ANCHOR_MASS)
    };

    let anchor_lower = anchor.to_lowercase();
    let is_anchor = |x: &str| x.to_lowercase() == anchor_lower;
    let anchor_in_omega = omega.iter().any(|x| is_anchor(x));

    let others = if anchor_in_omega {
        omega.len() - 1
    } else {
        omega.len()
    };
    let rest = if others > 0 {
        (1.0 - p_anchor) / others as f64
    } else {
        0.0
    };

    let mut q: BTreeMap<String, f64> = omega
        .iter()
        .map(|x| {
            let mass = if is_anchor(x) { p_anchor } else { rest };
            (x.to_string(), mass)
        })
        .collect();

    if !anchor_in_omega {
        q.insert(anchor.to_string(), p_anchor);
    }
    q
}

fn smooth(q: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let n = q.len().max(1) as f64;
    let smoothed: BTreeMap<String, f64> = q
        .into_iter()
        .map(|(x, v)| (x, (1.0 - SMOOTHING_EPSILON) * v + SMOOTHING_EPSILON / n))
        .collect();

    let total: f64 = smoothed.values().sum();
    if total <= 0.0 {
        return smoothed;
    }
    smoothed.into_iter().map(|(x, v)| (x, v / total)).collect()
}
