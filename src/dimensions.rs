//! Dimension scores and the five-level predictability spectrum.

use serde::{Deserialize, Serialize};

/// Baseline used when the semantic estimator is unavailable.
pub const HEURISTIC_DEFAULTS: DimensionScores = DimensionScores {
    t: 0.8,
    c: 0.7,
    l: 0.6,
};

/// Temporal, Confidence and Learning predictability, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    /// Temporal stability (1 = always the same output).
    #[serde(rename = "T")]
    pub t: f64,
    /// Confidence/calibration predictability.
    #[serde(rename = "C")]
    pub c: f64,
    /// Learning predictability: how easily a correct mental model forms.
    #[serde(rename = "L")]
    pub l: f64,
}

impl DimensionScores {
    /// Builds scores, clamping each component into `[0, 1]`.
    pub fn new(t: f64, c: f64, l: f64) -> Self {
        Self {
            t: clamp_unit(t),
            c: clamp_unit(c),
            l: clamp_unit(l),
        }
    }

    /// Unweighted mean of T, C and L.
    pub fn overall(&self) -> f64 {
        (self.t + self.c + self.l) / 3.0
    }
}

impl Default for DimensionScores {
    fn default() -> Self {
        HEURISTIC_DEFAULTS
    }
}

/// Clamp into `[0, 1]`; NaN maps to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// PSF level: 1 = fully predictable ... 5 = open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PredictabilityLevel(u8);

impl PredictabilityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;
    /// Level 2, used when runs agree on scores but report no level.
    pub const MOSTLY_PREDICTABLE: Self = Self(2);

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&level)
            .then_some(Self(level))
    }

    /// Round and clamp an oracle-reported level into `1..=5`.
    pub fn from_reported(level: f64) -> Option<Self> {
        if !level.is_finite() {
            return None;
        }
        let rounded = level.round().clamp(Self::MIN as f64, Self::MAX as f64);
        Some(Self(rounded as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PredictabilityLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("level must be in 1..=5, got {value}"))
    }
}

impl From<PredictabilityLevel> for u8 {
    fn from(level: PredictabilityLevel) -> Self {
        level.0
    }
}

impl std::fmt::Display for PredictabilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Map an overall score to a level.
///
/// Monotone: higher scores never produce a higher (less predictable) level.
pub fn score_to_level(overall: f64) -> PredictabilityLevel {
    let level = if overall >= 0.90 {
        1
    } else if overall >= 0.65 {
        2
    } else if overall >= 0.35 {
        3
    } else if overall >= 0.15 {
        4
    } else {
        5
    };
    PredictabilityLevel(level)
}
