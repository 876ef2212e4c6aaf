#![forbid(unsafe_code)]

//! # psf-probe
//!
//! Measures how predictable an AI system is for the people using it.
//!
//! A probe scores three dimensions in `[0, 1]`: Temporal (does the same input
//! give the same output), Confidence (can users tell when to trust it) and
//! Learning (how quickly a correct mental model forms). The scores map onto a
//! five-level predictability spectrum with design guidance attached.
//!
//! Scores come from two sources. An LLM classifier gives a semantic estimate
//! per output sample. Exact metrics come from the samples themselves: the
//! empirical distribution P_t, a mental-model distribution Q_t^u built from
//! what the user expects, and entropy and KL-divergence scores over the pair.
//! The aggregator blends both with fixed weights and falls back to heuristic
//! defaults when the classifier is unavailable.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod dimensions;
pub mod distribution;
pub mod estimator;
pub mod gateway;
pub mod generator;
pub mod guidance;
pub mod metrics;
pub mod probe;
pub mod profile;
pub mod trace;

pub use classifier::{ClassifyError, LlmClassifier, SemanticClassifier, SemanticEstimate};
pub use config::{ConfigError, ProbeConfig};
pub use dimensions::{score_to_level, DimensionScores, PredictabilityLevel, HEURISTIC_DEFAULTS};
pub use distribution::{build_mental_model, EmpiricalDistribution, UserExpectations};
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};
pub use generator::{LlmGenerator, OutputGenerator};
pub use guidance::{compute_guidance, compute_modifiers, GuidanceItem, ModifierScores};
pub use metrics::{compute_c, compute_l, temporal_metrics, token_jaccard, TemporalMetrics};
pub use probe::{ClassificationOutput, ProbeEngine, ProbeError, ProbeRequest, ScoreSource};
pub use profile::{Expertise, Stakes, SystemProfile};
pub use trace::{AttemptOutcome, ClassificationTrace, JsonlTraceSink, TraceError, TraceSink, TraceWorker};
