//! Semantic estimator adapter: the per-attempt failure policy around the
//! classifier oracle.
//!
//! Attempt 0 decides the outcome of the whole call. A transport failure there
//! is returned as `Err`, a parse failure there yields `Ok(None)`. Failures on
//! later attempts are logged and skipped. Attempts run sequentially, so which
//! attempt is "first" never depends on scheduling.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::classifier::{ClassifyError, SemanticClassifier, SemanticEstimate};
use crate::dimensions::clamp_unit;
use crate::trace::{AttemptOutcome, ClassificationTrace, TraceSink};

/// Result of one estimator call.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// First successfully parsed run.
    pub primary: SemanticEstimate,
    /// Every successfully parsed run, in attempt order (includes `primary`).
    pub runs: Vec<SemanticEstimate>,
    /// Spread-based stability, present when at least two runs reported T.
    pub temporal_stability: Option<f64>,
}

/// `1 - (max T - min T)` over runs that reported T; `None` below two.
pub fn temporal_stability(runs: &[SemanticEstimate]) -> Option<f64> {
    let ts: Vec<f64> = runs.iter().filter_map(|r| r.t).collect();
    if ts.len() < 2 {
        return None;
    }
    let max = ts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = ts.iter().copied().fold(f64::INFINITY, f64::min);
    Some(clamp_unit(1.0 - (max - min)))
}

pub struct SemanticEstimator<'a> {
    classifier: &'a dyn SemanticClassifier,
    probe_id: Uuid,
    trace: Option<&'a dyn TraceSink>,
    attempts: AtomicUsize,
}

impl<'a> SemanticEstimator<'a> {
    pub fn new(classifier: &'a dyn SemanticClassifier, probe_id: Uuid) -> Self {
        Self {
            classifier,
            probe_id,
            trace: None,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn with_trace(mut self, trace: &'a dyn TraceSink) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Oracle attempts made so far through this estimator.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Classify each response in turn. An empty `responses` slice is treated
    /// as a single empty response.
    pub async fn estimate(
        &self,
        description: &str,
        prompt: &str,
        responses: &[String],
    ) -> Result<Option<Estimate>, ClassifyError> {
        let empty = [String::new()];
        let responses = if responses.is_empty() { &empty[..] } else { responses };

        let mut runs: Vec<SemanticEstimate> = Vec::with_capacity(responses.len());

        for (index, response) in responses.iter().enumerate() {
            let result = self
                .classifier
                .classify(self.probe_id, description, prompt, response)
                .await;
            let trace_index = self.attempts.fetch_add(1, Ordering::Relaxed);

            match result {
                Ok(estimate) => {
                    self.record_ok(trace_index, response, &estimate);
                    runs.push(estimate);
                }
                Err(err) if index == 0 => {
                    self.record_err(trace_index, response, &err, false);
                    if err.is_transport() {
                        return Err(err);
                    }
                    debug!(probe_id = %self.probe_id, error = %err, "first classifier attempt unparseable");
                    return Ok(None);
                }
                Err(err) => {
                    warn!(
                        probe_id = %self.probe_id,
                        attempt = index,
                        kind = err.kind(),
                        error = %err,
                        "skipping failed classifier attempt"
                    );
                    self.record_err(trace_index, response, &err, true);
                }
            }
        }

        let temporal_stability = temporal_stability(&runs);
        Ok(runs.first().cloned().map(|primary| Estimate {
            primary,
            runs,
            temporal_stability,
        }))
    }

    fn record_ok(&self, attempt_index: usize, response: &str, estimate: &SemanticEstimate) {
        let Some(sink) = self.trace else { return };
        let mut row =
            ClassificationTrace::new(self.probe_id, attempt_index, response, AttemptOutcome::Ok);
        row.t = estimate.t;
        row.c = estimate.c;
        row.l = estimate.l;
        row.level = estimate.level.map(|l| l.get());
        self.emit(sink, row);
    }

    fn record_err(&self, attempt_index: usize, response: &str, err: &ClassifyError, skipped: bool) {
        let Some(sink) = self.trace else { return };
        let outcome = match (skipped, err) {
            (true, _) => AttemptOutcome::Skipped,
            (false, ClassifyError::Transport(_)) => AttemptOutcome::TransportError,
            (false, ClassifyError::Parse(_)) => AttemptOutcome::ParseError,
        };
        let mut row = ClassificationTrace::new(self.probe_id, attempt_index, response, outcome);
        row.error = Some(err.to_string());
        self.emit(sink, row);
    }

    fn emit(&self, sink: &dyn TraceSink, row: ClassificationTrace) {
        if let Err(err) = sink.record(row) {
            warn!(probe_id = %self.probe_id, error = %err, "failed to record classification trace");
        }
    }
}
