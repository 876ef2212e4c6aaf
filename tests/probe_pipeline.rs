use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use psf_probe::classifier::{ClassifyError, SemanticClassifier, SemanticEstimate};
use psf_probe::dimensions::{DimensionScores, PredictabilityLevel, HEURISTIC_DEFAULTS};
use psf_probe::distribution::{build_mental_model, EmpiricalDistribution, UserExpectations};
use psf_probe::gateway::ProviderError;
use psf_probe::metrics::{compute_c, compute_l};
use psf_probe::{
    OutputGenerator, ProbeConfig, ProbeEngine, ProbeError, ProbeRequest, ScoreSource, Stakes,
    SystemProfile,
};
use uuid::Uuid;

type Reply = Result<SemanticEstimate, ClassifyError>;

/// Replays scripted replies in order and records every response it saw.
struct ScriptedClassifier {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<String>>,
    probe_ids: Mutex<Vec<Uuid>>,
}

impl ScriptedClassifier {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            probe_ids: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SemanticClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        probe_id: Uuid,
        _description: &str,
        _prompt: &str,
        response: &str,
    ) -> Reply {
        self.probe_ids.lock().unwrap().push(probe_id);
        self.seen.lock().unwrap().push(response.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifyError::Parse("script exhausted".into())))
    }
}

struct FixedGenerator {
    outputs: Vec<String>,
    probe_ids: Mutex<Vec<Uuid>>,
}

impl FixedGenerator {
    fn new(outputs: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            probe_ids: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl OutputGenerator for FixedGenerator {
    async fn generate(
        &self,
        probe_id: Uuid,
        _prompt: &str,
        _description: &str,
        count: usize,
    ) -> Vec<String> {
        self.probe_ids.lock().unwrap().push(probe_id);
        self.outputs.iter().take(count).cloned().collect()
    }
}

fn est(t: f64, c: f64, l: f64, level: u8) -> Reply {
    Ok(SemanticEstimate {
        t: Some(t),
        c: Some(c),
        l: Some(l),
        level: PredictabilityLevel::new(level),
        ..Default::default()
    })
}

fn transport() -> Reply {
    Err(ClassifyError::Transport(ProviderError::provider(
        "openrouter",
        "connection reset",
        true,
    )))
}

fn unparseable() -> Reply {
    Err(ClassifyError::Parse("no JSON object".into()))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn engine(classifier: Arc<ScriptedClassifier>) -> ProbeEngine {
    ProbeEngine::new(classifier)
}

#[tokio::test]
async fn single_sample_uses_estimate_directly() {
    let classifier = ScriptedClassifier::new(vec![est(0.9, 0.8, 0.7, 2)]);
    let output = engine(classifier.clone())
        .run_probe(ProbeRequest::new("A unit converter", "1 mile in km?").samples(["1.609 km"]))
        .await
        .unwrap();

    assert_eq!(output.source, ScoreSource::Semantic);
    assert_eq!(output.dimensions, DimensionScores::new(0.9, 0.8, 0.7));
    assert!(close(output.overall, 0.8));
    assert_eq!(output.level.get(), 2);
    assert_eq!(output.samples_classified, 1);
    assert_eq!(output.temporal_stability, None);
    assert!(output.notes.is_empty());
    assert_eq!(classifier.seen(), vec!["1.609 km".to_string()]);

    let temporal = output.temporal.unwrap();
    assert_eq!(temporal.entropy, 0.0);
    assert_eq!(temporal.variation_rate, 1.0);
    assert_eq!(output.guidance[0].id, "deterministic-surfaces");
}

#[tokio::test]
async fn transport_failure_falls_back_to_heuristic_defaults() {
    let classifier = ScriptedClassifier::new(vec![transport()]);
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q").samples(["answer"]))
        .await
        .unwrap();

    assert_eq!(output.source, ScoreSource::Heuristic);
    assert_eq!(output.dimensions, HEURISTIC_DEFAULTS);
    assert!(close(output.overall, 0.7));
    assert_eq!(output.level.get(), 2);
    assert_eq!(output.samples_classified, 0);
    assert!(output
        .notes
        .iter()
        .any(|n| n.contains("unavailable") && n.contains("heuristic defaults")));
}

#[tokio::test]
async fn unparseable_single_reply_falls_back_with_note() {
    let classifier = ScriptedClassifier::new(vec![unparseable()]);
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q"))
        .await
        .unwrap();

    assert_eq!(output.source, ScoreSource::Heuristic);
    assert_eq!(output.dimensions, HEURISTIC_DEFAULTS);
    assert!(output.notes.iter().any(|n| n.contains("Could not parse")));
    assert!(output.temporal.is_none());
}

#[tokio::test]
async fn partial_estimate_fills_from_heuristic_and_derives_level() {
    let classifier = ScriptedClassifier::new(vec![Ok(SemanticEstimate {
        t: Some(0.2),
        c: Some(0.1),
        note: Some("outputs drift between runs".into()),
        ..Default::default()
    })]);
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q").samples(["x"]))
        .await
        .unwrap();

    assert_eq!(output.dimensions, DimensionScores::new(0.2, 0.1, HEURISTIC_DEFAULTS.l));
    // overall 0.3 maps to level 4
    assert_eq!(output.level.get(), 4);
    assert!(output.notes.contains(&"outputs drift between runs".to_string()));
}

#[tokio::test]
async fn multiple_samples_are_averaged_with_stability_blend() {
    let classifier = ScriptedClassifier::new(vec![
        est(0.9, 0.8, 0.6, 2),
        Ok(SemanticEstimate {
            t: Some(0.7),
            c: Some(0.6),
            level: PredictabilityLevel::new(3),
            ..Default::default()
        }),
        est(0.8, 0.7, 0.8, 2),
    ]);
    let output = engine(classifier.clone())
        .run_probe(ProbeRequest::new("bot", "q").samples(["a", "b", "c"]))
        .await
        .unwrap();

    assert_eq!(classifier.seen(), vec!["a", "b", "c"]);
    assert_eq!(output.samples_classified, 3);
    assert!(close(output.temporal_stability.unwrap(), 0.8));
    // avg T 0.8 blended 0.7/0.3 with stability 0.8
    assert!(close(output.dimensions.t, 0.8));
    assert!(close(output.dimensions.c, 0.7));
    assert!(close(output.dimensions.l, 0.7));
    assert_eq!(output.level.get(), 2);
    assert!(close(output.overall, (0.8 + 0.7 + 0.7) / 3.0));
}

#[tokio::test]
async fn classification_is_capped_but_temporal_metrics_use_every_sample() {
    let replies = (0..10).map(|_| est(0.5, 0.5, 0.5, 3)).collect();
    let classifier = ScriptedClassifier::new(replies);
    let samples: Vec<String> = (0..12).map(|i| format!("out-{}", i % 6)).collect();

    let output = engine(classifier.clone())
        .run_probe(ProbeRequest::new("bot", "q").samples(samples))
        .await
        .unwrap();

    assert_eq!(classifier.seen().len(), 10);
    assert_eq!(output.samples_classified, 10);
    assert!(close(output.temporal.unwrap().variation_rate, 0.5));
}

#[tokio::test]
async fn config_cap_limits_classified_samples() {
    let classifier = ScriptedClassifier::new(vec![est(0.5, 0.5, 0.5, 3), est(0.5, 0.5, 0.5, 3)]);
    let config = ProbeConfig {
        max_classified_samples: 2,
        ..ProbeConfig::default()
    };
    let output = engine(classifier.clone())
        .with_config(config)
        .run_probe(ProbeRequest::new("bot", "q").samples(["a", "b", "c", "d"]))
        .await
        .unwrap();

    assert_eq!(classifier.seen(), vec!["a", "b"]);
    assert_eq!(output.samples_classified, 2);
}

#[tokio::test]
async fn first_sample_transport_failure_aborts_batch() {
    let classifier = ScriptedClassifier::new(vec![transport(), est(0.9, 0.9, 0.9, 1)]);
    let output = engine(classifier.clone())
        .run_probe(ProbeRequest::new("bot", "q").samples(["a", "b"]))
        .await
        .unwrap();

    assert_eq!(classifier.seen(), vec!["a"]);
    assert_eq!(output.source, ScoreSource::Heuristic);
    assert_eq!(output.dimensions, HEURISTIC_DEFAULTS);
}

#[tokio::test]
async fn later_failures_are_skipped() {
    let classifier = ScriptedClassifier::new(vec![
        est(0.6, 0.6, 0.6, 3),
        transport(),
        unparseable(),
        est(0.6, 0.8, 0.4, 3),
    ]);
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q").samples(["a", "b", "c", "d"]))
        .await
        .unwrap();

    assert_eq!(output.source, ScoreSource::Semantic);
    assert_eq!(output.samples_classified, 2);
    assert!(close(output.temporal_stability.unwrap(), 1.0));
    assert!(close(output.dimensions.t, 0.7 * 0.6 + 0.3));
    assert!(close(output.dimensions.c, 0.7));
    assert!(close(output.dimensions.l, 0.5));
}

#[tokio::test]
async fn unparseable_first_sample_is_skipped_in_batch() {
    let classifier = ScriptedClassifier::new(vec![unparseable(), est(0.4, 0.4, 0.4, 4)]);
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q").samples(["a", "b"]))
        .await
        .unwrap();

    assert_eq!(output.source, ScoreSource::Semantic);
    assert_eq!(output.samples_classified, 1);
    assert_eq!(output.level.get(), 4);
}

#[tokio::test]
async fn all_batch_failures_retry_once_with_default_response() {
    let classifier = ScriptedClassifier::new(vec![
        unparseable(),
        unparseable(),
        transport(),
        est(0.9, 0.8, 0.7, 2),
    ]);
    let output = engine(classifier.clone())
        .run_probe(ProbeRequest::new("bot", "q").samples(["  ", "first real", "third"]))
        .await
        .unwrap();

    assert_eq!(
        classifier.seen(),
        vec!["  ", "first real", "third", "first real"]
    );
    assert_eq!(output.source, ScoreSource::Semantic);
    assert_eq!(output.dimensions, DimensionScores::new(0.9, 0.8, 0.7));
    assert!(output.notes[0].starts_with("All 3 sample classifications failed"));
}

#[tokio::test]
async fn failed_retry_falls_back_to_heuristic() {
    let classifier = ScriptedClassifier::new(vec![unparseable(), unparseable(), transport()]);
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q").samples(["a", "b"]))
        .await
        .unwrap();

    assert_eq!(output.source, ScoreSource::Heuristic);
    assert_eq!(output.notes.len(), 2);
    assert!(output.notes[1].contains("unavailable"));
}

#[tokio::test]
async fn expectations_blend_exact_scores() {
    let samples = ["Sunny", "Sunny", "Rain"];
    let expectations = UserExpectations {
        expected_output: Some("sunny".into()),
        expected_variation: Some(0.2),
    };
    let classifier = ScriptedClassifier::new(vec![
        est(0.5, 0.5, 0.5, 3),
        est(0.5, 0.5, 0.5, 3),
        est(0.5, 0.5, 0.5, 3),
    ]);

    let output = engine(classifier)
        .run_probe(
            ProbeRequest::new("bot", "weather?")
                .samples(samples)
                .expectations(expectations.clone()),
        )
        .await
        .unwrap();

    let p = EmpiricalDistribution::from_samples(&samples).unwrap();
    let q = build_mental_model(Some(&p), &expectations);
    let c_exact = compute_c(&p, &q).unwrap();
    let l_exact = compute_l(&p, &q).unwrap();

    assert!(close(output.exact.c_exact.unwrap(), c_exact));
    assert!(close(output.exact.l_exact.unwrap(), l_exact));
    assert!(close(output.dimensions.c, 0.5 * 0.5 + 0.5 * c_exact));
    assert!(close(output.dimensions.l, 0.5 * 0.5 + 0.5 * l_exact));
    assert_eq!(output.exact.alignment, None);
    assert_eq!(output.exact.token_overlap, None);
    assert_eq!(output.level.get(), 3);
}

#[tokio::test]
async fn blank_samples_skip_exact_c_and_use_token_overlap() {
    let expectations = UserExpectations {
        expected_output: Some("light rain".into()),
        expected_variation: Some(0.4),
    };
    let classifier = ScriptedClassifier::new(vec![est(0.5, 0.5, 0.5, 3)]);

    let output = engine(classifier)
        .run_probe(
            ProbeRequest::new("bot", "weather?")
                .samples([" "])
                .response("heavy rain")
                .expectations(expectations),
        )
        .await
        .unwrap();

    // No valid samples: C_exact is undefined and the alignment proxy has no
    // temporal metrics to work from.
    assert_eq!(output.exact.c_exact, None);
    assert_eq!(output.exact.alignment, None);
    assert!(output.temporal.is_none());
    assert!(close(output.dimensions.c, 0.5));

    let overlap = output.exact.token_overlap.unwrap();
    assert!(close(overlap, 1.0 / 3.0));
    assert!(close(output.dimensions.l, 0.6 * 0.5 + 0.4 * overlap));
}

#[tokio::test]
async fn generator_supplies_samples_when_none_given() {
    let classifier = ScriptedClassifier::new(vec![est(0.9, 0.9, 0.9, 1), est(0.9, 0.9, 0.9, 1)]);
    let generator = FixedGenerator::new(&["same", "same"]);
    let output = engine(classifier.clone())
        .with_generator(generator.clone())
        .run_probe(ProbeRequest::new("bot", "q"))
        .await
        .unwrap();

    assert_eq!(classifier.seen(), vec!["same", "same"]);
    assert_eq!(output.temporal.unwrap().variation_rate, 0.5);
    assert_eq!(output.level.get(), 1);

    assert_eq!(*generator.probe_ids.lock().unwrap(), vec![output.probe_id]);
    assert_eq!(
        *classifier.probe_ids.lock().unwrap(),
        vec![output.probe_id, output.probe_id]
    );
}

#[tokio::test]
async fn modifiers_and_guidance_follow_profile() {
    let classifier = ScriptedClassifier::new(vec![est(0.1, 0.1, 0.1, 5)]);
    let profile = SystemProfile {
        stakes: Stakes::High,
        ..Default::default()
    };
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q").samples(["x"]).profile(profile))
        .await
        .unwrap();

    assert!(close(output.modifiers.s, 0.85));
    let ids: Vec<&str> = output.guidance.iter().map(|g| g.id.as_str()).collect();
    assert!(ids.contains(&"advisory-only"));
    assert!(ids.contains(&"safety-posture"));
}

#[tokio::test]
async fn empty_prompt_is_rejected() {
    let classifier = ScriptedClassifier::new(vec![]);
    let err = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::InvalidRequest(_)));
}

#[tokio::test]
async fn output_serializes_with_dimension_keys() {
    let classifier = ScriptedClassifier::new(vec![est(0.9, 0.8, 0.7, 2)]);
    let output = engine(classifier)
        .run_probe(ProbeRequest::new("bot", "q").samples(["x"]))
        .await
        .unwrap();

    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["dimensions"]["T"], 0.9);
    assert_eq!(value["level"], 2);
    assert_eq!(value["source"], "semantic");
    assert_eq!(value["modifiers"]["Lp"], 0.8);
}
