use std::process::Command;

use tempfile::tempdir;

#[derive(Debug, serde::Deserialize)]
struct Modifiers {
    #[serde(rename = "O")]
    o: f64,
    #[serde(rename = "S")]
    s: f64,
    #[serde(rename = "D")]
    d: f64,
}

#[derive(Debug, serde::Deserialize)]
struct Guidance {
    id: String,
    level: u8,
}

#[derive(Debug, serde::Deserialize)]
struct Metrics {
    valid_samples: usize,
    c_exact: Option<f64>,
    l_exact: Option<f64>,
}

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn run_cli(args: &[&str], file_arg: &str, path: &std::path::Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_psf"))
        .args(args)
        .arg(file_arg)
        .arg(path)
        .output()
        .unwrap()
}

#[test]
fn cli_modifiers_applies_rule_table() {
    let dir = tempdir().unwrap();
    let profile = dir.path().join("profile.json");
    std::fs::write(
        &profile,
        r#"{"stakes": "high", "expertise": "novice", "confidenceBadges": true}"#,
    )
    .unwrap();

    let output = run_cli(&["modifiers"], "--profile", &profile);
    assert!(output.status.success());

    let modifiers: Modifiers = serde_json::from_slice(&output.stdout).unwrap();
    assert!(approx_eq(modifiers.o, 0.95, 1e-9));
    assert!(approx_eq(modifiers.s, 0.85, 1e-9));
    assert!(approx_eq(modifiers.d, 0.4, 1e-9));
}

#[test]
fn cli_guidance_lists_level_items() {
    let dir = tempdir().unwrap();
    let profile = dir.path().join("profile.json");
    std::fs::write(&profile, r#"{"expertise": "novice"}"#).unwrap();

    let output = run_cli(&["guidance", "--level", "5", "--dims", "0.2,0.3,0.1"], "--profile", &profile);
    assert!(output.status.success());

    let items: Vec<Guidance> = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = items.iter().map(|g| g.id.as_str()).collect();
    assert!(ids.contains(&"advisory-only"));
    assert!(ids.contains(&"novice-transition"));
    assert!(items.iter().all(|g| g.level == 5));
}

#[test]
fn cli_guidance_rejects_out_of_range_level() {
    let dir = tempdir().unwrap();
    let profile = dir.path().join("profile.json");
    std::fs::write(&profile, "{}").unwrap();

    let output = run_cli(&["guidance", "--level", "6"], "--profile", &profile);
    assert!(!output.status.success());
}

#[test]
fn cli_metrics_runs_offline() {
    let dir = tempdir().unwrap();
    let request = dir.path().join("request.json");
    std::fs::write(
        &request,
        r#"{"prompt": "Rain?", "samples": ["yes", "yes", "no", ""], "expectations": {"expectedOutput": "yes", "expectedVariation": 0.1}}"#,
    )
    .unwrap();

    let output = run_cli(&["metrics"], "--request", &request);
    assert!(output.status.success());

    let metrics: Metrics = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(metrics.valid_samples, 3);
    let c = metrics.c_exact.unwrap();
    let l = metrics.l_exact.unwrap();
    assert!((0.0..=1.0).contains(&c));
    assert!((0.0..=1.0).contains(&l));
}
