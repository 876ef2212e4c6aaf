#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use psf_probe::dimensions::{DimensionScores, PredictabilityLevel, HEURISTIC_DEFAULTS};
use psf_probe::gateway::{ProviderGateway, TracingUsageSink};
use psf_probe::probe::{offline_metrics, ProbeEngine, ProbeRequest};
use psf_probe::{
    compute_guidance, compute_modifiers, JsonlTraceSink, LlmClassifier, LlmGenerator, ProbeConfig,
    SystemProfile, TraceSink,
};

#[derive(Parser)]
#[command(name = "psf", version, about = "Predictability spectrum probes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full probe against OpenRouter
    Probe {
        /// Path to probe request JSON
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Path to probe config JSON
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write one JSONL row per classifier attempt
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Exact metrics for a request's samples, without calling any model
    Metrics {
        #[arg(long)]
        request: PathBuf,
    },
    /// Modifier scores for a system profile
    Modifiers {
        #[arg(long)]
        profile: PathBuf,
    },
    /// Guidance items for a level and profile
    Guidance {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        level: u8,
        /// Comma-separated T,C,L scores
        #[arg(long, value_delimiter = ',')]
        dims: Option<Vec<f64>>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe {
            request,
            out,
            config,
            trace,
        } => {
            let req: ProbeRequest = read_json(&request)?;
            let config = match config {
                Some(path) => ProbeConfig::from_path(path)?,
                None => ProbeConfig::default(),
            };

            let gateway = Arc::new(ProviderGateway::from_env(Arc::new(TracingUsageSink))?);
            let classifier = LlmClassifier::from_config(gateway.clone(), &config);
            let generator = LlmGenerator::from_config(gateway, &config);

            let (trace_sink, trace_worker) = if let Some(path) = trace {
                let (sink, worker) = JsonlTraceSink::new(path)?;
                (Some(sink), Some(worker))
            } else {
                (None, None)
            };

            let mut engine = ProbeEngine::new(Arc::new(classifier))
                .with_generator(Arc::new(generator))
                .with_config(config);
            if let Some(sink) = &trace_sink {
                engine = engine.with_trace(Arc::new(sink.clone()) as Arc<dyn TraceSink>);
            }

            let output = engine.run_probe(req).await?;
            write_json(&out, &output)?;

            drop(engine);
            drop(trace_sink);
            if let Some(worker) = trace_worker {
                worker.join()?;
            }

            for note in &output.notes {
                eprintln!("[probe] {note}");
            }
            println!(
                "level {} (overall {:.3}, T {:.3} C {:.3} L {:.3})",
                output.level,
                output.overall,
                output.dimensions.t,
                output.dimensions.c,
                output.dimensions.l
            );
        }
        Commands::Metrics { request } => {
            let req: ProbeRequest = read_json(&request)?;
            print_json(&offline_metrics(&req))?;
        }
        Commands::Modifiers { profile } => {
            let profile: SystemProfile = read_json(&profile)?;
            print_json(&compute_modifiers(&profile))?;
        }
        Commands::Guidance {
            profile,
            level,
            dims,
        } => {
            let profile: SystemProfile = read_json(&profile)?;
            let level = PredictabilityLevel::new(level)
                .ok_or_else(|| format!("--level must be in 1..=5, got {level}"))?;
            let dimensions = match dims.as_deref() {
                None => HEURISTIC_DEFAULTS,
                Some([t, c, l]) => DimensionScores::new(*t, *c, *l),
                Some(other) => {
                    return Err(format!("--dims takes exactly 3 values, got {}", other.len()).into())
                }
            };
            let modifiers = compute_modifiers(&profile);
            print_json(&compute_guidance(level, &dimensions, &modifiers, &profile))?;
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    println!("{json}");
    Ok(())
}
