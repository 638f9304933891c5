//! `gcode-tp` command-line front end

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use crate::config::{Args, Config, FileArgs, Operation, PipelineConfig};
use crate::pipeline::{Bounds, CancelToken, Pipeline, StateSnapshot};

/// Everything went fine
const EXIT_OK: u8 = 0;
/// `--strict` and at least one warning
const EXIT_WARNINGS: u8 = 1;
/// Unreadable input or invalid configuration
const EXIT_FAILURE: u8 = 2;

/// Parse arguments, run the requested operation and map the result to an exit code
pub fn run() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .parse_default_env()
        .init();

    match execute(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn execute(args: &Args) -> Result<u8> {
    let config = Config::from_args(args).context("Failed to load configuration")?;
    if let Some(path) = &config.config_path {
        log::debug!("Using config file {}", path.display());
    }

    let (file_args, analyze) = match &args.operation {
        Operation::Analyze(file_args) => (file_args, true),
        Operation::DumpLayers(file_args) => (file_args, false),
    };

    let mut pipeline_config = config.pipeline;
    if analyze {
        pipeline_config.compute_duration = true;
    }
    let pipeline = interpret(&file_args.file, pipeline_config)?;

    if analyze {
        print_analysis(&pipeline, file_args.json)?;
    } else {
        print_layers(&pipeline, file_args.json)?;
    }

    Ok(exit_code(&pipeline, file_args))
}

fn exit_code(pipeline: &Pipeline, file_args: &FileArgs) -> u8 {
    if file_args.strict && pipeline.warning_total() > 0 {
        EXIT_WARNINGS
    } else {
        EXIT_OK
    }
}

fn interpret(path: &Path, config: PipelineConfig) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let outcome = pipeline
        .feed_all(BufReader::new(file), &CancelToken::new())
        .with_context(|| format!("Failed to read {}", path.display()))?;

    log::info!(
        "Interpreted {} lines from {} ({} warnings)",
        outcome.lines(),
        path.display(),
        pipeline.warning_total()
    );
    for warning in pipeline.warnings() {
        log::warn!("{}", warning);
    }

    Ok(pipeline)
}

#[derive(Debug, Serialize)]
struct Analysis {
    total_duration_minutes: f64,
    warnings: u64,
    #[serde(flatten)]
    snapshot: StateSnapshot,
}

fn format_bounds(bounds: Option<&Bounds>) -> String {
    match bounds {
        Some(bounds) => format!(
            "({:.3}, {:.3}, {:.3}) .. ({:.3}, {:.3}, {:.3})",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        ),
        None => "none".to_string(),
    }
}

fn print_analysis(pipeline: &Pipeline, json: bool) -> Result<()> {
    let snapshot = pipeline.snapshot();
    let analysis = Analysis {
        total_duration_minutes: snapshot.total_duration / 60.0,
        warnings: pipeline.warning_total(),
        snapshot,
    };

    if json {
        let text = serde_json::to_string_pretty(&analysis).context("Failed to serialize analysis")?;
        println!("{text}");
        return Ok(());
    }

    println!("total_duration_minutes: {:.2}", analysis.total_duration_minutes);
    println!("layers: {}", analysis.snapshot.layer_count);
    println!("filament_length: {:.3}", analysis.snapshot.filament_length);
    println!("bounds: {}", format_bounds(analysis.snapshot.bounds.as_ref()));
    println!("warnings: {}", analysis.warnings);
    Ok(())
}

#[derive(Debug, Serialize)]
struct LayerSummary {
    z: f64,
    segments: usize,
    extruding: usize,
    arcs: usize,
}

fn print_layers(pipeline: &Pipeline, json: bool) -> Result<()> {
    let index = pipeline.layer_index();
    let summaries: Vec<LayerSummary> = index
        .iter()
        .map(|(z, segments)| LayerSummary {
            z,
            segments: segments.len(),
            extruding: segments.iter().filter(|s| s.extruding).count(),
            arcs: index.arcs_at(z).len(),
        })
        .collect();

    if json {
        let text = serde_json::to_string_pretty(&summaries).context("Failed to serialize layers")?;
        println!("{text}");
        return Ok(());
    }

    for layer in &summaries {
        println!("{:.3}\t{}\t{}", layer.z, layer.segments, layer.extruding);
    }
    Ok(())
}
