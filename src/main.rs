// src/main.rs
//! Batch runner: reads recordings as JSON, writes one JSON line per recording.
//!
//! Usage:
//!   spikeframe --recordings recordings.json --output reports.jsonl
//!   spikeframe --recordings recordings.json --paramset 2 --seed 7 --parallel
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use spikeframe::config::{DetectionConfig, FrameParamset, DEFAULT_SAMPLE_RATE_HZ};
use spikeframe::frames::{FramePipeline, ManualSource, Outcome};
use spikeframe::recorder::ReportWriter;
use spikeframe::{FrameDetector, Recording};

/// Activity-peak windowing for organoid spike streams
#[derive(Parser, Debug)]
#[command(name = "spikeframe", version)]
struct Args {
    /// JSON file holding an array of recordings
    #[arg(short, long)]
    recordings: PathBuf,

    /// Detection config JSON; missing fields take population-burst defaults
    #[arg(short, long, conflicts_with = "paramset")]
    config: Option<PathBuf>,

    /// Active-frame preset (1, 2 or 3)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=3))]
    paramset: Option<u32>,

    /// Sample rate used with --paramset
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE_HZ)]
    sample_rate: f64,

    /// Overrides the fallback seed from the config
    #[arg(long)]
    seed: Option<u64>,

    /// JSON-lines output; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run recordings in parallel instead of one at a time
    #[arg(long)]
    parallel: bool,
}

fn load_config(args: &Args) -> Result<DetectionConfig> {
    let config = match (&args.config, args.paramset) {
        (Some(path), _) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        (None, Some(idx)) => {
            let paramset = FrameParamset::preset(idx)
                .ok_or_else(|| anyhow!("unknown paramset {idx}"))?;
            DetectionConfig::active_frames(paramset, args.sample_rate)
        }
        (None, None) => DetectionConfig::population_bursts(args.sample_rate),
    };
    Ok(match args.seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    })
}

fn load_recordings(path: &Path) -> Result<Vec<Recording>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read recordings {}", path.display()))?;
    let recordings: Vec<Recording> = serde_json::from_str(&text)
        .with_context(|| format!("invalid recordings {}", path.display()))?;
    if recordings.is_empty() {
        bail!("{} contains no recordings", path.display());
    }
    Ok(recordings)
}

fn write_outcome<W: Write>(writer: &mut ReportWriter<W>, outcome: &Outcome) -> Result<()> {
    match outcome {
        Ok(report) => writer.write_report(report),
        Err(err) => {
            if err.is_retryable() {
                log::warn!("{err} (retryable)");
            } else {
                log::error!("{err}");
            }
            writer.write_failure(err)
        }
    }
}

fn run<W: Write>(args: &Args, mut writer: ReportWriter<W>) -> Result<(usize, usize)> {
    let config = load_config(args)?;
    let recordings = load_recordings(&args.recordings)?;
    log::info!(
        "{} recordings, bin width {} ticks, {} windows wanted",
        recordings.len(),
        config.bin_width,
        config.num_wanted
    );
    let detector = FrameDetector::new(config).context("invalid detection config")?;
    let mut pipeline = FramePipeline::new(ManualSource::new(recordings), detector);

    if args.parallel {
        for outcome in pipeline.drain()? {
            write_outcome(&mut writer, &outcome)?;
        }
    } else {
        while let Some(outcome) = pipeline.pump_once()? {
            write_outcome(&mut writer, &outcome)?;
        }
    }
    let counts = writer.counts();
    writer.finish()?;
    Ok(counts)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let (reports, failures) = match &args.output {
        Some(path) => run(&args, ReportWriter::create(path)?)?,
        None => run(&args, ReportWriter::new(io::stdout().lock()))?,
    };
    log::info!("done: {reports} reports, {failures} failures");
    if failures > 0 && reports == 0 {
        bail!("every recording failed");
    }
    Ok(())
}
