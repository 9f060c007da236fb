//! Keyboard Layout Detector
//!
//! Command-line front end: classifies keyboard photographs from their key
//! masks, runs batches, inspects individual regions and calibrates the
//! geometric thresholds from labeled images.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use keyboard_layout_detect::batch::{run_batch, BatchJob, BatchOptions, BatchStatus};
use keyboard_layout_detect::calibration::{calibrate, CalibrationSample};
use keyboard_layout_detect::config::{load_config, DetectorConfig};
use keyboard_layout_detect::export::{export_to_json, to_pretty_json};
use keyboard_layout_detect::input::{load_detections, load_gray, load_mask};
use keyboard_layout_detect::ocr::Family;
use keyboard_layout_detect::pipeline::{analyze, AnalysisInput};
use keyboard_layout_detect::region::{diagnose, extract_regions, RegionFeatures, ShapeHint};
use keyboard_layout_detect::{logging, paths};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

#[derive(Parser)]
#[command(
    name = "kbd-detect",
    version,
    about = "Detect ISO/ANSI, Mac/Windows and AZERTY/QWERTY/QWERTZ from keyboard key masks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Masks have dark keys on a light background
    #[arg(long, global = true)]
    invert: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one keyboard image
    Analyze(AnalyzeArgs),

    /// Classify many images in parallel
    Batch(BatchArgs),

    /// List every extracted region with its features and shape hints
    Inspect(InspectArgs),

    /// Suggest AZERTY thresholds from labeled images
    Calibrate(CalibrateArgs),

    /// Print the effective configuration, or validate a configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Binary key mask
    mask: PathBuf,

    /// Grayscale image of the same keyboard, for the OS key glyph
    #[arg(long)]
    gray: Option<PathBuf>,

    /// OCR detections as a JSON array of {text, confidence, x_center, y_center}
    #[arg(long)]
    ocr: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct BatchArgs {
    /// Mask files or directories of masks
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory holding grayscale images named like their masks
    #[arg(long)]
    gray_dir: Option<PathBuf>,

    /// Directory holding `<mask stem>.json` OCR detection files
    #[arg(long)]
    ocr_dir: Option<PathBuf>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Per-image time budget in milliseconds
    #[arg(long)]
    budget_ms: Option<u64>,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    mask: PathBuf,

    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct CalibrateArgs {
    /// JSON array of {"mask": path, "family": "AZERTY" | "QWERTY" | "QWERTZ"}
    labels: PathBuf,

    /// Write the calibration report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the current configuration with the suggested thresholds applied
    #[arg(long)]
    write_config: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Validate this file instead of printing the effective configuration
    #[arg(long)]
    check: Option<PathBuf>,
}

#[derive(Deserialize)]
struct LabeledImage {
    mask: PathBuf,
    family: Family,
}

#[derive(Serialize)]
struct InspectedRegion {
    index: usize,
    features: RegionFeatures,
    hints: Vec<ShapeHint>,
}

/// Writes `value` to `output`, or prints it when no path is given.
fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            export_to_json(value, path)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", to_pretty_json(value)?),
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Expands directories into their image files, sorted by name.
fn collect_masks(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut masks = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .context(format!("Failed to read directory: {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_image(path))
                .collect();
            found.sort();
            masks.extend(found);
        } else {
            masks.push(input.clone());
        }
    }
    Ok(masks)
}

fn run_analyze(args: AnalyzeArgs, config: &DetectorConfig, invert: bool) -> Result<()> {
    let mask = load_mask(&args.mask, invert)?;
    let gray = args.gray.as_deref().map(load_gray).transpose()?;
    let detections = args.ocr.as_deref().map(load_detections).transpose()?;

    let mut input = AnalysisInput::new(&mask);
    if let Some(gray) = &gray {
        input = input.with_gray(gray);
    }
    if let Some(detections) = &detections {
        input = input.with_ocr(detections);
    }

    let report = analyze(&input, config).context(format!("Analysis failed: {}", args.mask.display()))?;
    info!(
        "{}: {} / {} / {}{}",
        args.mask.display(),
        report.verdict.form_factor,
        report.verdict.platform,
        report.verdict.layout,
        report
            .verdict
            .variant
            .map(|v| format!(" ({})", v))
            .unwrap_or_default()
    );
    emit(&report, args.output.as_deref())
}

fn run_batch_command(args: BatchArgs, config: &DetectorConfig, invert: bool) -> Result<()> {
    let masks = collect_masks(&args.inputs)?;
    if masks.is_empty() {
        bail!("No mask images found");
    }

    let jobs: Vec<BatchJob> = masks
        .into_iter()
        .enumerate()
        .map(|(id, mask_path)| {
            let mut job = BatchJob::new(id, mask_path.clone());
            if let (Some(dir), Some(name)) = (&args.gray_dir, mask_path.file_name()) {
                let gray_path = dir.join(name);
                if gray_path.is_file() {
                    job = job.with_gray(gray_path);
                }
            }
            if let (Some(dir), Some(stem)) = (&args.ocr_dir, mask_path.file_stem()) {
                let ocr_path = dir.join(stem).with_extension("json");
                if ocr_path.is_file() {
                    job = job.with_ocr(ocr_path);
                }
            }
            job
        })
        .collect();

    let options = BatchOptions {
        workers: args.workers,
        per_image_budget: args.budget_ms.map(Duration::from_millis),
        invert_mask: invert,
    };
    let outcomes = run_batch(jobs, config, &options);

    let failed = outcomes
        .iter()
        .filter(|o| o.status != BatchStatus::Completed)
        .count();
    if failed > 0 {
        warn!("{} of {} images did not complete", failed, outcomes.len());
    }
    emit(&outcomes, args.output.as_deref())
}

fn run_inspect(args: InspectArgs, config: &DetectorConfig, invert: bool) -> Result<()> {
    let mask = load_mask(&args.mask, invert)?;
    let extraction = extract_regions(&mask, &config.extraction)?;
    info!(
        "{}: {} regions kept of {} components",
        args.mask.display(),
        extraction.regions.len(),
        extraction.stats.components
    );

    let regions: Vec<InspectedRegion> = extraction
        .regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let features = RegionFeatures::from_region(region);
            let hints = diagnose(&features, &config.classification);
            InspectedRegion { index, features, hints }
        })
        .collect();
    emit(&regions, args.output.as_deref())
}

fn run_calibrate(args: CalibrateArgs, config: &DetectorConfig, invert: bool) -> Result<()> {
    let contents = fs::read_to_string(&args.labels)
        .context(format!("Failed to read labels: {}", args.labels.display()))?;
    let labels: Vec<LabeledImage> = serde_json::from_str(&contents)
        .context(format!("Failed to parse labels: {}", args.labels.display()))?;

    let jobs: Vec<BatchJob> = labels
        .iter()
        .enumerate()
        .map(|(id, label)| BatchJob::new(id, label.mask.clone()))
        .collect();
    let options = BatchOptions {
        invert_mask: invert,
        ..Default::default()
    };
    let outcomes = run_batch(jobs, config, &options);

    let mut samples = Vec::new();
    for (label, outcome) in labels.iter().zip(&outcomes) {
        let name = label.mask.display().to_string();
        match outcome
            .report
            .as_ref()
            .and_then(|report| CalibrationSample::from_report(name.clone(), label.family, report))
        {
            Some(sample) => samples.push(sample),
            None => warn!("{}: no top-left letter measured, skipped", name),
        }
    }

    let report = calibrate(&samples)?;
    if let Some(path) = &args.write_config {
        let mut updated = config.clone();
        report.apply(&mut updated.classification);
        export_to_json(&updated, path)?;
        info!("Wrote calibrated config to {}", path.display());
    }
    emit(&report, args.output.as_deref())
}

fn run_config(args: ConfigArgs, config: &DetectorConfig) -> Result<()> {
    match args.check {
        Some(path) => {
            DetectorConfig::from_json_file(&path)?;
            println!("{} is valid", path.display());
            Ok(())
        }
        None => emit(config, None),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose)?;
    info!("kbd-detect {} (exe dir {})", env!("CARGO_PKG_VERSION"), paths::get_exe_dir().display());

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Analyze(args) => run_analyze(args, &config, cli.invert),
        Commands::Batch(args) => run_batch_command(args, &config, cli.invert),
        Commands::Inspect(args) => run_inspect(args, &config, cli.invert),
        Commands::Calibrate(args) => run_calibrate(args, &config, cli.invert),
        Commands::Config(args) => run_config(args, &config),
    }
}
