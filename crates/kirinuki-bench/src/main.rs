//! kirinuki-bench: CLI tool for chroma key parameter experimentation.
//!
//! Runs the export pipeline over a clip built from a supplied image
//! (repeated N times) or a synthetic green screen test clip, printing
//! per-run throughput. Useful for:
//!
//! - Tuning HSV thresholds, feathering, and the correction strengths
//! - Measuring how parameter changes affect processing speed
//! - Eyeballing keyed output via `--preview`
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin kirinuki-bench -- [OPTIONS] [IMAGE_PATH]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr, clippy::cast_precision_loss)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use kirinuki_export::{
    Exporter, JobOutcome, MemorySink, NullProgress, OutputFrame, ProcessingOptions,
};
use kirinuki_pipeline::{ChromaKeySettings, MemorySource, RgbImage};

/// Chroma key parameter experimentation and throughput measurement.
///
/// Processes a clip built by repeating the given image (or a synthetic
/// green screen frame) and prints frames/seconds/fps per run.
#[derive(Parser)]
#[command(name = "kirinuki-bench", version)]
struct Cli {
    /// Path to a frame image (PNG, JPEG, BMP, WebP). Omit to use a
    /// synthetic green screen frame.
    image_path: Option<PathBuf>,

    /// Lower hue bound (0-179).
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().h_min)]
    h_min: u8,

    /// Upper hue bound (0-179).
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().h_max)]
    h_max: u8,

    /// Lower saturation bound.
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().s_min)]
    s_min: u8,

    /// Upper saturation bound.
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().s_max)]
    s_max: u8,

    /// Lower value bound.
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().v_min)]
    v_min: u8,

    /// Upper value bound.
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().v_max)]
    v_max: u8,

    /// Feathering radius in pixels.
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().feather)]
    feather: u8,

    /// Spill suppression strength (0.0-1.0).
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().spill_suppression)]
    spill: f32,

    /// Transparent-area defringe strength (0.0-1.0).
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().defringe_transparent)]
    defringe: f32,

    /// Mask erosion radius in pixels.
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().erode_size)]
    erode: u8,

    /// Mask dilation radius in pixels.
    #[arg(long, default_value_t = ChromaKeySettings::green_screen().dilate_size)]
    dilate: u8,

    /// Number of frames in the benchmark clip.
    #[arg(long, default_value_t = 30, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    frames: usize,

    /// Export stacked RGB/alpha frames instead of transparent RGBA.
    #[arg(long)]
    stacked: bool,

    /// Downscale output to this width (aspect-preserving, even-rounded).
    #[arg(long)]
    resize_width: Option<u32>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output per-run results as JSON instead of a human-readable
    /// report.
    #[arg(long)]
    json: bool,

    /// Full chroma key settings as a JSON string.
    ///
    /// When provided, all individual threshold flags are ignored. The
    /// JSON must be a valid `ChromaKeySettings` serialization.
    #[arg(long)]
    settings_json: Option<String>,

    /// Write the first keyed frame of the first run to this PNG path.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    verbose: bool,
}

/// Build [`ChromaKeySettings`] from CLI arguments.
///
/// `--settings-json` takes precedence over the individual flags.
fn settings_from_cli(cli: &Cli) -> Result<ChromaKeySettings, String> {
    let settings = if let Some(ref json) = cli.settings_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --settings-json: {e}"))?
    } else {
        ChromaKeySettings {
            h_min: cli.h_min,
            h_max: cli.h_max,
            s_min: cli.s_min,
            s_max: cli.s_max,
            v_min: cli.v_min,
            v_max: cli.v_max,
            feather: cli.feather,
            spill_suppression: cli.spill,
            defringe_transparent: cli.defringe,
            erode_size: cli.erode,
            dilate_size: cli.dilate,
        }
    };
    settings.validate().map_err(|e| e.to_string())?;
    Ok(settings)
}

/// Synthetic 640x360 green screen frame with a textured subject.
fn synthetic_frame() -> RgbImage {
    RgbImage::from_fn(640, 360, |x, y| {
        let in_subject = (240..400).contains(&x) && (100..260).contains(&y);
        if in_subject {
            #[allow(clippy::cast_possible_truncation)]
            let shade = 120 + ((x * 7 + y * 13) % 97) as u8;
            image::Rgb([shade, 40, 60])
        } else {
            image::Rgb([43, 200, 43])
        }
    })
}

/// Load the benchmark frame from disk or synthesize one.
fn load_frame(cli: &Cli) -> Result<RgbImage, String> {
    match cli.image_path {
        Some(ref path) => {
            let img = image::open(path)
                .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
            Ok(img.to_rgb8())
        }
        None => Ok(synthetic_frame()),
    }
}

/// Save the first output frame of a run as a PNG.
fn write_preview(path: &PathBuf, frames: &[OutputFrame]) {
    let Some(first) = frames.first() else {
        eprintln!("No frames produced; preview not written");
        return;
    };
    let result = match first {
        OutputFrame::Rgba(rgba) => rgba.save(path),
        OutputFrame::Stacked(rgb) => rgb.save(path),
    };
    match result {
        Ok(()) => eprintln!("Preview written to {}", path.display()),
        Err(e) => eprintln!("Error writing preview to {}: {e}", path.display()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let settings = match settings_from_cli(&cli) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let frame = match load_frame(&cli) {
        Ok(frame) => frame,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Clip: {} frames of {}x{}",
        cli.frames,
        frame.width(),
        frame.height(),
    );
    eprintln!("Settings: {settings:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let options = ProcessingOptions {
        crop: None,
        resize_width: cli.resize_width,
        stacked_mask: cli.stacked,
    };

    let mut fps_per_run = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        let mut source = MemorySource::new(vec![frame.clone(); cli.frames], 30.0);
        let mut sink = MemorySink::new();
        let mut exporter = Exporter::new();

        let outcome = exporter.run(
            &mut source,
            &mut sink,
            &settings,
            None,
            &options,
            &mut NullProgress,
        );
        match outcome {
            Ok(JobOutcome::Completed) => {}
            Ok(JobOutcome::Cancelled) => {
                eprintln!("Run {}: unexpectedly cancelled", run + 1);
                return ExitCode::FAILURE;
            }
            Err(e) => {
                eprintln!("Export error: {e}");
                return ExitCode::FAILURE;
            }
        }

        let stats = exporter.stats();
        let seconds = stats.duration().as_secs_f64();
        fps_per_run.push(stats.fps());

        if cli.json {
            let record = serde_json::json!({
                "run": run + 1,
                "frames": stats.processed_frames(),
                "seconds": seconds,
                "fps": stats.fps(),
            });
            println!("{record}");
        } else {
            println!(
                "Run {}/{}: {} frames in {seconds:.3}s ({:.1} fps)",
                run + 1,
                cli.runs,
                stats.processed_frames(),
                stats.fps(),
            );
        }

        if run == 0
            && let Some(ref preview_path) = cli.preview
        {
            write_preview(preview_path, sink.frames());
        }
    }

    if cli.runs > 1 && !cli.json {
        let mean = fps_per_run.iter().sum::<f64>() / fps_per_run.len() as f64;
        let min = fps_per_run.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max = fps_per_run.iter().copied().reduce(f64::max).unwrap_or(0.0);
        println!();
        println!("Throughput: min={min:.1}  mean={mean:.1}  max={max:.1} fps");
    }

    ExitCode::SUCCESS
}
