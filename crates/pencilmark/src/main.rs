//! pencilmark: render an image file as a pencil sketch.
//!
//! Reads a PNG, JPEG, BMP or WebP image, runs the sketch pipeline with
//! the given parameters, and writes the 3-channel result. Useful for:
//!
//! - Rendering sketches in batch scripts
//! - Comparing smoothing and edge methods on the same photo
//! - Measuring per-stage durations with `--diagnostics`
//! - Rendering one of the fixed styles with `--style`
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin pencilmark -- [OPTIONS] <INPUT> -o <OUTPUT>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `pencilmark=warn`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use pencilmark_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use pencilmark_pipeline::{
    ArtStyle, DynamicImage, EdgeMethod, PipelineError, SketchParams, SmoothingMethod, StyleParams,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Render a photograph as a pencil sketch.
///
/// Converts the image to grayscale, smooths it, extracts an edge mask,
/// and dodge-blends the two into a sketch on white paper.
#[derive(Parser)]
#[command(name = "pencilmark", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Where to write the sketch. The format follows the extension.
    ///
    /// Defaults to `<INPUT stem>-sketch.png` (or `<INPUT stem>-<style>.png`
    /// with `--style`) next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Noise reduction applied before edge extraction.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_SMOOTHING)]
    smoothing: Smoothing,

    /// Edge detector that builds the pencil strokes.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_EDGE)]
    edge: Edge,

    /// Smoothing neighborhood diameter (bilateral) or kernel size (Gaussian).
    #[arg(long, default_value_t = SketchParams::DEFAULT_KERNEL_RADIUS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..=u64::from(SketchParams::MAX_KERNEL_RADIUS)))]
    kernel_radius: u32,

    /// Bilateral filter sigma (intensity and spatial).
    #[arg(long, default_value_t = SketchParams::DEFAULT_COLOR_SIGMA, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    color_sigma: u32,

    /// Canny low threshold (0-255).
    #[arg(long, default_value_t = SketchParams::DEFAULT_CANNY_LOW)]
    canny_low: u8,

    /// Canny high threshold (0-255).
    #[arg(long, default_value_t = SketchParams::DEFAULT_CANNY_HIGH)]
    canny_high: u8,

    /// Full parameter record as a JSON string.
    ///
    /// When provided, all other parameter flags are ignored. Missing
    /// fields take their defaults; unknown fields are rejected.
    #[arg(long)]
    config_json: Option<String>,

    /// Print a per-stage diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Number of runs for averaging stage durations.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Render a fixed style instead of the configurable sketch.
    ///
    /// The smoothing, edge and Canny flags do not apply to styles.
    #[arg(long, value_enum, conflicts_with_all = ["config_json", "diagnostics", "json", "runs"])]
    style: Option<Style>,

    /// Cartoon outline threshold (10-100).
    #[arg(long, default_value_t = StyleParams::DEFAULT_EDGE_STRENGTH, value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(u64::from(StyleParams::MIN_EDGE_STRENGTH)..=u64::from(StyleParams::MAX_EDGE_STRENGTH)))]
    edge_strength: u8,

    /// Edge-style outline threshold (0-255).
    #[arg(long, default_value_t = StyleParams::DEFAULT_GRAY_LEVEL)]
    gray_level: u8,

    /// Render styles at full size instead of fitting within 800x600.
    #[arg(long)]
    full_size: bool,
}

/// Smoothing method selection.
#[derive(Clone, Copy, ValueEnum)]
enum Smoothing {
    /// No smoothing.
    None,
    /// Edge-preserving bilateral filter.
    Bilateral,
    /// Gaussian blur.
    Gaussian,
}

/// Edge detector selection.
#[derive(Clone, Copy, ValueEnum)]
enum Edge {
    /// Dual-threshold hysteresis detector.
    Canny,
    /// Thresholded gradient magnitude.
    Sobel,
    /// Thresholded second derivative.
    Laplacian,
}

/// Fixed style selection.
#[derive(Clone, Copy, ValueEnum)]
enum Style {
    /// Smoothed colors with black outlines.
    Cartoon,
    /// Grayscale pencil drawing.
    Pencil,
    /// Smoothed, posterized colors.
    Watercolor,
    /// Black outlines on white.
    Edge,
}

impl Style {
    const fn to_pipeline(self) -> ArtStyle {
        match self {
            Self::Cartoon => ArtStyle::Cartoon,
            Self::Pencil => ArtStyle::Pencil,
            Self::Watercolor => ArtStyle::Watercolor,
            Self::Edge => ArtStyle::Edge,
        }
    }
}

/// Maps a [`SmoothingMethod`] to the local CLI [`Smoothing`] enum.
const fn smoothing_from_pipeline(m: SmoothingMethod) -> Smoothing {
    match m {
        SmoothingMethod::None => Smoothing::None,
        SmoothingMethod::Bilateral => Smoothing::Bilateral,
        SmoothingMethod::Gaussian => Smoothing::Gaussian,
    }
}

/// Maps an [`EdgeMethod`] to the local CLI [`Edge`] enum.
const fn edge_from_pipeline(m: EdgeMethod) -> Edge {
    match m {
        EdgeMethod::Canny => Edge::Canny,
        EdgeMethod::Sobel => Edge::Sobel,
        EdgeMethod::Laplacian => Edge::Laplacian,
    }
}

/// CLI defaults derived from [`SketchParams`] so the two cannot
/// silently diverge.
const CLI_DEFAULT_SMOOTHING: Smoothing =
    smoothing_from_pipeline(SketchParams::DEFAULT_SMOOTHING_METHOD);
const CLI_DEFAULT_EDGE: Edge = edge_from_pipeline(SketchParams::DEFAULT_EDGE_METHOD);

/// Build [`SketchParams`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn params_from_cli(cli: &Cli) -> Result<SketchParams, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SketchParams {
        smoothing_method: match cli.smoothing {
            Smoothing::None => SmoothingMethod::None,
            Smoothing::Bilateral => SmoothingMethod::Bilateral,
            Smoothing::Gaussian => SmoothingMethod::Gaussian,
        },
        edge_method: match cli.edge {
            Edge::Canny => EdgeMethod::Canny,
            Edge::Sobel => EdgeMethod::Sobel,
            Edge::Laplacian => EdgeMethod::Laplacian,
        },
        kernel_radius: cli.kernel_radius,
        color_sigma: cli.color_sigma,
        canny_low: cli.canny_low,
        canny_high: cli.canny_high,
    })
}

/// Build [`StyleParams`] from CLI arguments.
fn style_params_from_cli(cli: &Cli, style: Style) -> StyleParams {
    StyleParams {
        style: style.to_pipeline(),
        edge_strength: cli.edge_strength,
        gray_level: cli.gray_level,
        fit_within: if cli.full_size {
            None
        } else {
            StyleParams::DEFAULT_FIT_WITHIN
        },
    }
}

/// `<dir>/<stem>-<suffix>.png` for an input path.
fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}-{suffix}.png"))
}

/// The output path, rejected up front if its extension names no
/// supported image format.
fn output_path_from_cli(cli: &Cli) -> Result<PathBuf, String> {
    let path = cli.output.clone().unwrap_or_else(|| {
        let suffix = cli.style.map_or_else(
            || "sketch".to_string(),
            |s| s.to_pipeline().to_string().to_lowercase(),
        );
        default_output_path(&cli.input, &suffix)
    });
    match image::ImageFormat::from_path(&path) {
        Ok(format) if format.writing_enabled() => Ok(path),
        Ok(format) => Err(format!(
            "Cannot write {}: {format:?} output is not supported",
            path.display()
        )),
        Err(e) => Err(format!("Cannot write {}: {e}", path.display())),
    }
}

/// Render a fixed style and write it to `output_path`.
fn run_style(cli: &Cli, style: Style, image: &DynamicImage, output_path: &Path) -> ExitCode {
    let params = style_params_from_cli(cli, style);
    tracing::debug!(?params, "starting");
    let output = match pencilmark_pipeline::render_style(image, &params) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if output.downscaled {
        eprintln!(
            "Downscaled to {}x{} before rendering",
            output.image.width(),
            output.image.height(),
        );
    }
    if let Err(e) = output.image.save(output_path) {
        eprintln!("Error writing {}: {e}", output_path.display());
        return ExitCode::FAILURE;
    }
    eprintln!("{} written to {}", output.params.style, output_path.display());
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "pencilmark=warn".into()))
        .with(fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let output_path = match output_path_from_cli(&cli) {
        Ok(path) => path,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    let image = match pencilmark_pipeline::grayscale::decode(&image_bytes) {
        Ok(image) => image,
        Err(PipelineError::NoInput) => {
            eprintln!("{} is empty, nothing to do", cli.input.display());
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error loading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{}, {} bytes)",
        cli.input.display(),
        image.width(),
        image.height(),
        image_bytes.len(),
    );
    if let Some(style) = cli.style {
        return run_style(&cli, style, &image, &output_path);
    }

    tracing::debug!(?params, runs = cli.runs, "starting");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (staged, diagnostics) =
            match pencilmark_pipeline::diagnostics::render_staged_with_diagnostics(
                &image, &params, &StdClock,
            ) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Pipeline error: {e}");
                    return ExitCode::FAILURE;
                }
            };

        if run == 0 {
            if let Some(c) = staged.correction {
                eprintln!(
                    "Canny low threshold {} is not below high threshold {}; using {}",
                    c.requested_low, staged.params.canny_high, c.applied_low,
                );
            }
            if staged.fallback {
                eprintln!("No edges found; writing the smoothed image");
            }
            if let Err(e) = staged.sketch.save(&output_path) {
                eprintln!("Error writing {}: {e}", output_path.display());
                return ExitCode::FAILURE;
            }
            eprintln!("Sketch written to {}", output_path.display());
        }

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else if cli.diagnostics {
            println!("{}", diagnostics.report());
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Grayscale", |d| d.grayscale.duration),
        ("Smoothing", |d| d.smoothing.duration),
        ("Edge Detection", |d| d.edge_detection.duration),
        ("Composite", |d| d.composite.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_pipeline_defaults() {
        let cli = Cli::try_parse_from(["pencilmark", "photo.jpg"]).unwrap();
        assert_eq!(params_from_cli(&cli).unwrap(), SketchParams::default());
    }

    #[test]
    fn flags_build_params() {
        let cli = Cli::try_parse_from([
            "pencilmark",
            "photo.jpg",
            "--smoothing",
            "gaussian",
            "--edge",
            "laplacian",
            "--kernel-radius",
            "10",
            "--canny-low",
            "20",
        ])
        .unwrap();
        let params = params_from_cli(&cli).unwrap();
        assert_eq!(params.smoothing_method, SmoothingMethod::Gaussian);
        assert_eq!(params.edge_method, EdgeMethod::Laplacian);
        assert_eq!(params.kernel_radius, 10);
        assert_eq!(params.canny_low, 20);
        assert_eq!(params.canny_high, SketchParams::DEFAULT_CANNY_HIGH);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::try_parse_from([
            "pencilmark",
            "photo.jpg",
            "--edge",
            "laplacian",
            "--config-json",
            r#"{"edge_method": "Sobel"}"#,
        ])
        .unwrap();
        let params = params_from_cli(&cli).unwrap();
        assert_eq!(params.edge_method, EdgeMethod::Sobel);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli =
            Cli::try_parse_from(["pencilmark", "photo.jpg", "--config-json", "{\"x\": 1}"]).unwrap();
        assert!(params_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn zero_kernel_radius_flag_is_rejected() {
        assert!(Cli::try_parse_from(["pencilmark", "photo.jpg", "--kernel-radius", "0"]).is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        assert!(Cli::try_parse_from(["pencilmark", "photo.jpg", "--canny-high", "300"]).is_err());
    }

    #[test]
    fn kernel_radius_above_max_is_rejected() {
        let parse = |value: &str| {
            Cli::try_parse_from(["pencilmark", "photo.jpg", "--kernel-radius", value])
        };
        let max = SketchParams::MAX_KERNEL_RADIUS;
        assert_eq!(parse(&max.to_string()).unwrap().kernel_radius, max);
        assert!(parse(&(max + 1).to_string()).is_err());
        assert!(parse("4294967295").is_err());
    }

    #[test]
    fn default_output_sits_next_to_input() {
        let cli = Cli::try_parse_from(["pencilmark", "shots/cat.jpg"]).unwrap();
        assert_eq!(
            output_path_from_cli(&cli).unwrap(),
            PathBuf::from("shots/cat-sketch.png")
        );
        let cli = Cli::try_parse_from(["pencilmark", "shots/cat.jpg", "--style", "watercolor"])
            .unwrap();
        assert_eq!(
            output_path_from_cli(&cli).unwrap(),
            PathBuf::from("shots/cat-watercolor.png")
        );
    }

    #[test]
    fn unknown_output_extension_is_rejected_before_rendering() {
        let cli = Cli::try_parse_from(["pencilmark", "photo.jpg", "-o", "sketch.xyz"]).unwrap();
        assert!(output_path_from_cli(&cli).unwrap_err().contains("sketch.xyz"));
        let cli = Cli::try_parse_from(["pencilmark", "photo.jpg", "-o", "out/sketch.jpg"]).unwrap();
        assert_eq!(output_path_from_cli(&cli).unwrap(), PathBuf::from("out/sketch.jpg"));
    }

    #[test]
    fn style_flags_build_style_params() {
        let cli = Cli::try_parse_from([
            "pencilmark",
            "photo.jpg",
            "--style",
            "cartoon",
            "--edge-strength",
            "70",
            "--full-size",
        ])
        .unwrap();
        let params = style_params_from_cli(&cli, cli.style.unwrap());
        assert_eq!(params.style, ArtStyle::Cartoon);
        assert_eq!(params.edge_strength, 70);
        assert_eq!(params.gray_level, StyleParams::DEFAULT_GRAY_LEVEL);
        assert_eq!(params.fit_within, None);
    }

    #[test]
    fn style_defaults_match_pipeline_defaults() {
        let cli = Cli::try_parse_from(["pencilmark", "photo.jpg", "--style", "edge"]).unwrap();
        let params = style_params_from_cli(&cli, cli.style.unwrap());
        assert_eq!(
            params,
            StyleParams {
                style: ArtStyle::Edge,
                ..StyleParams::default()
            }
        );
    }

    #[test]
    fn edge_strength_outside_slider_range_is_rejected() {
        for value in ["9", "101"] {
            assert!(
                Cli::try_parse_from(["pencilmark", "photo.jpg", "--edge-strength", value]).is_err()
            );
        }
    }

    #[test]
    fn style_conflicts_with_diagnostics() {
        assert!(
            Cli::try_parse_from(["pencilmark", "photo.jpg", "--style", "pencil", "--diagnostics"])
                .is_err()
        );
    }
}
