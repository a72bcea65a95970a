//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. [`render_staged_with_diagnostics`] drives
//! the [`Pipeline`](crate::Pipeline) one stage at a time and records
//! what each stage did alongside the staged results.
//!
//! The crate itself never reads a clock. Callers pass a [`Clock`]
//! implementation so the pipeline stays free of platform time sources.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::edge::EdgeMethod;
use crate::smooth::SmoothingMethod;
use crate::types::{DynamicImage, PipelineError, SketchParams, StagedSketch, ThresholdCorrection};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Monotonic time source used to measure stage durations.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// Stage 2: smoothing.
    pub smoothing: StageDiagnostics,
    /// Stage 3: edge extraction.
    pub edge_detection: StageDiagnostics,
    /// Stage 4: dodge-blend compositing.
    pub composite: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Smoothing metrics.
    Smoothing {
        /// Which filter ran.
        method: SmoothingMethod,
        /// Effective kernel side length, `None` for no smoothing.
        kernel_size: Option<u32>,
        /// Bilateral sigma (unused by the other methods).
        color_sigma: u32,
    },
    /// Edge extraction metrics.
    EdgeDetection {
        /// Which detector ran.
        method: EdgeMethod,
        /// Canny low threshold after correction (Canny only).
        low_threshold: Option<u8>,
        /// Canny high threshold (Canny only).
        high_threshold: Option<u8>,
        /// Number of edge pixels (value == 255) in the mask.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Compositing metrics.
    Composite {
        /// Whether the empty-mask fallback was taken.
        fallback: bool,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// The Canny threshold repair, when one was applied.
    pub correction: Option<ThresholdCorrection>,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        if let Some(c) = self.summary.correction {
            lines.push(format!(
                "Canny low threshold corrected: {} -> {}",
                c.requested_low, c.applied_low,
            ));
        }
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let stages = [
            ("Grayscale", &self.grayscale),
            ("Smoothing", &self.smoothing),
            ("Edge Detection", &self.edge_detection),
            ("Composite", &self.composite),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Smoothing {
            method,
            kernel_size,
            color_sigma,
        } => match (method, kernel_size) {
            (SmoothingMethod::Bilateral, Some(k)) => format!("{method} d={k} sigma={color_sigma}"),
            (_, Some(k)) => format!("{method} ksize={k}"),
            (_, None) => method.to_string(),
        },
        StageMetrics::EdgeDetection {
            method,
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            match (low_threshold, high_threshold) {
                (Some(low), Some(high)) => format!(
                    "{method} low={low} high={high} edges={edge_pixel_count} ({density:.1}%)",
                ),
                _ => format!("{method} edges={edge_pixel_count} ({density:.1}%)"),
            }
        }
        StageMetrics::Composite { fallback } => {
            if *fallback {
                "no edges, smoothed image returned".to_string()
            } else {
                "dodge blend".to_string()
            }
        }
    }
}

/// Count edge pixels (value == 255) in a grayscale image.
pub(crate) fn count_edge_pixels(image: &image::GrayImage) -> u64 {
    image
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == crate::edge::EDGE)))
        .sum()
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// Produces the same [`StagedSketch`] as [`crate::render_sketch_staged`]
/// plus per-stage [`PipelineDiagnostics`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the image has zero area
/// or an unsupported channel layout.
pub fn render_staged_with_diagnostics<C: Clock>(
    image: &DynamicImage,
    params: &SketchParams,
    clock: &C,
) -> Result<(StagedSketch, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let pending = crate::Pipeline::new(image, *params);
    let effective = *pending.params();

    let start = clock.now();
    let grayscaled = pending.grayscale()?;
    let dimensions = grayscaled.dimensions();
    let grayscale = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Grayscale {
            width: dimensions.width,
            height: dimensions.height,
        },
    };

    let start = clock.now();
    let smoothed = grayscaled.smooth();
    let smoothing = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Smoothing {
            method: effective.smoothing_method,
            kernel_size: effective
                .smoothing_method
                .kernel_size(effective.kernel_radius),
            color_sigma: effective.color_sigma,
        },
    };

    let start = clock.now();
    let detected = smoothed.detect_edges();
    let duration = clock.elapsed(&start);
    let is_canny = effective.edge_method == EdgeMethod::Canny;
    let edge_detection = StageDiagnostics {
        duration,
        metrics: StageMetrics::EdgeDetection {
            method: effective.edge_method,
            low_threshold: is_canny.then_some(effective.canny_low),
            high_threshold: is_canny.then_some(effective.canny_high),
            edge_pixel_count: count_edge_pixels(detected.edges()),
            total_pixel_count: dimensions.pixel_count(),
        },
    };

    let start = clock.now();
    let composited = detected.composite()?;
    let composite = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Composite {
            fallback: composited.fallback(),
        },
    };

    let staged = composited.into_result();
    let diagnostics = PipelineDiagnostics {
        grayscale,
        smoothing,
        edge_detection,
        composite,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            correction: staged.correction,
        },
    };

    Ok((staged, diagnostics))
}
