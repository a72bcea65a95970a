//! Shared types for the pencilmark sketch pipeline.

use serde::{Deserialize, Serialize};

use crate::edge::EdgeMethod;
use crate::smooth::SmoothingMethod;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`, the 3-channel layout of every final sketch.
pub use image::RgbImage;

/// Re-export `DynamicImage`, the decoded input accepted by the pipeline.
pub use image::DynamicImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Parameters for a single sketch rendering.
///
/// All parameters have defaults matching the initial control values
/// of the desktop front end: bilateral smoothing with a 15 px
/// neighborhood and sigma 75, followed by Canny with thresholds 50/150.
///
/// # Consistency
///
/// The record is accepted as-is and never rejected. Before any stage
/// runs, [`corrected`](Self::corrected) derives the effective record:
///
/// - `kernel_radius` is clamped into
///   `1..=`[`MAX_KERNEL_RADIUS`](Self::MAX_KERNEL_RADIUS) and
///   `color_sigma` is raised to at least 1.
/// - With [`EdgeMethod::Canny`], `canny_low >= canny_high` is repaired
///   by setting `canny_low = canny_high - 1` (or 1 when
///   `canny_high <= 1`). The repaired value is reported back through
///   [`ThresholdCorrection`] so a UI can move its slider to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SketchParams {
    /// Noise reduction applied to the intensity image before edge
    /// extraction.
    pub smoothing_method: SmoothingMethod,

    /// Algorithm that produces the binary edge mask.
    pub edge_method: EdgeMethod,

    /// Smoothing neighborhood diameter (bilateral) or requested kernel
    /// side length (Gaussian). Effective range is
    /// `1..=`[`MAX_KERNEL_RADIUS`](Self::MAX_KERNEL_RADIUS).
    pub kernel_radius: u32,

    /// Intensity and spatial sigma for bilateral smoothing. Must be at
    /// least 1.
    pub color_sigma: u32,

    /// Canny hysteresis low threshold. Gradient magnitudes above this
    /// value are edges only when connected to a strong edge.
    pub canny_low: u8,

    /// Canny hysteresis high threshold. Gradient magnitudes above this
    /// value are always edges.
    pub canny_high: u8,
}

impl SketchParams {
    /// Default smoothing method.
    pub const DEFAULT_SMOOTHING_METHOD: SmoothingMethod = SmoothingMethod::Bilateral;
    /// Default edge detection method.
    pub const DEFAULT_EDGE_METHOD: EdgeMethod = EdgeMethod::Canny;
    /// Default smoothing neighborhood diameter.
    pub const DEFAULT_KERNEL_RADIUS: u32 = 15;
    /// Largest effective smoothing neighborhood. Smoothing cost grows
    /// with the window, so larger requests are clamped to this.
    pub const MAX_KERNEL_RADIUS: u32 = 50;
    /// Default bilateral sigma.
    pub const DEFAULT_COLOR_SIGMA: u32 = 75;
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: u8 = 50;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: u8 = 150;

    /// Derive the effective parameter record actually used by the
    /// pipeline, plus the Canny threshold repair if one was needed.
    #[must_use]
    pub fn corrected(&self) -> (Self, Option<ThresholdCorrection>) {
        let mut effective = Self {
            kernel_radius: self.kernel_radius.clamp(1, Self::MAX_KERNEL_RADIUS),
            color_sigma: self.color_sigma.max(1),
            ..*self
        };

        let correction = if self.edge_method == EdgeMethod::Canny {
            corrected_low_threshold(self.canny_low, self.canny_high).map(|applied_low| {
                effective.canny_low = applied_low;
                ThresholdCorrection {
                    requested_low: self.canny_low,
                    applied_low,
                }
            })
        } else {
            None
        };

        (effective, correction)
    }
}

impl Default for SketchParams {
    fn default() -> Self {
        Self {
            smoothing_method: Self::DEFAULT_SMOOTHING_METHOD,
            edge_method: Self::DEFAULT_EDGE_METHOD,
            kernel_radius: Self::DEFAULT_KERNEL_RADIUS,
            color_sigma: Self::DEFAULT_COLOR_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
        }
    }
}

/// Repaired low threshold for an inconsistent `low >= high` pair, or
/// `None` when the pair is already consistent.
///
/// With `high == 0` the repaired pair is still `1 > 0`. The detector
/// runs with it unchanged: both thresholds are strict, so a low
/// threshold at or above the high one only ever admits strong pixels.
#[must_use]
pub const fn corrected_low_threshold(low: u8, high: u8) -> Option<u8> {
    if low < high {
        None
    } else if high > 1 {
        Some(high - 1)
    } else {
        Some(1)
    }
}

/// Record of a Canny low threshold that was auto-corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdCorrection {
    /// The low threshold the caller asked for.
    pub requested_low: u8,
    /// The low threshold the detector actually ran with.
    pub applied_low: u8,
}

/// Final result of rendering a sketch.
#[derive(Debug, Clone)]
pub struct SketchOutput {
    /// The 3-channel sketch, same dimensions as the input.
    pub image: RgbImage,
    /// The effective parameters (after correction).
    pub params: SketchParams,
    /// The Canny threshold repair, when one was applied.
    pub correction: Option<ThresholdCorrection>,
}

/// Result of rendering with all intermediate stage outputs preserved.
///
/// Each field captures the output of one logical pipeline stage, so a
/// front end can preview every step and a tuning tool can inspect
/// where edges came from.
#[derive(Debug, Clone)]
pub struct StagedSketch {
    /// Stage 1: single-channel intensity image.
    pub grayscale: GrayImage,
    /// Stage 2: smoothed intensity image.
    pub smoothed: GrayImage,
    /// Stage 3: binary edge mask (255 = edge, 0 = background).
    pub edges: GrayImage,
    /// Stage 4: final 3-channel sketch.
    pub sketch: RgbImage,
    /// Whether the compositor fell back to the promoted smoothed image
    /// because the edge mask was empty.
    pub fallback: bool,
    /// The effective parameters (after correction).
    pub params: SketchParams,
    /// The Canny threshold repair, when one was applied.
    pub correction: Option<ThresholdCorrection>,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedSketch {
    /// Drop the intermediates and keep only the final output.
    #[must_use]
    pub fn into_output(self) -> SketchOutput {
        SketchOutput {
            image: self.sketch,
            params: self.params,
            correction: self.correction,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Inconsistent parameters are never an error; see
/// [`SketchParams::corrected`].
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// There is no source image to process. This is an idle state
    /// rather than a fault: the caller should prompt for an image.
    #[error("no input image to process")]
    NoInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The image has unsupported geometry or channel layout.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Serde-compatible proxy for `PipelineError`.
///
/// A deserialized `ImageDecode` becomes a generic decoding error with
/// the original message; the typed source cannot be reconstructed.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    NoInput,
    ImageDecode(String),
    InvalidImage(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::NoInput => PipelineErrorProxy::NoInput,
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::InvalidImage(s) => PipelineErrorProxy::InvalidImage(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::NoInput => Self::NoInput,
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::ImageDecode(image::ImageError::Decoding(image::error::DecodingError::new(
                    image::error::ImageFormatHint::Unknown,
                    msg,
                )))
            }
            PipelineErrorProxy::InvalidImage(s) => Self::InvalidImage(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::edge::EdgeDetector;

    // --- SketchParams defaults ---

    #[test]
    fn sketch_params_defaults_match_initial_controls() {
        let params = SketchParams::default();
        assert_eq!(params.smoothing_method, SmoothingMethod::Bilateral);
        assert_eq!(params.edge_method, EdgeMethod::Canny);
        assert_eq!(params.kernel_radius, 15);
        assert_eq!(params.color_sigma, 75);
        assert_eq!(params.canny_low, 50);
        assert_eq!(params.canny_high, 150);
    }

    // --- Threshold correction ---

    #[test]
    fn consistent_thresholds_are_untouched() {
        let params = SketchParams::default();
        let (effective, correction) = params.corrected();
        assert_eq!(effective, params);
        assert!(correction.is_none());
    }

    #[test]
    fn low_above_high_is_corrected_to_high_minus_one() {
        let params = SketchParams {
            canny_low: 200,
            canny_high: 100,
            ..SketchParams::default()
        };
        let (effective, correction) = params.corrected();
        assert_eq!(effective.canny_low, 99);
        assert_eq!(effective.canny_high, 100);
        assert_eq!(
            correction,
            Some(ThresholdCorrection {
                requested_low: 200,
                applied_low: 99,
            }),
        );
    }

    #[test]
    fn equal_thresholds_are_corrected() {
        assert_eq!(corrected_low_threshold(120, 120), Some(119));
    }

    #[test]
    fn tiny_high_threshold_corrects_low_to_one() {
        assert_eq!(corrected_low_threshold(5, 1), Some(1));
        assert_eq!(corrected_low_threshold(0, 0), Some(1));
    }

    #[test]
    fn zero_high_threshold_reports_the_low_the_detector_uses() {
        let params = SketchParams {
            canny_low: 40,
            canny_high: 0,
            ..SketchParams::default()
        };
        let (effective, correction) = params.corrected();
        assert_eq!(correction.unwrap().applied_low, 1);
        assert_eq!(effective.canny_low, 1);

        // The stage passes the reported pair straight to the detector.
        let img = GrayImage::from_fn(12, 12, |x, _| image::Luma([if x < 6 { 0 } else { 255 }]));
        assert_eq!(
            EdgeMethod::Canny.detect(&img, &effective),
            crate::canny::canny(&img, 1.0, 0.0),
        );
    }

    #[test]
    fn low_below_high_needs_no_correction() {
        assert_eq!(corrected_low_threshold(0, 1), None);
        assert_eq!(corrected_low_threshold(254, 255), None);
    }

    #[test]
    fn thresholds_only_corrected_for_canny() {
        let params = SketchParams {
            edge_method: EdgeMethod::Sobel,
            canny_low: 200,
            canny_high: 100,
            ..SketchParams::default()
        };
        let (effective, correction) = params.corrected();
        assert_eq!(effective.canny_low, 200);
        assert!(correction.is_none());
    }

    #[test]
    fn zero_kernel_radius_and_sigma_raised_to_one() {
        let params = SketchParams {
            kernel_radius: 0,
            color_sigma: 0,
            ..SketchParams::default()
        };
        let (effective, _) = params.corrected();
        assert_eq!(effective.kernel_radius, 1);
        assert_eq!(effective.color_sigma, 1);
    }

    #[test]
    fn huge_kernel_radius_clamped_to_max() {
        let params = SketchParams {
            smoothing_method: SmoothingMethod::Gaussian,
            kernel_radius: u32::MAX,
            ..SketchParams::default()
        };
        let (effective, _) = params.corrected();
        assert_eq!(effective.kernel_radius, SketchParams::MAX_KERNEL_RADIUS);
    }

    // --- Serde ---

    #[test]
    fn sketch_params_serde_round_trip() {
        let params = SketchParams {
            smoothing_method: SmoothingMethod::Gaussian,
            edge_method: EdgeMethod::Laplacian,
            kernel_radius: 7,
            color_sigma: 30,
            canny_low: 10,
            canny_high: 20,
        };
        let json = serde_json::to_string(&params).unwrap();
        let deserialized: SketchParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, deserialized);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let params: SketchParams =
            serde_json::from_str(r#"{"edge_method": "Sobel", "kernel_radius": 9}"#).unwrap();
        assert_eq!(params.edge_method, EdgeMethod::Sobel);
        assert_eq!(params.kernel_radius, 9);
        assert_eq!(params.color_sigma, SketchParams::DEFAULT_COLOR_SIGMA);
        assert_eq!(params.smoothing_method, SketchParams::DEFAULT_SMOOTHING_METHOD);
    }

    #[test]
    fn unknown_json_field_is_rejected() {
        let result = serde_json::from_str::<SketchParams>(r#"{"blur_sigma": 1.4}"#);
        assert!(result.is_err());
    }

    // --- Dimensions ---

    #[test]
    fn dimensions_pixel_count() {
        assert_eq!(Dimensions::new(400, 300).pixel_count(), 120_000);
    }

    // --- PipelineError ---

    #[test]
    fn error_no_input_display() {
        assert_eq!(PipelineError::NoInput.to_string(), "no input image to process");
    }

    #[test]
    fn error_invalid_image_display() {
        let err = PipelineError::InvalidImage("image has zero area".to_string());
        assert_eq!(err.to_string(), "invalid image: image has zero area");
    }

    #[test]
    fn error_serde_round_trip() {
        let err = PipelineError::InvalidImage("1 channel expected".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::InvalidImage(ref s) if s == "1 channel expected"));

        let json = serde_json::to_string(&PipelineError::NoInput).unwrap();
        assert_eq!(json, r#""NoInput""#);
    }

    #[test]
    fn decode_error_serializes_as_message() {
        let err = crate::grayscale::decode(&[0xFF, 0x00]).unwrap_err();
        let message = err.to_string();
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::ImageDecode(_)));
        assert!(message.starts_with("failed to decode image"));
    }
}
