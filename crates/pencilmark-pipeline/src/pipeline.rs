//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::render_sketch`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use pencilmark_pipeline::{DynamicImage, Pipeline, PipelineError, SketchParams};
//! # fn run(image: &DynamicImage) -> Result<(), PipelineError> {
//! let pipeline = Pipeline::new(image, SketchParams::default())
//!     .grayscale()?
//!     .smooth()
//!     .detect_edges()
//!     .composite()?;
//!
//! let staged = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. The caller can inspect the current stage's output via
//! accessor methods at any point.
//!
//! Parameters are corrected once, in [`Pipeline::new`]; every stage
//! sees the effective record.

use image::DynamicImage;

use crate::edge::EdgeDetector;
use crate::smooth::Smoother;
use crate::types::{
    Dimensions, GrayImage, PipelineError, RgbImage, SketchOutput, SketchParams, StagedSketch,
    ThresholdCorrection,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image and effective parameters are stored but not yet
/// touched. Call [`grayscale`](Self::grayscale) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .grayscale() to continue"]
pub struct Pending<'a> {
    params: SketchParams,
    correction: Option<ThresholdCorrection>,
    source: &'a DynamicImage,
}

impl Pending<'_> {
    /// The source image.
    #[must_use]
    pub const fn source(&self) -> &DynamicImage {
        self.source
    }

    /// The effective parameters every stage will use.
    #[must_use]
    pub const fn params(&self) -> &SketchParams {
        &self.params
    }

    /// The Canny threshold repair applied by [`Pipeline::new`], if any.
    #[must_use]
    pub const fn correction(&self) -> Option<ThresholdCorrection> {
        self.correction
    }

    /// Reduce the source to a single intensity channel and advance to
    /// the [`Grayscaled`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidImage`] if the source has zero
    /// area or a channel layout other than 8-bit gray or RGB.
    pub fn grayscale(self) -> Result<Grayscaled, PipelineError> {
        let grayscale = crate::grayscale::to_intensity(self.source)?;
        let dimensions = Dimensions::new(grayscale.width(), grayscale.height());
        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            color = ?self.source.color(),
            "converted to grayscale"
        );
        Ok(Grayscaled {
            params: self.params,
            correction: self.correction,
            grayscale,
            dimensions,
        })
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Pipeline state after intensity conversion.
///
/// Call [`smooth`](Self::smooth) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .smooth() to continue"]
pub struct Grayscaled {
    params: SketchParams,
    correction: Option<ThresholdCorrection>,
    grayscale: GrayImage,
    dimensions: Dimensions,
}

impl Grayscaled {
    /// The single-channel intensity image.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.grayscale
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Advance to the smoothing stage.
    pub fn smooth(self) -> Smoothed {
        let method = self.params.smoothing_method;
        let smoothed = method.smooth(&self.grayscale, &self.params);
        tracing::debug!(
            %method,
            kernel_size = ?method.kernel_size(self.params.kernel_radius),
            color_sigma = self.params.color_sigma,
            "smoothed"
        );
        Smoothed {
            params: self.params,
            correction: self.correction,
            grayscale: self.grayscale,
            smoothed,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 2: Smoothed ─────────────────────────

/// Pipeline state after noise reduction.
///
/// Call [`detect_edges`](Self::detect_edges) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .detect_edges() to continue"]
pub struct Smoothed {
    params: SketchParams,
    correction: Option<ThresholdCorrection>,
    grayscale: GrayImage,
    smoothed: GrayImage,
    dimensions: Dimensions,
}

impl Smoothed {
    /// The smoothed intensity image.
    #[must_use]
    pub const fn smoothed(&self) -> &GrayImage {
        &self.smoothed
    }

    /// Advance to the edge extraction stage.
    pub fn detect_edges(self) -> EdgesDetected {
        let method = self.params.edge_method;
        let edges = method.detect(&self.smoothed, &self.params);
        tracing::debug!(
            %method,
            edge_pixels = crate::diagnostics::count_edge_pixels(&edges),
            "detected edges"
        );
        EdgesDetected {
            params: self.params,
            correction: self.correction,
            grayscale: self.grayscale,
            smoothed: self.smoothed,
            edges,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 3: EdgesDetected ────────────────────

/// Pipeline state after edge extraction.
///
/// Call [`composite`](Self::composite) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing — call .composite() to continue"]
pub struct EdgesDetected {
    params: SketchParams,
    correction: Option<ThresholdCorrection>,
    grayscale: GrayImage,
    smoothed: GrayImage,
    edges: GrayImage,
    dimensions: Dimensions,
}

impl EdgesDetected {
    /// The binary edge mask (255 = edge, 0 = background).
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Advance to the compositing stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidImage`] if the edge mask and the
    /// smoothed image disagree in size.
    pub fn composite(self) -> Result<Composited, PipelineError> {
        let composite = crate::composite::composite(&self.smoothed, &self.edges)?;
        if composite.fallback {
            tracing::debug!("edge mask is empty, returning smoothed image");
        }
        Ok(Composited {
            params: self.params,
            correction: self.correction,
            grayscale: self.grayscale,
            smoothed: self.smoothed,
            edges: self.edges,
            sketch: composite.sketch,
            fallback: composite.fallback,
            dimensions: self.dimensions,
        })
    }
}

// ───────────────────────── Stage 4: Composited ───────────────────────

/// Terminal pipeline state.
///
/// Call [`into_result`](Self::into_result) to take every intermediate,
/// or [`into_output`](Self::into_output) for the sketch alone.
#[must_use = "call .into_result() or .into_output() to take the sketch"]
pub struct Composited {
    params: SketchParams,
    correction: Option<ThresholdCorrection>,
    grayscale: GrayImage,
    smoothed: GrayImage,
    edges: GrayImage,
    sketch: RgbImage,
    fallback: bool,
    dimensions: Dimensions,
}

impl Composited {
    /// The final 3-channel sketch.
    #[must_use]
    pub const fn sketch(&self) -> &RgbImage {
        &self.sketch
    }

    /// Whether the compositor returned the smoothed image unblended.
    #[must_use]
    pub const fn fallback(&self) -> bool {
        self.fallback
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Consume the pipeline and return every stage output.
    #[must_use]
    pub fn into_result(self) -> StagedSketch {
        StagedSketch {
            grayscale: self.grayscale,
            smoothed: self.smoothed,
            edges: self.edges,
            sketch: self.sketch,
            fallback: self.fallback,
            params: self.params,
            correction: self.correction,
            dimensions: self.dimensions,
        }
    }

    /// Consume the pipeline and return only the final output.
    #[must_use]
    pub fn into_output(self) -> SketchOutput {
        self.into_result().into_output()
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental sketch rendering pipeline.
///
/// Created via [`Pipeline::new`], which corrects the parameters and
/// stores the source image without doing any processing. The caller
/// then chains stage methods to advance through the pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Start a new pipeline over `image`.
    ///
    /// `params` is corrected here (see [`SketchParams::corrected`]); a
    /// Canny threshold repair is logged and kept for the final result.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image: &DynamicImage, params: SketchParams) -> Pending<'_> {
        let (params, correction) = params.corrected();
        if let Some(c) = correction {
            tracing::info!(
                requested_low = c.requested_low,
                applied_low = c.applied_low,
                high = params.canny_high,
                "corrected Canny low threshold"
            );
        }
        Pending {
            params,
            correction,
            source: image,
        }
    }
}
