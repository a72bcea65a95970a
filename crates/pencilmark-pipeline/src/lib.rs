//! pencilmark-pipeline: Pure pencil-sketch rendering pipeline (sans-IO).
//!
//! Turns a raster image into a pencil-sketch rendering through:
//! grayscale -> smoothing -> edge extraction -> dodge-blend compositing.
//!
//! A handful of fixed styles (cartoon, pencil, watercolor, edge outline)
//! are available through [`render_style`].
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices and returns structured data. Reading and
//! writing files lives in the `pencilmark` CLI.

pub mod bilateral;
pub mod blur;
pub mod canny;
pub mod composite;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod pipeline;
pub mod smooth;
pub mod style;
pub mod types;

pub use edge::{EdgeDetector, EdgeMethod};
pub use pipeline::Pipeline;
pub use smooth::{Smoother, SmoothingMethod, UnknownMethod};
pub use style::{ArtStyle, StyleOutput, StyleParams};
pub use types::{
    Dimensions, DynamicImage, GrayImage, PipelineError, RgbImage, SketchOutput, SketchParams,
    StagedSketch, ThresholdCorrection,
};

/// Render a pencil sketch of `image`.
///
/// # Pipeline steps
///
/// 1. Correct the parameters (see [`SketchParams::corrected`])
/// 2. Convert to single-channel intensity
/// 3. Smooth (none, bilateral, or Gaussian)
/// 4. Extract a binary edge mask (Canny, Sobel, or Laplacian)
/// 5. Dodge-blend the smoothed image with the inverted mask, or return
///    the smoothed image when the mask is empty
///
/// The output always has the input's width and height and three
/// identical channels.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the image has zero area
/// or a channel layout other than 8-bit gray or 8-bit RGB.
pub fn render_sketch(
    image: &DynamicImage,
    params: &SketchParams,
) -> Result<SketchOutput, PipelineError> {
    Ok(render_sketch_staged(image, params)?.into_output())
}

/// Render a pencil sketch, preserving every intermediate stage output.
///
/// # Errors
///
/// Same as [`render_sketch`].
pub fn render_sketch_staged(
    image: &DynamicImage,
    params: &SketchParams,
) -> Result<StagedSketch, PipelineError> {
    Ok(Pipeline::new(image, *params)
        .grayscale()?
        .smooth()
        .detect_edges()
        .composite()?
        .into_result())
}

/// Render a sketch if there is an image to render.
///
/// With no source image this is the idle state: `Ok(None)`, no
/// processing, no error.
///
/// # Errors
///
/// Same as [`render_sketch`].
pub fn render_optional(
    image: Option<&DynamicImage>,
    params: &SketchParams,
) -> Result<Option<SketchOutput>, PipelineError> {
    image.map(|img| render_sketch(img, params)).transpose()
}

/// Decode raw image bytes (PNG, JPEG, BMP, WebP) and render a sketch.
///
/// # Errors
///
/// Returns [`PipelineError::NoInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::InvalidImage`] if the image has zero area.
pub fn render_sketch_bytes(
    image_bytes: &[u8],
    params: &SketchParams,
) -> Result<SketchOutput, PipelineError> {
    let image = grayscale::decode(image_bytes)?;
    render_sketch(&image, params)
}

/// Render `image` in one of the fixed [`ArtStyle`]s.
///
/// The image is first downscaled to fit `params.fit_within` (when
/// set), so the output may be smaller than the input.
///
/// # Errors
///
/// Same as [`render_sketch`].
pub fn render_style(
    image: &DynamicImage,
    params: &StyleParams,
) -> Result<StyleOutput, PipelineError> {
    style::render(image, params)
}
