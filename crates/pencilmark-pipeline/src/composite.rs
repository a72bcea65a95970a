//! Sketch compositing: dodge-blend the smoothed image with the
//! inverted edge mask.
//!
//! With the mask inverted (`E_inv`, edges 0 and background 255), each
//! output pixel is
//!
//! ```text
//! clamp(S * 256 / max(255 - E_inv, 1), 0, 255)
//! ```
//!
//! Background pixels divide by 1 and blow out to white paper; edge
//! pixels divide by 255 and keep their smoothed intensity, which reads
//! as a pencil stroke on the page. An empty mask skips the blend and
//! returns the smoothed image as-is.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::edge::{has_edges, invert_edge_map};
use crate::types::PipelineError;

/// Output of the compositor.
#[derive(Debug, Clone)]
pub struct Composite {
    /// The final 3-channel sketch.
    pub sketch: RgbImage,
    /// `true` when the edge mask was empty and the smoothed image was
    /// returned without blending.
    pub fallback: bool,
}

/// Composite the final sketch from the smoothed intensity image and
/// its binary edge mask.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the mask and the smoothed
/// image differ in size.
pub fn composite(smoothed: &GrayImage, edges: &GrayImage) -> Result<Composite, PipelineError> {
    if smoothed.dimensions() != edges.dimensions() {
        return Err(PipelineError::InvalidImage(format!(
            "edge mask is {}x{} but smoothed image is {}x{}",
            edges.width(),
            edges.height(),
            smoothed.width(),
            smoothed.height(),
        )));
    }

    if !has_edges(edges) {
        return Ok(Composite {
            sketch: promote_to_rgb(smoothed),
            fallback: true,
        });
    }

    let inverted = invert_edge_map(edges);
    let blended = dodge_blend(smoothed, &inverted);
    Ok(Composite {
        sketch: promote_to_rgb(&blended),
        fallback: false,
    })
}

/// Per-pixel color dodge of `base` by an inverted mask.
///
/// Both images must have the same dimensions.
#[must_use = "returns the blended image"]
pub fn dodge_blend(base: &GrayImage, inverted_mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(base.width(), base.height(), |x, y| {
        Luma([dodge(
            base.get_pixel(x, y).0[0],
            inverted_mask.get_pixel(x, y).0[0],
        )])
    })
}

/// Color dodge of a single intensity by a single inverted-mask value.
///
/// The divisor is floored at 1, so a fully white mask value never
/// divides by zero; it saturates to 255 (or stays 0 for a black base).
#[must_use]
pub fn dodge(base: u8, inverted_mask: u8) -> u8 {
    let divisor = (255.0 - f64::from(inverted_mask)).max(1.0);
    let value = (f64::from(base) * 256.0 / divisor).clamp(0.0, 255.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let truncated = value as u8;
    truncated
}

/// Replicate a single-channel image into three identical channels.
#[must_use = "returns the RGB image"]
pub fn promote_to_rgb(image: &GrayImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}
