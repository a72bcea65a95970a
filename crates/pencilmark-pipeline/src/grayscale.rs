//! Image decoding and grayscale normalization.
//!
//! [`decode`] turns raw image bytes (PNG, JPEG, BMP, WebP) into an
//! 8-bit gray or 8-bit RGB raster, the only two layouts the pipeline
//! accepts. [`to_intensity`] is the first pipeline stage: any accepted
//! raster in, an independent single-channel `GrayImage` out.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::types::PipelineError;

/// Fixed-point (14-bit) BT.601 luma weights for R, G and B.
///
/// `4899 + 9617 + 1868 == 1 << 14`, so a white pixel maps to exactly 255.
const LUMA_WEIGHTS: [u32; 3] = [4899, 9617, 1868];
const LUMA_SHIFT: u32 = 14;
const _: () = assert!(LUMA_WEIGHTS[0] + LUMA_WEIGHTS[1] + LUMA_WEIGHTS[2] == 1 << LUMA_SHIFT);

/// Decode raw image bytes into an 8-bit gray or RGB raster.
///
/// Color images (with or without alpha, any bit depth) become
/// [`DynamicImage::ImageRgb8`]; everything else becomes
/// [`DynamicImage::ImageLuma8`]. Alpha is discarded.
///
/// # Errors
///
/// Returns [`PipelineError::NoInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::InvalidImage`] if the image has zero area.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::NoInput);
    }

    let img = image::load_from_memory(bytes)?;
    check_geometry(img.width(), img.height())?;

    Ok(if img.color().has_color() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        DynamicImage::ImageLuma8(img.to_luma8())
    })
}

/// Reduce an 8-bit gray or RGB raster to single-channel intensity.
///
/// RGB input is combined with BT.601 luma weights
/// (`0.299*R + 0.587*G + 0.114*B`, rounded). Gray input is returned as
/// an independent copy with identical values.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] for zero-area images and for
/// any channel layout other than 8-bit gray or 8-bit RGB.
pub fn to_intensity(image: &DynamicImage) -> Result<GrayImage, PipelineError> {
    check_geometry(image.width(), image.height())?;

    match image {
        DynamicImage::ImageLuma8(gray) => Ok(gray.clone()),
        DynamicImage::ImageRgb8(rgb) => Ok(luma_from_rgb(rgb)),
        other => Err(PipelineError::InvalidImage(format!(
            "unsupported channel layout {:?} ({} channels); expected 8-bit gray or RGB",
            other.color(),
            other.color().channel_count(),
        ))),
    }
}

/// Convert an accepted raster to 8-bit RGB. Gray input is replicated
/// into three channels.
///
/// # Errors
///
/// Same as [`to_intensity`].
pub fn to_rgb(image: &DynamicImage) -> Result<RgbImage, PipelineError> {
    check_geometry(image.width(), image.height())?;

    match image {
        DynamicImage::ImageRgb8(rgb) => Ok(rgb.clone()),
        DynamicImage::ImageLuma8(gray) => Ok(crate::composite::promote_to_rgb(gray)),
        other => Err(PipelineError::InvalidImage(format!(
            "unsupported channel layout {:?} ({} channels); expected 8-bit gray or RGB",
            other.color(),
            other.color().channel_count(),
        ))),
    }
}

pub(crate) fn luma_from_rgb(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let weighted = u32::from(r) * LUMA_WEIGHTS[0]
            + u32::from(g) * LUMA_WEIGHTS[1]
            + u32::from(b) * LUMA_WEIGHTS[2];
        let rounded = (weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT;
        image::Luma([u8::try_from(rounded).unwrap_or(u8::MAX)])
    })
}

fn check_geometry(width: u32, height: u32) -> Result<(), PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "image has zero area ({width}x{height})"
        )));
    }
    Ok(())
}
