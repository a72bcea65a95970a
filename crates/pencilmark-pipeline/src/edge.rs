//! Edge extraction: binary edge masks from a smoothed intensity image.
//!
//! Every detector produces the same polarity: [`EDGE`] (255) on edge
//! pixels and [`BACKGROUND`] (0) elsewhere. The compositor inverts the
//! mask once, for all methods alike.
//!
//! - [`EdgeMethod::Canny`]: gradient, non-maximum suppression and
//!   hysteresis (see [`crate::canny`]).
//! - [`EdgeMethod::Sobel`]: first-derivative magnitude, rescaled to
//!   0..=255 and thresholded at [`SOBEL_THRESHOLD`].
//! - [`EdgeMethod::Laplacian`]: absolute second-derivative response,
//!   rescaled to 0..=255 and thresholded at [`LAPLACIAN_THRESHOLD`].

use std::fmt;
use std::str::FromStr;

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel::{self, Kernel};
use serde::{Deserialize, Serialize};

use crate::smooth::UnknownMethod;
use crate::types::SketchParams;

/// Mask value of an edge pixel.
pub const EDGE: u8 = 255;

/// Mask value of a background pixel.
pub const BACKGROUND: u8 = 0;

/// Rescaled Sobel magnitude at or above which a pixel is an edge.
pub const SOBEL_THRESHOLD: u8 = 100;

/// Rescaled Laplacian response at or above which a pixel is an edge.
pub const LAPLACIAN_THRESHOLD: u8 = 80;

/// 3x3 Laplacian aperture `[2 0 2; 0 -8 0; 2 0 2]`.
const LAPLACIAN_3X3: [i32; 9] = [2, 0, 2, 0, -8, 0, 2, 0, 2];

/// Selects which edge detector builds the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EdgeMethod {
    /// Dual-threshold hysteresis detector using `canny_low`/`canny_high`.
    #[default]
    Canny,
    /// Thresholded first-derivative gradient magnitude.
    Sobel,
    /// Thresholded second-derivative response.
    Laplacian,
}

impl EdgeMethod {
    /// Every variant, in display order.
    pub const ALL: [Self; 3] = [Self::Canny, Self::Sobel, Self::Laplacian];
}

impl fmt::Display for EdgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Canny => "Canny",
            Self::Sobel => "Sobel",
            Self::Laplacian => "Laplacian",
        })
    }
}

impl FromStr for EdgeMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod {
                stage: "edge",
                name: s.to_string(),
            })
    }
}

/// Trait for edge detection strategies.
///
/// Input: a smoothed intensity image and the effective parameters.
/// Output: a binary mask of the same dimensions ([`EDGE`] / [`BACKGROUND`]).
pub trait EdgeDetector {
    /// Detect edges in the given intensity image.
    fn detect(&self, image: &GrayImage, params: &SketchParams) -> GrayImage;
}

impl EdgeDetector for EdgeMethod {
    fn detect(&self, image: &GrayImage, params: &SketchParams) -> GrayImage {
        match *self {
            Self::Canny => canny(image, params.canny_low, params.canny_high),
            Self::Sobel => sobel(image),
            Self::Laplacian => laplacian(image),
        }
    }
}

/// Detect edges using the Canny algorithm.
///
/// The thresholds are used exactly as given. A `low_threshold` at or
/// above `high_threshold` is well defined: only strong pixels survive,
/// the same mask as `low == high`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: u8, high_threshold: u8) -> GrayImage {
    crate::canny::canny(image, f32::from(low_threshold), f32::from(high_threshold))
}

/// Sobel gradient magnitude, rescaled and thresholded at
/// [`SOBEL_THRESHOLD`].
#[must_use = "returns the binary edge map"]
pub fn sobel(image: &GrayImage) -> GrayImage {
    threshold_rescaled(&gradient_magnitude(image), SOBEL_THRESHOLD)
}

/// Sobel L2 gradient magnitude without rescaling, rounded and
/// saturated to 0..=255.
///
/// A step of 64 levels or more already saturates. Used by the fixed
/// styles, whose outline thresholds compare against this absolute
/// scale.
#[must_use = "returns the magnitude image"]
pub fn sobel_magnitude(image: &GrayImage) -> GrayImage {
    let magnitude = gradient_magnitude(image);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let saturated = magnitude.get_pixel(x, y).0[0].round().min(255.0) as u8;
        Luma([saturated])
    })
}

fn gradient_magnitude(image: &GrayImage) -> Image<Luma<f32>> {
    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    Image::from_fn(image.width(), image.height(), |x, y| {
        let h = f32::from(gx.get_pixel(x, y).0[0]);
        let v = f32::from(gy.get_pixel(x, y).0[0]);
        Luma([h.hypot(v)])
    })
}

/// Absolute Laplacian response, rescaled and thresholded at
/// [`LAPLACIAN_THRESHOLD`].
#[must_use = "returns the binary edge map"]
pub fn laplacian(image: &GrayImage) -> GrayImage {
    let response: Image<Luma<i16>> = filter_clamped(image, Kernel::new(&LAPLACIAN_3X3, 3, 3));
    let magnitude = Image::from_fn(image.width(), image.height(), |x, y| {
        Luma([f32::from(response.get_pixel(x, y).0[0]).abs()])
    });
    threshold_rescaled(&magnitude, LAPLACIAN_THRESHOLD)
}

/// Linearly rescale `values` so their minimum maps to 0 and maximum to
/// 255 (rounded), then mark every pixel at or above `threshold` as an
/// edge.
///
/// A constant field has no range to stretch and rescales to all zero,
/// so it yields no edges for any positive threshold.
#[must_use]
pub fn threshold_rescaled(values: &Image<Luma<f32>>, threshold: u8) -> GrayImage {
    let (min, max) = values
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.0[0]), hi.max(p.0[0]))
        });
    let range = max - min;
    let scale = if range > f32::EPSILON {
        255.0 / range
    } else {
        0.0
    };
    let threshold = f32::from(threshold);

    GrayImage::from_fn(values.width(), values.height(), |x, y| {
        let rescaled = ((values.get_pixel(x, y).0[0] - min) * scale).round();
        if rescaled >= threshold {
            Luma([EDGE])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Invert a binary edge map (bitwise NOT).
///
/// Swaps edge pixels (255 → 0) and background pixels (0 → 255).
#[must_use = "returns the inverted edge map"]
pub fn invert_edge_map(edges: &GrayImage) -> GrayImage {
    GrayImage::from_fn(edges.width(), edges.height(), |x, y| {
        Luma([!edges.get_pixel(x, y).0[0]])
    })
}

/// Whether the mask contains at least one non-background pixel.
#[must_use]
pub fn has_edges(edges: &GrayImage) -> bool {
    edges.pixels().any(|p| p.0[0] != BACKGROUND)
}
