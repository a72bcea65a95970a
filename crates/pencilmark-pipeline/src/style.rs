//! Fixed artistic styles, rendered alongside the configurable sketch.
//!
//! Each style is a short recipe over a color image:
//!
//! - [`ArtStyle::Cartoon`]: light color bilateral smoothing, then black
//!   outlines wherever the Sobel magnitude exceeds `edge_strength`.
//! - [`ArtStyle::Pencil`]: the grayscale image dodged by a 5x5 box blur
//!   of its own negative.
//! - [`ArtStyle::Watercolor`]: heavy color bilateral smoothing, then
//!   every channel posterized to steps of [`POSTERIZE_STEP`].
//! - [`ArtStyle::Edge`]: black Sobel outlines on white, thresholded at
//!   `gray_level`.
//!
//! Unlike the sketch pipeline, which keeps the input size, styles first
//! fit the image inside [`StyleParams::fit_within`] (aspect ratio
//! preserved, never upscaled).
//!
//! Color smoothing uses [`imageproc::filter::bilateral_filter`] with a
//! Euclidean RGB distance: a square window with replicated borders.

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::bilateral::GaussianEuclideanColorDistance;
use imageproc::filter::{bilateral_filter, box_filter};
use serde::{Deserialize, Serialize};

use crate::composite::promote_to_rgb;
use crate::edge::sobel_magnitude;
use crate::grayscale::{luma_from_rgb, to_rgb};
use crate::smooth::UnknownMethod;
use crate::types::{Dimensions, PipelineError};

/// Window radius of the cartoon smoothing pass (9x9).
pub const CARTOON_RADIUS: u8 = 4;
/// Spatial and color sigma of the cartoon smoothing pass.
pub const CARTOON_SIGMA: f32 = 75.0;
/// Window radius of the watercolor smoothing pass (15x15).
pub const WATERCOLOR_RADIUS: u8 = 7;
/// Spatial and color sigma of the watercolor smoothing pass.
pub const WATERCOLOR_SIGMA: f32 = 100.0;
/// Box blur radius of the pencil style (5x5).
pub const PENCIL_BLUR_RADIUS: u32 = 2;
/// Channel quantization step of the watercolor style.
pub const POSTERIZE_STEP: u8 = 20;

/// Selects a fixed rendering recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArtStyle {
    /// Smoothed colors with black outlines.
    #[default]
    Cartoon,
    /// Grayscale color-dodge pencil drawing.
    Pencil,
    /// Strongly smoothed, posterized colors.
    Watercolor,
    /// Black outlines on white.
    Edge,
}

impl ArtStyle {
    /// Every variant, in display order.
    pub const ALL: [Self; 4] = [Self::Cartoon, Self::Pencil, Self::Watercolor, Self::Edge];

    /// Render `rgb` in this style. `params` should already be
    /// [corrected](StyleParams::corrected).
    #[must_use = "returns the styled image"]
    pub fn apply(self, rgb: &RgbImage, params: &StyleParams) -> RgbImage {
        match self {
            Self::Cartoon => cartoon(rgb, params.edge_strength),
            Self::Pencil => promote_to_rgb(&pencil(&luma_from_rgb(rgb))),
            Self::Watercolor => watercolor(rgb),
            Self::Edge => promote_to_rgb(&edge_outline(&luma_from_rgb(rgb), params.gray_level)),
        }
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cartoon => "Cartoon",
            Self::Pencil => "Pencil",
            Self::Watercolor => "Watercolor",
            Self::Edge => "Edge",
        })
    }
}

impl FromStr for ArtStyle {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod {
                stage: "style",
                name: s.to_string(),
            })
    }
}

/// Parameters for a fixed-style rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleParams {
    /// Which recipe to run.
    pub style: ArtStyle,

    /// Cartoon outline threshold on the absolute Sobel magnitude.
    /// Effective range is
    /// [`MIN_EDGE_STRENGTH`](Self::MIN_EDGE_STRENGTH)`..=`[`MAX_EDGE_STRENGTH`](Self::MAX_EDGE_STRENGTH).
    pub edge_strength: u8,

    /// Edge-style outline threshold on the absolute Sobel magnitude.
    pub gray_level: u8,

    /// Bounding box the input is downscaled to fit before rendering.
    /// `None` renders at full size.
    pub fit_within: Option<Dimensions>,
}

impl StyleParams {
    /// Default style.
    pub const DEFAULT_STYLE: ArtStyle = ArtStyle::Cartoon;
    /// Default cartoon outline threshold.
    pub const DEFAULT_EDGE_STRENGTH: u8 = 50;
    /// Smallest cartoon outline threshold.
    pub const MIN_EDGE_STRENGTH: u8 = 10;
    /// Largest cartoon outline threshold.
    pub const MAX_EDGE_STRENGTH: u8 = 100;
    /// Default edge-style threshold.
    pub const DEFAULT_GRAY_LEVEL: u8 = 128;
    /// Default working-size bound.
    pub const DEFAULT_FIT_WITHIN: Option<Dimensions> = Some(Dimensions::new(800, 600));

    /// The record actually rendered: `edge_strength` clamped into its
    /// range.
    #[must_use]
    pub fn corrected(&self) -> Self {
        Self {
            edge_strength: self
                .edge_strength
                .clamp(Self::MIN_EDGE_STRENGTH, Self::MAX_EDGE_STRENGTH),
            ..*self
        }
    }
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            style: Self::DEFAULT_STYLE,
            edge_strength: Self::DEFAULT_EDGE_STRENGTH,
            gray_level: Self::DEFAULT_GRAY_LEVEL,
            fit_within: Self::DEFAULT_FIT_WITHIN,
        }
    }
}

/// Result of a fixed-style rendering.
#[derive(Debug, Clone)]
pub struct StyleOutput {
    /// The 3-channel styled image, at the working size.
    pub image: RgbImage,
    /// The effective parameters (after correction).
    pub params: StyleParams,
    /// Whether the input was downscaled to fit `params.fit_within`.
    pub downscaled: bool,
}

/// Downscale `image` so it fits inside `bounds`, preserving aspect
/// ratio.
///
/// Returns the (possibly unchanged) image and whether resizing was
/// applied. Images already inside the bounds are never upscaled.
#[must_use]
pub fn fit_within(image: &DynamicImage, bounds: Dimensions) -> (DynamicImage, bool) {
    if image.width() <= bounds.width && image.height() <= bounds.height {
        return (image.clone(), false);
    }
    let resized = image.resize(
        bounds.width.max(1),
        bounds.height.max(1),
        FilterType::Triangle,
    );
    (resized, true)
}

/// Color bilateral smoothing over a `2 * radius + 1` square window.
fn smooth_color(rgb: &RgbImage, radius: u8, sigma: f32) -> RgbImage {
    bilateral_filter(rgb, radius, sigma, GaussianEuclideanColorDistance::new(sigma))
}

/// Cartoon style: smoothed colors, black where the smoothed image's
/// Sobel magnitude is above `edge_strength`.
#[must_use = "returns the styled image"]
pub fn cartoon(rgb: &RgbImage, edge_strength: u8) -> RgbImage {
    let smoothed = smooth_color(rgb, CARTOON_RADIUS, CARTOON_SIGMA);
    let magnitude = sobel_magnitude(&luma_from_rgb(&smoothed));
    RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        if magnitude.get_pixel(x, y).0[0] > edge_strength {
            Rgb([0, 0, 0])
        } else {
            *smoothed.get_pixel(x, y)
        }
    })
}

/// Pencil style: dodge `gray` by a box blur of its negative.
#[must_use = "returns the styled image"]
pub fn pencil(gray: &GrayImage) -> GrayImage {
    let mut negative = gray.clone();
    image::imageops::invert(&mut negative);
    let blurred = box_filter(&negative, PENCIL_BLUR_RADIUS, PENCIL_BLUR_RADIUS);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([pencil_dodge(
            gray.get_pixel(x, y).0[0],
            blurred.get_pixel(x, y).0[0],
        )])
    })
}

/// `min(255, gray * 256 / (256 - blurred_negative))`, rounded.
///
/// The divisor is at least 1 for every `u8` input.
#[must_use]
pub fn pencil_dodge(gray: u8, blurred_negative: u8) -> u8 {
    let divisor = 256 - u32::from(blurred_negative);
    let value = (u32::from(gray) * 256 + divisor / 2) / divisor;
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// Watercolor style: heavy smoothing, then [`posterize`] per channel.
#[must_use = "returns the styled image"]
pub fn watercolor(rgb: &RgbImage) -> RgbImage {
    let mut smoothed = smooth_color(rgb, WATERCOLOR_RADIUS, WATERCOLOR_SIGMA);
    for pixel in smoothed.pixels_mut() {
        pixel.0 = pixel.0.map(posterize);
    }
    smoothed
}

/// Round a channel value down to a multiple of [`POSTERIZE_STEP`].
#[must_use]
pub const fn posterize(value: u8) -> u8 {
    value / POSTERIZE_STEP * POSTERIZE_STEP
}

/// Edge style: 0 where the Sobel magnitude is above `gray_level`, 255
/// elsewhere.
#[must_use = "returns the outline image"]
pub fn edge_outline(gray: &GrayImage, gray_level: u8) -> GrayImage {
    let magnitude = sobel_magnitude(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if magnitude.get_pixel(x, y).0[0] > gray_level {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// Fit, convert and style `image`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the image has zero area
/// or a channel layout other than 8-bit gray or 8-bit RGB.
pub fn render(image: &DynamicImage, params: &StyleParams) -> Result<StyleOutput, PipelineError> {
    let params = params.corrected();
    let (fitted, downscaled) = match params.fit_within {
        Some(bounds) => fit_within(image, bounds),
        None => (image.clone(), false),
    };
    let rgb = to_rgb(&fitted)?;
    tracing::debug!(
        style = %params.style,
        width = rgb.width(),
        height = rgb.height(),
        downscaled,
        "rendering style"
    );
    Ok(StyleOutput {
        image: params.style.apply(&rgb, &params),
        params,
        downscaled,
    })
}
