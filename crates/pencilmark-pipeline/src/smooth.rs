//! Smoothing stage: noise reduction before edge extraction.
//!
//! This module defines the [`Smoother`] trait and the
//! [`SmoothingMethod`] enum for selecting the filter at runtime.
//!
//! # Strategy pattern
//!
//! The filter is a closed set, so `match` on the enum is checked for
//! exhaustiveness and each variant can be tested on its own. Adding a
//! filter means adding a variant, not a new string key.

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::SketchParams;

/// Selects which smoothing filter runs before edge extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SmoothingMethod {
    /// No smoothing: the intensity image passes through as a copy.
    None,
    /// Edge-preserving bilateral filter. Neighborhood diameter is
    /// `kernel_radius`; `color_sigma` drives both the intensity and the
    /// spatial falloff.
    #[default]
    Bilateral,
    /// Isotropic Gaussian blur with an odd kernel side of at least 3
    /// derived from `kernel_radius`.
    Gaussian,
}

impl SmoothingMethod {
    /// Every variant, in display order.
    pub const ALL: [Self; 3] = [Self::None, Self::Bilateral, Self::Gaussian];

    /// Effective kernel side length this method uses for `kernel_radius`.
    ///
    /// `None` for the identity filter.
    #[must_use]
    pub const fn kernel_size(self, kernel_radius: u32) -> Option<u32> {
        match self {
            Self::None => None,
            Self::Bilateral => Some(crate::bilateral::window_diameter(kernel_radius)),
            Self::Gaussian => Some(crate::blur::gaussian_kernel_size(kernel_radius)),
        }
    }
}

impl fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "None",
            Self::Bilateral => "Bilateral",
            Self::Gaussian => "Gaussian",
        })
    }
}

impl FromStr for SmoothingMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod {
                stage: "smoothing",
                name: s.to_string(),
            })
    }
}

/// A method name that does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {stage} method '{name}'")]
pub struct UnknownMethod {
    /// Which stage the name was meant for.
    pub stage: &'static str,
    /// The unrecognized name.
    pub name: String,
}

/// Trait for smoothing strategies.
///
/// Input: a single-channel intensity image and the effective
/// parameters. Output: a new image of the same dimensions.
pub trait Smoother {
    /// Smooth the given intensity image.
    fn smooth(&self, image: &GrayImage, params: &SketchParams) -> GrayImage;
}

impl Smoother for SmoothingMethod {
    fn smooth(&self, image: &GrayImage, params: &SketchParams) -> GrayImage {
        match *self {
            Self::None => image.clone(),
            Self::Bilateral => {
                let sigma = f64::from(params.color_sigma);
                crate::bilateral::bilateral_filter(image, params.kernel_radius, sigma, sigma)
            }
            Self::Gaussian => crate::blur::gaussian_blur(image, params.kernel_radius),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| {
            if x < 10 {
                image::Luma([20])
            } else {
                image::Luma([230])
            }
        })
    }

    #[test]
    fn default_is_bilateral() {
        assert_eq!(SmoothingMethod::default(), SmoothingMethod::Bilateral);
    }

    #[test]
    fn none_is_identity() {
        let img = sharp_edge_image();
        let out = SmoothingMethod::None.smooth(&img, &SketchParams::default());
        assert_eq!(out, img);
    }

    #[test]
    fn every_method_preserves_dimensions() {
        let img = GrayImage::new(13, 7);
        for method in SmoothingMethod::ALL {
            let out = method.smooth(&img, &SketchParams::default());
            assert_eq!(out.dimensions(), (13, 7), "{method}");
        }
    }

    #[test]
    fn gaussian_softens_step_more_than_bilateral() {
        let img = sharp_edge_image();
        let params = SketchParams {
            kernel_radius: 9,
            color_sigma: 30,
            ..SketchParams::default()
        };
        let gaussian = SmoothingMethod::Gaussian.smooth(&img, &params);
        let bilateral = SmoothingMethod::Bilateral.smooth(&img, &params);

        // Just left of the step, the Gaussian pulls the dark side up
        // while the bilateral filter keeps it close to 20.
        let g = gaussian.get_pixel(9, 10).0[0];
        let b = bilateral.get_pixel(9, 10).0[0];
        assert!(g > 40, "gaussian should blur the step, got {g}");
        assert!(b < 25, "bilateral should preserve the step, got {b}");
    }

    #[test]
    fn kernel_size_per_method() {
        assert_eq!(SmoothingMethod::None.kernel_size(10), None);
        assert_eq!(SmoothingMethod::Gaussian.kernel_size(10), Some(11));
        assert_eq!(SmoothingMethod::Bilateral.kernel_size(10), Some(11));
    }

    #[test]
    fn display_and_parse_agree() {
        for method in SmoothingMethod::ALL {
            assert_eq!(method.to_string().parse::<SmoothingMethod>().unwrap(), method);
        }
        assert_eq!(
            "gaussian".parse::<SmoothingMethod>().unwrap(),
            SmoothingMethod::Gaussian
        );
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "median".parse::<SmoothingMethod>().unwrap_err();
        assert_eq!(err.to_string(), "unknown smoothing method 'median'");
    }
}
