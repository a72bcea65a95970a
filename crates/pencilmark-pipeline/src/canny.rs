//! Canny edge detection on an already-smoothed intensity image.
//!
//! Structured like `imageproc::edges::canny`, with these differences:
//!
//! - **No internal blur.** Smoothing is a separate, user-selected
//!   stage, so the detector works on its input as given.
//! - **L1 gradient magnitude** (`|gx| + |gy|`), the scale the 0..=255
//!   threshold sliders are calibrated against.
//! - **Strict thresholds.** A pixel is a strong edge when its magnitude
//!   is *above* `high_threshold` and a weak candidate when *above*
//!   `low_threshold`, so a zero-gradient (flat) image never yields
//!   edges, even with zero thresholds.
//! - **Hysteresis fixes** from imageproc#705 / imageproc#746: all 8
//!   neighbors are followed and border neighbors are bounds-checked
//!   instead of underflowing.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::edge::{BACKGROUND, EDGE};

/// Run Canny edge detection.
///
/// Returns a binary image: [`EDGE`] for edge pixels, [`BACKGROUND`]
/// otherwise. With `low_threshold >= high_threshold` hysteresis adds
/// nothing and the mask holds only the strong pixels.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    // 1. Intensity of gradients.
    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    let g = Image::from_fn(image.width(), image.height(), |x, y| {
        let h = f32::from(gx.get_pixel(x, y).0[0]);
        let v = f32::from(gy.get_pixel(x, y).0[0]);
        Luma([h.abs() + v.abs()])
    });

    // 2. Non-maximum suppression (make edges thinner).
    let thinned = non_maximum_suppression(&g, &gx, &gy);

    // 3. Hysteresis to filter out edges based on thresholds.
    hysteresis(&thinned, low_threshold, high_threshold)
}

/// Gradient direction quantized to one of four neighbor axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Horizontal,
    Diagonal45,
    Vertical,
    Diagonal135,
}

impl Direction {
    fn from_gradient(gx: f32, gy: f32) -> Self {
        let mut angle = gy.atan2(gx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if (22.5..67.5).contains(&angle) {
            Self::Diagonal45
        } else if (67.5..112.5).contains(&angle) {
            Self::Vertical
        } else if (112.5..157.5).contains(&angle) {
            Self::Diagonal135
        } else {
            Self::Horizontal
        }
    }

    /// The two neighbors of `(x, y)` along this gradient direction.
    /// `(x, y)` must not lie on the image border.
    const fn neighbors(self, x: u32, y: u32) -> [(u32, u32); 2] {
        match self {
            Self::Horizontal => [(x - 1, y), (x + 1, y)],
            Self::Diagonal45 => [(x + 1, y + 1), (x - 1, y - 1)],
            Self::Vertical => [(x, y - 1), (x, y + 1)],
            Self::Diagonal135 => [(x - 1, y + 1), (x + 1, y - 1)],
        }
    }
}

/// Keep only pixels that are local maxima along their gradient
/// direction. Border pixels are always suppressed.
fn non_maximum_suppression(
    g: &Image<Luma<f32>>,
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
) -> Image<Luma<f32>> {
    let (width, height) = g.dimensions();
    let mut out = Image::from_pixel(width, height, Luma([0.0]));
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let direction = Direction::from_gradient(
                f32::from(gx.get_pixel(x, y).0[0]),
                f32::from(gy.get_pixel(x, y).0[0]),
            );
            let pixel = g.get_pixel(x, y).0[0];
            let is_max = direction
                .neighbors(x, y)
                .iter()
                .all(|&(nx, ny)| pixel >= g.get_pixel(nx, ny).0[0]);
            if is_max {
                out.put_pixel(x, y, Luma([pixel]));
            }
        }
    }
    out
}

/// Filter out edges with the thresholds.
/// Non-recursive depth-first trace from each strong pixel.
fn hysteresis(input: &Image<Luma<f32>>, low_thresh: f32, high_thresh: f32) -> GrayImage {
    let (width, height) = input.dimensions();
    let mut out = GrayImage::from_pixel(width, height, Luma([BACKGROUND]));
    let mut stack = Vec::new();

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            if input.get_pixel(x, y).0[0] <= high_thresh || out.get_pixel(x, y).0[0] == EDGE {
                continue;
            }
            out.put_pixel(x, y, Luma([EDGE]));
            stack.push((x, y));

            // Track neighbors until none is above low_thresh.
            while let Some((nx, ny)) = stack.pop() {
                let neighbors = [
                    (nx + 1, ny),
                    (nx + 1, ny + 1),
                    (nx, ny + 1),
                    (nx.wrapping_sub(1), ny.wrapping_sub(1)),
                    (nx.wrapping_sub(1), ny),
                    (nx.wrapping_sub(1), ny + 1),
                    (nx, ny.wrapping_sub(1)),
                    (nx + 1, ny.wrapping_sub(1)),
                ];
                for (px, py) in neighbors {
                    // wrapping_sub turns -1 into u32::MAX, caught here.
                    if px >= width || py >= height {
                        continue;
                    }
                    if input.get_pixel(px, py).0[0] > low_thresh
                        && out.get_pixel(px, py).0[0] == BACKGROUND
                    {
                        out.put_pixel(px, py, Luma([EDGE]));
                        stack.push((px, py));
                    }
                }
            }
        }
    }
    out
}
