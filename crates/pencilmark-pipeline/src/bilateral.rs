//! Edge-preserving bilateral smoothing for single-channel images.
//!
//! Each output pixel is a weighted mean over a circular neighborhood.
//! A neighbor's weight is the product of a spatial Gaussian (distance
//! from the center) and a range Gaussian (intensity difference from
//! the center), so pixels across a strong step contribute almost
//! nothing and the step survives while flat-region noise is averaged
//! away.
//!
//! Borders are handled by mirror reflection without repeating the
//! edge pixel (`dcb|abcd|cba`).
//!
//! `imageproc::filter::bilateral_filter` samples the full square window
//! and replicates border pixels, so it weighs the window corners and
//! the image rim differently and is not used here.

use image::GrayImage;

/// Largest neighborhood diameter. Larger requests are clamped to it.
pub const MAX_DIAMETER: u32 = 51;

/// Window radius for a requested neighborhood `diameter`.
const fn window_radius(diameter: u32) -> u32 {
    let diameter = if diameter > MAX_DIAMETER {
        MAX_DIAMETER
    } else {
        diameter
    };
    diameter / 2
}

/// Side length of the square enclosing the circular window for a
/// requested neighborhood `diameter`.
///
/// The window radius is `diameter / 2`, so even diameters round down
/// to the next odd side and a diameter of 1 (or 0) is a single pixel.
/// Diameters above [`MAX_DIAMETER`] are clamped.
#[must_use]
pub const fn window_diameter(diameter: u32) -> u32 {
    window_radius(diameter) * 2 + 1
}

/// Apply a bilateral filter.
///
/// `diameter` is the neighborhood diameter in pixels, at most
/// [`MAX_DIAMETER`]; the window radius is `diameter / 2`.
/// `sigma_color` controls how quickly weight falls off with intensity
/// difference and `sigma_space` how quickly it falls off with
/// distance. Non-positive sigmas are treated as 1.
///
/// A window radius of zero returns the image unchanged.
#[must_use = "returns the filtered image"]
pub fn bilateral_filter(
    image: &GrayImage,
    diameter: u32,
    sigma_color: f64,
    sigma_space: f64,
) -> GrayImage {
    let radius = i64::from(window_radius(diameter));
    if radius == 0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let sigma_color = if sigma_color > 0.0 { sigma_color } else { 1.0 };
    let sigma_space = if sigma_space > 0.0 { sigma_space } else { 1.0 };
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    // Range weights for every possible absolute intensity difference.
    let range_weights: Vec<f64> = (0..=u8::MAX)
        .map(|d| {
            let d = f64::from(d);
            (d * d * color_coeff).exp()
        })
        .collect();

    let offsets = window_offsets(radius, space_coeff);
    let (width, height) = image.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y).0[0];
        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for &(dx, dy, space_weight) in &offsets {
            let sx = reflect_101(i64::from(x) + dx, width);
            let sy = reflect_101(i64::from(y) + dy, height);
            let value = image.get_pixel(sx, sy).0[0];
            let weight = space_weight * range_weights[usize::from(value.abs_diff(center))];
            sum += weight * f64::from(value);
            weight_sum += weight;
        }
        // The center offset always contributes weight 1.
        image::Luma([round_to_u8(sum / weight_sum)])
    })
}

/// Offsets inside the circular window of `radius`, with their spatial
/// weights.
fn window_offsets(radius: i64, space_coeff: f64) -> Vec<(i64, i64, f64)> {
    #[allow(clippy::cast_precision_loss)]
    let max_dist_sq = (radius * radius) as f64;
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            #[allow(clippy::cast_precision_loss)]
            let dist_sq = (dx * dx + dy * dy) as f64;
            if dist_sq > max_dist_sq {
                continue;
            }
            offsets.push((dx, dy, (dist_sq * space_coeff).exp()));
        }
    }
    offsets
}

/// Map an out-of-range coordinate back into `0..len` by reflection
/// about the edge pixels.
fn reflect_101(index: i64, len: u32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let len = i64::from(len);
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    u32::try_from(i).unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
