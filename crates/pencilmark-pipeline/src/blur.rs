//! Gaussian blur with an explicit kernel size.
//!
//! The kernel side length comes from the caller's `kernel_radius`
//! setting rather than from a sigma: it is clamped into
//! [`MIN_KERNEL_SIZE`]`..=`[`MAX_KERNEL_SIZE`] and bumped to the next
//! odd number so the kernel has a center pixel. The
//! standard deviation is then derived from that size.
//!
//! The blur is separable, so it runs as a horizontal and a vertical
//! 1-D pass via [`imageproc::filter::separable_filter_equal`].

use image::GrayImage;

/// Smallest Gaussian kernel side length.
pub const MIN_KERNEL_SIZE: u32 = 3;
const _: () = assert!(MIN_KERNEL_SIZE % 2 == 1);

/// Largest Gaussian kernel side length.
pub const MAX_KERNEL_SIZE: u32 = 51;
const _: () = assert!(MAX_KERNEL_SIZE % 2 == 1);

/// Kernel side length used for a requested `kernel_radius`.
///
/// Clamped into [`MIN_KERNEL_SIZE`]`..=`[`MAX_KERNEL_SIZE`], then
/// forced odd.
#[must_use]
pub const fn gaussian_kernel_size(kernel_radius: u32) -> u32 {
    let size = if kernel_radius < MIN_KERNEL_SIZE {
        MIN_KERNEL_SIZE
    } else if kernel_radius > MAX_KERNEL_SIZE {
        MAX_KERNEL_SIZE
    } else {
        kernel_radius
    };
    if size % 2 == 0 { size + 1 } else { size }
}

/// Standard deviation derived from a kernel side length:
/// `0.3 * ((size - 1) / 2 - 1) + 0.8`.
#[must_use]
pub fn sigma_for_kernel_size(size: u32) -> f64 {
    0.3f64.mul_add((f64::from(size) - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian kernel of odd length `size`, at most
/// [`MAX_KERNEL_SIZE`].
#[must_use]
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.min(MAX_KERNEL_SIZE);
    let sigma = sigma_for_kernel_size(size);
    let scale = -0.5 / (sigma * sigma);
    let center = f64::from(size / 2);
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = f64::from(i) - center;
            (d * d * scale).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    #[allow(clippy::cast_possible_truncation)]
    weights.iter().map(|w| (w / total) as f32).collect()
}

/// Blur a grayscale image with the Gaussian kernel selected by
/// `kernel_radius` (see [`gaussian_kernel_size`]).
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, kernel_radius: u32) -> GrayImage {
    let kernel = gaussian_kernel(gaussian_kernel_size(kernel_radius));
    imageproc::filter::separable_filter_equal(image, &kernel)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn kernel_size_is_odd_and_at_least_three() {
        assert_eq!(gaussian_kernel_size(0), 3);
        assert_eq!(gaussian_kernel_size(1), 3);
        assert_eq!(gaussian_kernel_size(2), 3);
        assert_eq!(gaussian_kernel_size(3), 3);
        assert_eq!(gaussian_kernel_size(4), 5);
        assert_eq!(gaussian_kernel_size(10), 11);
        assert_eq!(gaussian_kernel_size(15), 15);
    }

    #[test]
    fn kernel_size_is_capped() {
        assert_eq!(gaussian_kernel_size(50), MAX_KERNEL_SIZE);
        assert_eq!(gaussian_kernel_size(1_000_001), MAX_KERNEL_SIZE);
        assert_eq!(gaussian_kernel_size(u32::MAX), MAX_KERNEL_SIZE);
        assert_eq!(gaussian_kernel(u32::MAX).len(), 51);
    }

    #[test]
    fn huge_kernel_request_blurs_like_the_cap() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur(&img, u32::MAX), gaussian_blur(&img, MAX_KERNEL_SIZE));
    }

    #[test]
    fn sigma_follows_kernel_size() {
        assert!((sigma_for_kernel_size(3) - 0.8).abs() < 1e-12);
        assert!((sigma_for_kernel_size(5) - 1.1).abs() < 1e-12);
        assert!((sigma_for_kernel_size(11) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn kernel_has_requested_length_and_unit_sum() {
        let kernel = gaussian_kernel(11);
        assert_eq!(kernel.len(), 11);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "kernel sum = {sum}");
    }

    #[test]
    fn kernel_is_symmetric_and_peaks_at_center() {
        let kernel = gaussian_kernel(7);
        for i in 0..3 {
            assert!((kernel[i] - kernel[6 - i]).abs() < 1e-7);
            assert!(kernel[i] < kernel[i + 1]);
        }
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let blurred = gaussian_blur(&img, 10);
        assert_eq!(blurred.dimensions(), (17, 31));
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let img = sharp_edge_image();
        let blurred = gaussian_blur(&img, 5);

        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];

        assert!(
            left_of_edge > 0,
            "expected blur to raise left-of-edge above 0, got {left_of_edge}",
        );
        assert!(
            right_of_edge < 255,
            "expected blur to lower right-of-edge below 255, got {right_of_edge}",
        );
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = GrayImage::from_fn(10, 10, |_, _| image::Luma([128]));
        let blurred = gaussian_blur(&img, 7);
        for pixel in blurred.pixels() {
            let diff = i16::from(pixel.0[0]) - 128;
            assert!(
                diff.abs() <= 1,
                "expected uniform image to stay near 128 after blur, got {}",
                pixel.0[0],
            );
        }
    }

    #[test]
    fn larger_kernel_blurs_more() {
        let img = sharp_edge_image();
        let small = gaussian_blur(&img, 3).get_pixel(3, 5).0[0];
        let large = gaussian_blur(&img, 9).get_pixel(3, 5).0[0];
        assert!(large > small, "expected {large} > {small}");
    }
}
