//! Integration test: render synthetic photographs through the full
//! pipeline and check the properties every sketch must have.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pencilmark_pipeline::composite::promote_to_rgb;
use pencilmark_pipeline::edge::EDGE;
use pencilmark_pipeline::{
    DynamicImage, EdgeMethod, PipelineError, RgbImage, SketchParams, SmoothingMethod,
    ThresholdCorrection,
};

/// A color "photo": a bright vertical sky gradient, a dark disc, a dark
/// green block, and a little deterministic texture.
fn synthetic_photo(width: u32, height: u32) -> DynamicImage {
    let cx = f64::from(width) * 0.35;
    let cy = f64::from(height) * 0.45;
    let r = f64::from(width.min(height)) * 0.2;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let grain = u8::try_from((x * 7 + y * 13) % 5).unwrap();
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        if dx.hypot(dy) < r {
            image::Rgb([35 + grain, 25, 30])
        } else if x > width * 3 / 5 && y > height / 2 {
            image::Rgb([20, 70 + grain, 25])
        } else {
            let sky = u8::try_from(150 + y * 100 / height).unwrap();
            image::Rgb([sky - 30 + grain, sky - 10, sky])
        }
    }))
}

fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[test]
fn photo_with_default_controls() {
    let photo = synthetic_photo(400, 300);
    let params = SketchParams {
        smoothing_method: SmoothingMethod::Bilateral,
        kernel_radius: 15,
        color_sigma: 75,
        edge_method: EdgeMethod::Canny,
        canny_low: 50,
        canny_high: 150,
    };

    let staged = pencilmark_pipeline::render_sketch_staged(&photo, &params).unwrap();
    assert_eq!(staged.sketch.dimensions(), (400, 300));
    assert!(!staged.fallback, "expected edges on the disc and block outlines");
    assert!(staged.correction.is_none());

    let mut edge_pixels = 0_u32;
    for (x, y, mask) in staged.edges.enumerate_pixels() {
        if mask.0[0] != EDGE {
            continue;
        }
        edge_pixels += 1;
        let smoothed = staged.smoothed.get_pixel(x, y).0[0];
        let [r, g, b] = staged.sketch.get_pixel(x, y).0;
        assert!(r == g && g == b, "unequal channels at ({x},{y})");
        assert!(
            r <= smoothed,
            "sketch brighter than smoothed at edge ({x},{y}): {r} > {smoothed}"
        );
    }
    assert!(edge_pixels > 100, "only {edge_pixels} edge pixels found");

    // Background pixels beside a stroke are paper: the inverted mask is
    // 255 there, so any non-black smoothed value dodges to white.
    let (width, height) = staged.edges.dimensions();
    let mut neighbours = 0_u32;
    for (x, y, mask) in staged.edges.enumerate_pixels() {
        if mask.0[0] == EDGE || !touches_edge(&staged.edges, x, y) {
            continue;
        }
        neighbours += 1;
        let smoothed = staged.smoothed.get_pixel(x, y).0[0];
        let expected = if smoothed == 0 { 0 } else { 255 };
        assert_eq!(
            staged.sketch.get_pixel(x, y).0,
            [expected; 3],
            "edge neighbour ({x},{y}) of {width}x{height}"
        );
    }
    assert!(neighbours > edge_pixels / 2, "only {neighbours} edge neighbours");
}

/// Whether any 8-neighbour of `(x, y)` is an edge pixel.
fn touches_edge(edges: &pencilmark_pipeline::GrayImage, x: u32, y: u32) -> bool {
    (-1_i64..=1)
        .flat_map(|dy| (-1_i64..=1).map(move |dx| (dx, dy)))
        .filter(|&offset| offset != (0, 0))
        .filter_map(|(dx, dy)| {
            let nx = u32::try_from(i64::from(x) + dx).ok()?;
            let ny = u32::try_from(i64::from(y) + dy).ok()?;
            (nx < edges.width() && ny < edges.height()).then_some((nx, ny))
        })
        .any(|(nx, ny)| edges.get_pixel(nx, ny).0[0] == EDGE)
}

#[test]
fn rendering_is_deterministic() {
    let photo = synthetic_photo(120, 90);
    for edge_method in EdgeMethod::ALL {
        let params = SketchParams {
            edge_method,
            ..SketchParams::default()
        };
        let a = pencilmark_pipeline::render_sketch(&photo, &params).unwrap();
        let b = pencilmark_pipeline::render_sketch(&photo, &params).unwrap();
        assert_eq!(a.image.as_raw(), b.image.as_raw(), "{edge_method}");
    }
}

#[test]
fn every_method_combination_keeps_shape() {
    let photo = synthetic_photo(64, 48);
    let gray = DynamicImage::ImageLuma8(photo.to_luma8());
    for input in [&photo, &gray] {
        for smoothing_method in SmoothingMethod::ALL {
            for edge_method in EdgeMethod::ALL {
                let params = SketchParams {
                    smoothing_method,
                    edge_method,
                    kernel_radius: 5,
                    ..SketchParams::default()
                };
                let output = pencilmark_pipeline::render_sketch(input, &params).unwrap();
                assert_eq!(
                    output.image.dimensions(),
                    (64, 48),
                    "{smoothing_method}/{edge_method}"
                );
            }
        }
    }
}

#[test]
fn inverted_thresholds_are_corrected_not_rejected() {
    let photo = synthetic_photo(80, 60);
    let params = SketchParams {
        canny_low: 200,
        canny_high: 100,
        ..SketchParams::default()
    };
    let output = pencilmark_pipeline::render_sketch(&photo, &params).unwrap();
    assert_eq!(output.params.canny_low, 99);
    assert_eq!(
        output.correction,
        Some(ThresholdCorrection {
            requested_low: 200,
            applied_low: 99,
        })
    );
}

#[test]
fn flat_photo_falls_back_to_smoothed_image() {
    let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 40, image::Rgb([90, 160, 200])));
    for smoothing_method in SmoothingMethod::ALL {
        for edge_method in EdgeMethod::ALL {
            let params = SketchParams {
                smoothing_method,
                edge_method,
                ..SketchParams::default()
            };
            let staged = pencilmark_pipeline::render_sketch_staged(&flat, &params).unwrap();
            assert!(staged.fallback, "{smoothing_method}/{edge_method}");
            assert_eq!(staged.sketch, promote_to_rgb(&staged.smoothed));
        }
    }
}

#[test]
fn encoded_bytes_render_like_decoded_image() {
    let photo = synthetic_photo(100, 80);
    let bytes = encode_png(&photo);
    let from_bytes =
        pencilmark_pipeline::render_sketch_bytes(&bytes, &SketchParams::default()).unwrap();
    let from_image = pencilmark_pipeline::render_sketch(&photo, &SketchParams::default()).unwrap();
    assert_eq!(from_bytes.image, from_image.image);
}

#[test]
fn missing_image_is_idle_not_an_error() {
    let nothing = pencilmark_pipeline::render_optional(None, &SketchParams::default()).unwrap();
    assert!(nothing.is_none());
    assert!(matches!(
        pencilmark_pipeline::render_sketch_bytes(&[], &SketchParams::default()),
        Err(PipelineError::NoInput)
    ));
}
