//! Property tests for mask enhancement and compositing
//!
//! These exercise the per-pixel stages directly over small sweeps of inputs
//! instead of single hand-picked values.

use image::Rgba;
use imgly_maskcomp::{
    BackgroundColor, Compositor, EnhancedMask, ImageResizer, MaskEnhancer, MaskPolarity,
    PointInfluenceField, Point, Raster, RemovalSettings, SegmentationMask,
};

fn settings(threshold: f32, softness: f32, edge: f32, cleanup: bool) -> RemovalSettings {
    RemovalSettings::builder()
        .threshold(threshold)
        .softness(softness)
        .edge_enhancement(edge)
        .cleanup(cleanup)
        .build()
        .unwrap()
}

/// Deterministic pseudo-random scores in [0, 1]
fn noisy_mask(width: u32, height: u32, seed: u32) -> SegmentationMask {
    let scores = (0..width * height)
        .map(|i| {
            let mixed = i.wrapping_mul(2_654_435_761).wrapping_add(seed.wrapping_mul(40_503));
            (mixed >> 8) as f32 / (u32::MAX >> 8) as f32
        })
        .collect();
    SegmentationMask::new(width, height, scores).unwrap()
}

#[test]
fn test_enhanced_weights_stay_in_unit_interval() {
    for seed in 0..8 {
        let mask = noisy_mask(17, 11, seed);
        for &(t, s, e, cleanup) in &[
            (0.5, 0.0, 0.0, false),
            (0.35, 0.3, 0.4, true),
            (0.2, 0.15, 1.0, false),
            (0.9, 0.05, 0.7, true),
        ] {
            let enhanced = MaskEnhancer::new(&settings(t, s, e, cleanup)).enhance(&mask);
            assert_eq!(enhanced.dimensions(), mask.dimensions());
            assert!(enhanced
                .as_mask()
                .scores()
                .iter()
                .all(|w| (0.0..=1.0).contains(w)));
        }
    }
}

#[test]
fn test_soft_threshold_is_monotonic() {
    let enhancer = MaskEnhancer::new(&settings(0.4, 0.25, 0.0, false));
    let samples: Vec<f32> = (0..=200).map(|i| enhancer.soft_threshold(i as f32 / 200.0)).collect();

    assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(samples.first(), Some(&0.0));
    assert_eq!(samples.last(), Some(&1.0));
}

#[test]
fn test_hard_threshold_yields_binary_alpha() {
    let mask = noisy_mask(24, 16, 3);
    let enhanced = MaskEnhancer::new(&settings(0.5, 0.0, 0.0, false)).enhance(&mask);
    let raster = Raster::filled(24, 16, Rgba([10, 20, 30, 255])).unwrap();
    let output = Compositor::new(&RemovalSettings::default())
        .apply(&raster, &enhanced)
        .unwrap();

    for y in 0..16 {
        for x in 0..24 {
            let alpha = output.alpha(x, y).unwrap();
            let expected = if mask.get(x, y).unwrap() > 0.5 { 255 } else { 0 };
            assert_eq!(alpha, expected, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn test_cleanup_never_touches_border() {
    let mask = noisy_mask(9, 7, 5);
    let enhancer = MaskEnhancer::new(&settings(0.5, 0.0, 0.0, false));
    let hard = enhancer.enhance(&mask).into_mask();
    let cleaned = MaskEnhancer::remove_isolated_pixels(&hard);

    for x in 0..9 {
        assert_eq!(cleaned.get(x, 0), hard.get(x, 0));
        assert_eq!(cleaned.get(x, 6), hard.get(x, 6));
    }
    for y in 0..7 {
        assert_eq!(cleaned.get(0, y), hard.get(0, y));
        assert_eq!(cleaned.get(8, y), hard.get(8, y));
    }
}

#[test]
fn test_background_polarity_is_inverted_once() {
    let mask = noisy_mask(6, 4, 9);
    let flipped = mask.clone().with_polarity(MaskPolarity::Background);

    for (raw, inverted) in mask.scores().iter().zip(flipped.scores()) {
        assert!((raw + inverted - 1.0).abs() < 1e-6);
    }
    assert_eq!(mask.clone().with_polarity(MaskPolarity::Foreground), mask);
}

#[test]
fn test_coordinate_mapping_covers_every_mask_sample() {
    for &(raster_len, mask_len) in &[(1024u32, 64u32), (100, 7), (7, 100), (513, 512), (1, 1)] {
        let mapped: Vec<u32> = (0..raster_len)
            .map(|x| Compositor::map_coordinate(x, raster_len, mask_len))
            .collect();

        assert!(mapped.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(mapped.first(), Some(&0));
        assert!(mapped.iter().all(|&m| m < mask_len));
        if raster_len >= mask_len {
            assert_eq!(mapped.last(), Some(&(mask_len - 1)));
        }
    }
}

#[test]
fn test_resize_keeps_aspect_ratio_and_bound() {
    for &(width, height) in &[
        (2048u32, 1024u32),
        (1024, 4096),
        (333, 999),
        (5000, 7),
        (800, 600),
        (4097, 1023),
        (1500, 1499),
        (9000, 1),
    ] {
        let (w, h) = ImageResizer::target_dimensions(width, height, 1024).unwrap();
        assert!(w.max(h) <= 1024);
        assert!(w >= 1 && h >= 1);
        if width.max(height) <= 1024 {
            assert_eq!((w, h), (width, height));
            continue;
        }

        assert_eq!(w.max(h), 1024, "{width}x{height}");
        let scale = 1024.0 / f64::from(width.max(height));
        for (actual, original) in [(w, width), (h, height)] {
            let exact = f64::from(original) * scale;
            // Sides shorter than a pixel are clamped up to 1
            let expected = exact.max(1.0);
            assert!(
                (f64::from(actual) - expected).abs() <= 0.5,
                "{width}x{height} -> {w}x{h}"
            );
        }
    }
}

#[test]
fn test_influence_field_falls_off_with_distance() {
    let field = PointInfluenceField::new();
    let mask = field
        .build(21, 21, &[Point::foreground(10.0, 10.0)])
        .unwrap();

    let row: Vec<f32> = (10..21).map(|x| mask.get(x, 10).unwrap()).collect();
    assert_eq!(row[0], 1.0);
    assert!(row.windows(2).all(|pair| pair[0] >= pair[1]));
    assert!(row[5..].iter().all(|&v| v == 0.0));
}

#[test]
fn test_flatten_removes_all_transparency() {
    let mask = noisy_mask(12, 12, 1);
    let enhanced = EnhancedMask::from_weights(mask);
    let raster = Raster::filled(12, 12, Rgba([200, 10, 10, 255])).unwrap();
    let settings = RemovalSettings::builder()
        .background_color(BackgroundColor::rgb(0, 0, 255))
        .build()
        .unwrap();

    let output = Compositor::new(&settings).apply(&raster, &enhanced).unwrap();
    assert!(output.as_image().pixels().all(|p| p[3] == 255));
}
