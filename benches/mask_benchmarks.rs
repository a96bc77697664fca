use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::Rgba;
use imgly_maskcomp::{
    BackgroundColor, BackgroundRemovalProcessor, Compositor, ImageIOService, MaskEnhancer,
    MockBackend, OutputFormat, ProcessorConfig, Raster, RemovalSettings, SegmentationMask,
};
use tokio::runtime::Runtime;

const SIZES: [(u32, u32); 3] = [(256, 256), (512, 512), (1024, 768)];

/// Radial gradient mask with a soft edge around the centre
fn gradient_mask(width: u32, height: u32) -> SegmentationMask {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = cx.min(cy);
    let scores = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let distance = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            (1.0 - distance / radius).clamp(0.0, 1.0)
        })
        .collect();
    SegmentationMask::new(width, height, scores).unwrap()
}

fn benchmark_enhancement(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_enhancement");
    let full = RemovalSettings::default();
    let threshold_only = RemovalSettings::builder()
        .edge_enhancement(0.0)
        .cleanup(false)
        .build()
        .unwrap();

    for (width, height) in SIZES {
        let mask = gradient_mask(width, height);
        let label = format!("{width}x{height}");

        group.bench_with_input(BenchmarkId::new("full", &label), &mask, |b, mask| {
            let enhancer = MaskEnhancer::new(&full);
            b.iter(|| enhancer.enhance(black_box(mask)));
        });
        group.bench_with_input(BenchmarkId::new("threshold_only", &label), &mask, |b, mask| {
            let enhancer = MaskEnhancer::new(&threshold_only);
            b.iter(|| enhancer.enhance(black_box(mask)));
        });
    }
    group.finish();
}

fn benchmark_compositing(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositing");
    let transparent = RemovalSettings::default();
    let white = RemovalSettings::builder()
        .background_color(BackgroundColor::white())
        .build()
        .unwrap();

    for (width, height) in SIZES {
        let raster = Raster::filled(width, height, Rgba([90, 140, 200, 255])).unwrap();
        // Masks usually arrive at a lower resolution than the image
        let mask = MaskEnhancer::new(&transparent).enhance(&gradient_mask(width / 4, height / 4));
        let label = format!("{width}x{height}");

        group.bench_function(BenchmarkId::new("transparent", &label), |b| {
            let compositor = Compositor::new(&transparent);
            b.iter(|| compositor.apply(black_box(&raster), black_box(&mask)).unwrap());
        });
        group.bench_function(BenchmarkId::new("solid_background", &label), |b| {
            let compositor = Compositor::new(&white);
            b.iter(|| compositor.apply(black_box(&raster), black_box(&mask)).unwrap());
        });
    }
    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let processor =
        BackgroundRemovalProcessor::with_backend(ProcessorConfig::default(), MockBackend::new())
            .unwrap();
    let raster = Raster::filled(1024, 768, Rgba([120, 80, 60, 255])).unwrap();
    let bytes = ImageIOService::encode(&raster, OutputFormat::Png, None).unwrap();
    let settings = RemovalSettings::default();

    c.bench_function("pipeline_mock_backend_1024x768", |b| {
        b.iter(|| {
            rt.block_on(processor.process_bytes(black_box(&bytes), &settings))
                .unwrap()
        });
    });
}

criterion_group!(
    mask_benches,
    benchmark_enhancement,
    benchmark_compositing,
    benchmark_pipeline
);
criterion_main!(mask_benches);
