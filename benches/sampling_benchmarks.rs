//! Benchmarks for sampling plans, frame encoding, and end-to-end extraction.
//!
//! Run with: cargo bench
//!
//! The extraction benchmark needs `tests/fixtures/sample_video.mp4` and is
//! skipped when it is missing.

use std::{hint::black_box, path::Path, time::Duration};

use criterion::Criterion;
use ffmpeg_next::util::log::Level as LogLevel;
use framegrab::{
    ExtractOptions, ExtractionEngine, ExtractionRequest, FfmpegSource, FrameCodec, ImageFormat,
    IntervalPacer, MediaInfo, SamplingConfig, SourceDescriptor, plan_by_count, plan_by_interval,
};
use image::{DynamicImage, Rgb, RgbImage};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn long_video() -> MediaInfo {
    MediaInfo {
        frame_count: 216_000,
        frames_per_second: 30.0,
        width: 1920,
        height: 1080,
    }
}

fn benchmark_plans(criterion: &mut Criterion) {
    let info = long_video();
    let mut group = criterion.benchmark_group("plans");

    for target in [10_u64, 1_000, 100_000] {
        group.bench_function(format!("count plan ({target} frames)"), |bencher| {
            bencher.iter(|| plan_by_count(black_box(&info), target, ImageFormat::Jpeg).unwrap());
        });
    }

    group.bench_function("interval plan (1s over 2h)", |bencher| {
        bencher.iter(|| {
            plan_by_interval(black_box(&info), Duration::from_secs(1), ImageFormat::Png).unwrap()
        });
    });

    group.finish();
}

fn benchmark_pacer(criterion: &mut Criterion) {
    criterion.bench_function("pacer poll (10k ticks)", |bencher| {
        bencher.iter(|| {
            let mut pacer =
                IntervalPacer::new(Duration::from_millis(500), ImageFormat::Jpeg).unwrap();
            let mut emitted = 0_u64;
            for tick in 0..10_000_u64 {
                if pacer.poll(Duration::from_millis(tick * 33)).is_some() {
                    emitted += 1;
                }
            }
            black_box(emitted)
        });
    });
}

fn benchmark_encoding(criterion: &mut Criterion) {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(640, 360, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));
    let directory = tempfile::tempdir().unwrap();
    let mut group = criterion.benchmark_group("encode 640x360");

    for format in [ImageFormat::Jpeg, ImageFormat::Png] {
        let path = directory.path().join(format!("frame.{}", format.extension()));
        let codec = FrameCodec::default();
        group.bench_function(format.to_string(), |bencher| {
            bencher.iter(|| codec.encode(black_box(&image), format, &path).unwrap());
        });
    }

    group.finish();
}

fn benchmark_extraction(criterion: &mut Criterion) {
    ffmpeg_next::util::log::set_level(LogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let engine = ExtractionEngine::new(FfmpegSource::new());
    let options = ExtractOptions::new();

    criterion.bench_function("extract 10 evenly spaced frames", |bencher| {
        bencher.iter(|| {
            let output = tempfile::tempdir().unwrap();
            let request = ExtractionRequest::new(
                SourceDescriptor::file(SAMPLE_VIDEO),
                output.path(),
                SamplingConfig::by_count(10).unwrap(),
            );
            engine.run(&request, &options)
        });
    });
}

criterion::criterion_group!(
    benches,
    benchmark_plans,
    benchmark_pacer,
    benchmark_encoding,
    benchmark_extraction,
);
criterion::criterion_main!(benches);
