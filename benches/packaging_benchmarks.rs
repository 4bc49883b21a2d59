//! Benchmarks for sampling, frame encoding and archive building.
//!
//! Run with: cargo bench
//!
//! The sampling benchmarks need `tests/fixtures/sample_video.mp4` from
//! `tests/fixtures/generate_fixtures.sh` and skip themselves without it.

use std::{path::Path, time::Duration};

use criterion::Criterion;
use framepack::{
    ArchiveBuilder, ArchiveCompression, EncodedFrame, ExtractOptions, ExtractionSession,
    FfmpegLogLevel, FrameCollection, FrameEncoder, FrameImageFormat, SamplingStrategy,
    set_ffmpeg_log_level,
};
use image::{DynamicImage, Rgb, RgbImage};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn test_pattern(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn benchmark_frame_encoding(criterion: &mut Criterion) {
    let image = test_pattern(640, 480);
    let mut group = criterion.benchmark_group("encode 640x480 frame");
    for format in [FrameImageFormat::Png, FrameImageFormat::Jpeg, FrameImageFormat::Bmp] {
        let encoder = FrameEncoder::new(format);
        group.bench_function(format.extension(), |bencher| {
            bencher.iter(|| encoder.encode(&image).unwrap());
        });
    }
    group.finish();
}

fn benchmark_archive_building(criterion: &mut Criterion) {
    let data = FrameEncoder::new(FrameImageFormat::Png)
        .encode(&test_pattern(320, 240))
        .unwrap();
    let mut collection = FrameCollection::new();
    for index in 0..30u64 {
        let timestamp = Duration::from_secs(index);
        collection
            .push(EncodedFrame {
                index,
                timestamp,
                presentation_time: timestamp,
                width: 320,
                height: 240,
                format: FrameImageFormat::Png,
                data: data.clone(),
            })
            .unwrap();
    }

    let mut group = criterion.benchmark_group("archive 30 frames");
    for compression in [ArchiveCompression::Stored, ArchiveCompression::Deflate] {
        let builder = ArchiveBuilder::new().with_compression(compression);
        group.bench_function(format!("{compression:?}"), |bencher| {
            bencher.iter(|| builder.build(&collection).unwrap());
        });
    }
    group.finish();
}

fn benchmark_sampling(criterion: &mut Criterion) {
    set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let mut group = criterion.benchmark_group("sample every 1s");
    group.sample_size(10);
    for strategy in [SamplingStrategy::SeekAndWait, SamplingStrategy::FrameCallback] {
        group.bench_function(format!("{strategy:?}"), |bencher| {
            bencher.iter(|| {
                let options = ExtractOptions::new().with_strategy(strategy);
                let mut session = ExtractionSession::open(SAMPLE_VIDEO, options).unwrap();
                session.extract(1.0).unwrap()
            });
        });
    }
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_frame_encoding,
    benchmark_archive_building,
    benchmark_sampling,
);
criterion::criterion_main!(benches);
