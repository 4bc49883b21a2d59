//! Frame sampler integration tests.
//!
//! Schedule and ordering tests run against a scripted backend; the
//! strategy comparison needs fixtures from `tests/fixtures/generate_fixtures.sh`.

mod common;

use std::path::Path;
use std::time::Duration;

use common::{ScriptedBackend, sample_video_path};
use framepack::{
    ExtractOptions, FrameSampler, FramepackError, MediaSource, SampleSchedule, SamplingStrategy,
    WaitCondition, select_backend,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn sampled_timestamps(backend: &mut ScriptedBackend, interval: f64) -> Vec<Duration> {
    FrameSampler::new(backend, interval, TIMEOUT)
        .expect("valid interval")
        .map(|sample| sample.expect("capture").timestamp)
        .collect()
}

// ── Schedule ───────────────────────────────────────────────────────

#[test]
fn five_seconds_every_two_seconds() {
    let mut backend = ScriptedBackend::new(5.0);
    let timestamps = sampled_timestamps(&mut backend, 2.0);
    assert_eq!(
        timestamps,
        vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(backend.targets, timestamps);
}

#[test]
fn frame_count_is_ceiling_of_duration_over_interval() {
    for (duration, interval, expected) in [
        (10.0, 3.0, 4),
        (4.0, 1.0, 4),
        (1.0, 0.25, 4),
        (0.5, 1.0, 1),
        (2.5, 0.5, 5),
    ] {
        let mut backend = ScriptedBackend::new(duration);
        let count = sampled_timestamps(&mut backend, interval).len();
        assert_eq!(count, expected, "duration {duration}, interval {interval}");
    }
}

#[test]
fn every_timestamp_lies_inside_the_video() {
    let mut backend = ScriptedBackend::new(3.0);
    for timestamp in sampled_timestamps(&mut backend, 0.7) {
        assert!(timestamp < Duration::from_secs(3));
    }
}

#[test]
fn interval_longer_than_video_yields_first_frame_only() {
    let mut backend = ScriptedBackend::new(1.5);
    assert_eq!(sampled_timestamps(&mut backend, 10.0), vec![Duration::ZERO]);
}

#[test]
fn timestamps_are_index_times_interval() {
    let mut backend = ScriptedBackend::new(1.0);
    let samples: Vec<_> = FrameSampler::new(&mut backend, 0.1, TIMEOUT)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(samples.len(), 10);
    for sample in &samples {
        assert_eq!(
            sample.timestamp,
            Duration::from_secs_f64(sample.index as f64 * 0.1)
        );
    }
}

#[test]
fn timestamps_strictly_increase() {
    let mut backend = ScriptedBackend::new(7.0);
    let timestamps = sampled_timestamps(&mut backend, 0.3);
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn invalid_interval_is_rejected_before_sampling() {
    for interval in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let mut backend = ScriptedBackend::new(5.0);
        let result = FrameSampler::new(&mut backend, interval, TIMEOUT);
        assert!(matches!(
            result,
            Err(FramepackError::InvalidParameter { name: "interval", .. })
        ));
        assert_eq!(backend.begins, 0);
        assert!(backend.targets.is_empty());
    }
}

#[test]
fn vanishing_interval_is_rejected_without_panicking() {
    for interval in [f64::MIN_POSITIVE, 1e-300, 1e-9] {
        let mut backend = ScriptedBackend::new(5.0);
        let result = FrameSampler::new(&mut backend, interval, TIMEOUT);
        assert!(matches!(
            result,
            Err(FramepackError::InvalidParameter { name: "interval", .. })
        ));
        assert_eq!(backend.begins, 0);
    }
}

#[test]
fn sampling_twice_gives_identical_timestamps() {
    let mut backend = ScriptedBackend::new(5.0);
    let first = sampled_timestamps(&mut backend, 1.5);
    let second = sampled_timestamps(&mut backend, 1.5);
    assert_eq!(first, second);
    assert_eq!(backend.begins, 2);
}

#[test]
fn size_hint_counts_remaining_frames() {
    let mut backend = ScriptedBackend::new(5.0);
    let mut samples = FrameSampler::new(&mut backend, 1.0, TIMEOUT).unwrap();
    assert_eq!(samples.size_hint(), (0, Some(5)));
    samples.next();
    assert_eq!(samples.size_hint(), (0, Some(4)));
    assert_eq!(samples.schedule().len(), 5);
}

#[test]
fn explicit_schedule_is_followed() {
    let mut backend = ScriptedBackend::new(60.0);
    let schedule = SampleSchedule::new(20.0, Duration::from_secs(60)).unwrap();
    let count = FrameSampler::with_schedule(&mut backend, schedule, TIMEOUT)
        .unwrap()
        .count();
    assert_eq!(count, 3);
}

// ── Readiness ──────────────────────────────────────────────────────

#[test]
fn stalled_frame_times_out_and_stops_the_run() {
    let mut backend = ScriptedBackend::new(5.0).stalling_at(Duration::from_secs(2));
    let mut samples =
        FrameSampler::new(&mut backend, 1.0, Duration::from_millis(20)).unwrap();

    assert!(samples.next().unwrap().is_ok());
    assert!(samples.next().unwrap().is_ok());
    match samples.next() {
        Some(Err(FramepackError::DecodeTimeout {
            condition,
            timestamp,
            waited,
        })) => {
            assert_eq!(condition, WaitCondition::FrameReady);
            assert_eq!(timestamp, Duration::from_secs(2));
            assert!(waited >= Duration::from_millis(20));
        }
        other => panic!("expected DecodeTimeout, got {other:?}"),
    }
    assert!(samples.next().is_none());
    assert_eq!(samples.size_hint(), (0, Some(0)));
    drop(samples);
    assert_eq!(backend.targets.len(), 3);
}

// ── FFmpeg backends ────────────────────────────────────────────────

#[test]
fn strategies_agree_on_frame_count() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut counts = Vec::new();
    for strategy in [
        SamplingStrategy::SeekAndWait,
        SamplingStrategy::FrameCallback,
        SamplingStrategy::Accelerated,
    ] {
        let options = ExtractOptions::new().with_strategy(strategy);
        let source = MediaSource::open(path).expect("open fixture");
        let duration = source.metadata().duration;
        let mut backend = select_backend(source, &options).expect("backend");

        let frames: Vec<_> = FrameSampler::new(backend.as_mut(), 1.0, TIMEOUT)
            .unwrap()
            .map(|sample| sample.expect("sample"))
            .collect();
        let expected = SampleSchedule::new(1.0, duration).unwrap().len() as usize;
        assert_eq!(frames.len(), expected, "{strategy:?}");
        assert_eq!(frames[0].image.width(), 640);
        counts.push(frames.len());
    }
    assert!(counts.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn seek_and_wait_lands_near_each_target() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = ExtractOptions::new().with_strategy(SamplingStrategy::SeekAndWait);
    let source = MediaSource::open(path).expect("open fixture");
    let frame = source.metadata().frame_duration();
    let mut backend = select_backend(source, &options).expect("backend");

    for sample in FrameSampler::new(backend.as_mut(), 2.0, TIMEOUT).unwrap() {
        let sample = sample.expect("sample");
        let distance = if sample.presentation_time > sample.timestamp {
            sample.presentation_time - sample.timestamp
        } else {
            sample.timestamp - sample.presentation_time
        };
        assert!(distance <= frame, "frame at {:?}", sample.presentation_time);
    }
}

#[test]
fn frame_callback_matches_seek_and_wait_timing() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let times = |strategy: SamplingStrategy| -> Vec<Duration> {
        let options = ExtractOptions::new().with_strategy(strategy);
        let source = MediaSource::open(path).expect("open fixture");
        let mut backend = select_backend(source, &options).expect("backend");
        FrameSampler::new(backend.as_mut(), 0.5, TIMEOUT)
            .unwrap()
            .map(|sample| sample.expect("sample").presentation_time)
            .collect()
    };
    assert_eq!(
        times(SamplingStrategy::SeekAndWait),
        times(SamplingStrategy::FrameCallback)
    );
}
