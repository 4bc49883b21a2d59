//! Extraction session integration tests.
//!
//! Runs over a scripted backend always; file-backed tests require fixtures
//! from `tests/fixtures/generate_fixtures.sh`.

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{ScriptedBackend, sample_video_path};
use framepack::{
    ExtractOptions, ExtractionSession, FrameImageFormat, FramepackError, OperationType,
    ProgressCallback, ProgressInfo, RunGate, SamplingStrategy, ThumbnailOptions,
};

fn scripted_session(duration_secs: f64, options: ExtractOptions) -> ExtractionSession {
    ExtractionSession::from_backend(Box::new(ScriptedBackend::new(duration_secs)), options)
}

#[derive(Default)]
struct Recorder {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

// ── Runs over a scripted backend ───────────────────────────────────

#[test]
fn extract_packages_every_scheduled_frame() {
    let mut session = scripted_session(5.0, ExtractOptions::new());
    let frames = session.extract(2.0).expect("extract");

    assert_eq!(frames.len(), 3);
    assert_eq!(
        frames.timestamps(),
        vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    for (position, frame) in frames.iter().enumerate() {
        assert_eq!(frame.index, position as u64);
        assert_eq!(frame.format, FrameImageFormat::Png);
        let decoded = image::load_from_memory(&frame.data).expect("png");
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }
    assert!(frames.thumbnails().is_empty());
}

#[test]
fn each_run_returns_a_fresh_collection() {
    let mut session = scripted_session(3.0, ExtractOptions::new());
    let first = session.extract(1.0).unwrap();
    let second = session.extract(0.5).unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 6);
}

#[test]
fn image_format_option_is_applied() {
    let options = ExtractOptions::new().with_image_format(FrameImageFormat::Jpeg);
    let mut session = scripted_session(2.0, options);
    let frames = session.extract(1.0).unwrap();
    assert!(frames.iter().all(|frame| frame.format == FrameImageFormat::Jpeg));
    assert_eq!(&frames.frames()[0].data[..2], &[0xFF, 0xD8]);
}

#[test]
fn thumbnails_follow_every_option() {
    let options = ExtractOptions::new().with_thumbnails(ThumbnailOptions::new(4).every(2));
    let mut session = scripted_session(5.0, options);
    let frames = session.extract(1.0).unwrap();

    let indices: Vec<u64> = frames.thumbnails().iter().map(|thumb| thumb.index).collect();
    assert_eq!(indices, vec![0, 2, 4]);
    let preview = &frames.thumbnails()[0].image;
    assert_eq!((preview.width(), preview.height()), (4, 3));
}

#[test]
fn invalid_interval_produces_no_frames() {
    let mut session = scripted_session(5.0, ExtractOptions::new());
    assert!(matches!(
        session.extract(0.0),
        Err(FramepackError::InvalidParameter { .. })
    ));
    assert!(!session.run_gate().is_running());
}

#[test]
fn unschedulable_interval_fails_before_reserving_frames() {
    let mut session = scripted_session(5.0, ExtractOptions::new());
    let error = session.extract(1e-9).unwrap_err();
    assert!(matches!(
        error,
        FramepackError::InvalidParameter { name: "interval", .. }
    ));
    assert!(error.to_string().contains("limit"));
    assert!(!session.run_gate().is_running());
}

#[test]
fn timed_out_run_returns_error_and_releases_gate() {
    let backend = ScriptedBackend::new(5.0).stalling_at(Duration::from_secs(3));
    let options = ExtractOptions::new().with_decode_timeout(Duration::from_millis(10));
    let mut session = ExtractionSession::from_backend(Box::new(backend), options);

    assert!(matches!(
        session.extract(1.0),
        Err(FramepackError::DecodeTimeout { .. })
    ));
    assert!(!session.run_gate().is_running());
}

#[test]
fn shared_gate_rejects_overlapping_runs() {
    let gate = RunGate::new();
    let mut session = scripted_session(2.0, ExtractOptions::new()).with_run_gate(gate.clone());

    let permit = gate.try_acquire().expect("gate free");
    assert!(matches!(
        session.extract(1.0),
        Err(FramepackError::RunInProgress)
    ));
    drop(permit);
    assert_eq!(session.extract(1.0).unwrap().len(), 2);
}

#[test]
fn progress_reports_sampling() {
    let recorder = Arc::new(Recorder::default());
    let options = ExtractOptions::new()
        .with_progress(recorder.clone())
        .with_batch_size(2);
    let mut session = scripted_session(5.0, options);
    session.extract(1.0).unwrap();

    let infos = recorder.infos.lock().unwrap();
    let currents: Vec<u64> = infos.iter().map(|info| info.current).collect();
    assert_eq!(currents, vec![2, 4, 5]);
    assert!(
        infos
            .iter()
            .all(|info| info.operation == OperationType::FrameSampling)
    );
    assert_eq!(infos[0].total, Some(5));
    assert_eq!(infos[1].current_timestamp, Some(Duration::from_secs(3)));
}

#[test]
fn lazy_samples_do_not_package() {
    let mut session = scripted_session(4.0, ExtractOptions::new());
    let frames: Vec<_> = session
        .samples(2.0)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].image.width(), 8);
}

// ── File-backed sessions ───────────────────────────────────────────

#[test]
fn open_missing_file_fails() {
    let result = ExtractionSession::open("tests/fixtures/does_not_exist.mp4", ExtractOptions::new());
    assert!(matches!(result, Err(FramepackError::FileOpen { .. })));
}

#[test]
fn extract_fixture_every_two_seconds() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut session = ExtractionSession::open(path, ExtractOptions::new()).expect("open");
    assert_eq!(session.strategy(), SamplingStrategy::FrameCallback);
    assert_eq!(session.path(), Path::new(path));

    let duration = session.metadata().duration.as_secs_f64();
    let frames = session.extract(2.0).expect("extract");
    assert_eq!(frames.len(), (duration / 2.0).ceil() as usize);
    assert_eq!(frames.frames()[0].width, session.metadata().width);
}

#[test]
fn accelerated_request_falls_back_without_device() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let options = ExtractOptions::new().with_strategy(SamplingStrategy::Accelerated);
    let session = ExtractionSession::open(path, options).expect("open");
    assert!(matches!(
        session.strategy(),
        SamplingStrategy::Accelerated | SamplingStrategy::FrameCallback
    ));
}

#[test]
fn load_replaces_the_source() {
    let path = sample_video_path();
    let other = "tests/fixtures/sample_video_short.webm";
    if !Path::new(path).exists() || !Path::new(other).exists() {
        return;
    }

    let mut session = ExtractionSession::open(path, ExtractOptions::new()).expect("open");
    let first_duration = session.metadata().duration;
    session.load(other).expect("load");
    assert_eq!(session.path(), Path::new(other));
    assert_ne!(session.metadata().duration, first_duration);

    assert!(session.load("tests/fixtures/does_not_exist.mp4").is_err());
    assert_eq!(session.path(), Path::new(other));
}
