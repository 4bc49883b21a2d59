//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::time::Duration;

use framepack::{
    ExtractOptions, ExtractionSession, FramepackError, MediaSource, WaitCondition, unpack,
};

#[test]
fn open_nonexistent_file() {
    let result = ExtractionSession::open("this_file_does_not_exist.mp4", ExtractOptions::new());
    let error = result.err().expect("opening a missing file should fail");

    assert!(matches!(error, FramepackError::FileOpen { .. }));
    let error_message = error.to_string();
    assert!(
        error_message.contains("Failed to open media file"),
        "Error message should mention file open failure: {error_message}",
    );
    assert!(error_message.contains("this_file_does_not_exist.mp4"));
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    assert!(MediaSource::open(&invalid_file_path).is_err());
}

#[test]
fn invalid_parameter_names_the_value() {
    let error = FramepackError::InvalidParameter {
        name: "interval",
        value: "-1".to_string(),
        reason: "must be a finite value greater than zero",
    };
    let message = error.to_string();
    assert!(message.contains("interval"));
    assert!(message.contains("-1"));
    assert!(message.contains("greater than zero"));
}

#[test]
fn decode_timeout_mentions_condition_and_time() {
    let error = FramepackError::DecodeTimeout {
        condition: WaitCondition::SeekComplete,
        timestamp: Duration::from_secs(4),
        waited: Duration::from_millis(250),
    };
    let message = error.to_string();
    assert!(message.contains("seek completion"), "{message}");
    assert!(message.contains("4s"), "{message}");
    assert!(message.contains("250ms"), "{message}");
}

#[test]
fn unpacking_garbage_is_an_archive_error() {
    assert!(matches!(
        unpack(b"definitely not a zip file"),
        Err(FramepackError::ArchiveError(_))
    ));
}

#[test]
fn io_errors_convert() {
    let error: FramepackError = std::io::Error::other("disk full").into();
    assert!(matches!(error, FramepackError::IoError(_)));
    assert!(error.to_string().contains("disk full"));
}
