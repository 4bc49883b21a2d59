//! Error types for the `framepack` crate.
//!
//! This module defines [`FramepackError`], the single error type returned by
//! every fallible operation in the crate. Each variant carries enough context
//! (paths, timestamps, parameter values) to explain a failed run without
//! extra logging at the call site.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use async_zip::error::ZipError;
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::readiness::WaitCondition;

/// The unified error type for all `framepack` operations.
///
/// Every failure is scoped to the operation that produced it: a failed
/// extraction run returns this error and drops its partial collection, while
/// collections built by earlier runs stay valid.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramepackError {
    /// A parameter was out of range: zero, negative, not finite, or too
    /// small to be scheduled.
    #[error("Invalid parameter {name}: {value} ({reason})")]
    InvalidParameter {
        /// Name of the offending parameter (e.g. `"interval"`).
        name: &'static str,
        /// The rejected value, formatted for display.
        value: String,
        /// Which constraint the value broke.
        reason: &'static str,
    },

    /// The decoder never became ready for the requested timestamp.
    #[error("Timed out after {waited:?} waiting for {condition} at {timestamp:?}")]
    DecodeTimeout {
        /// What the sampler was waiting for.
        condition: WaitCondition,
        /// The scheduled sample time.
        timestamp: Duration,
        /// How long the wait lasted before giving up.
        waited: Duration,
    },

    /// No image encoder is available for the requested output format.
    #[error("Image encoding unsupported: {0}")]
    EncodingUnsupported(String),

    /// No video encoder or container is available for re-encoding.
    #[error("Video recording unsupported: {0}")]
    RecordingUnsupported(String),

    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Re-encoding failed after the encoder was opened.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// The zip archive could not be written or read.
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// Another extraction run holds the session.
    #[error("An extraction run is already in progress")]
    RunInProgress,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding or decoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl FramepackError {
    /// Build an [`InvalidParameter`](FramepackError::InvalidParameter) error.
    pub(crate) fn invalid_parameter(name: &'static str, value: f64, reason: &'static str) -> Self {
        FramepackError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

impl From<FfmpegError> for FramepackError {
    fn from(error: FfmpegError) -> Self {
        FramepackError::FfmpegError(error.to_string())
    }
}

impl From<ZipError> for FramepackError {
    fn from(error: ZipError) -> Self {
        FramepackError::ArchiveError(error.to_string())
    }
}

/// Reject values that are not finite and strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, FramepackError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FramepackError::invalid_parameter(
            name,
            value,
            "must be a finite value greater than zero",
        ))
    }
}
