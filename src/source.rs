//! Opened media sources.
//!
//! [`MediaSource`] owns the FFmpeg demuxer for one video file together with
//! its cached [`SourceMetadata`]. A source lives as long as the session that
//! loaded it and is dropped, releasing the file, when another file is loaded.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{Rational, codec::context::Context as CodecContext, format::context::Input, media::Type};

use crate::{error::FramepackError, metadata::SourceMetadata};

/// An opened, decodable video file.
///
/// # Example
///
/// ```no_run
/// use framepack::{FramepackError, MediaSource};
///
/// let source = MediaSource::open("input.mp4")?;
/// println!("{:.2} fps", source.metadata().frames_per_second);
/// # Ok::<(), FramepackError>(())
/// ```
pub struct MediaSource {
    /// The opened FFmpeg input (demuxer) context.
    pub(crate) input_context: Input,
    /// Index of the best video stream.
    pub(crate) video_stream_index: usize,
    /// Time base of the video stream.
    pub(crate) time_base: Rational,
    /// Cached metadata extracted at open time.
    pub(crate) metadata: SourceMetadata,
    /// Path the source was opened from.
    pub(crate) path: PathBuf,
}

impl Debug for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaSource")
            .field("path", &self.path)
            .field("video_stream_index", &self.video_stream_index)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl MediaSource {
    /// Open a video file for sampling.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, selects the best
    /// video stream and caches its metadata.
    ///
    /// # Errors
    ///
    /// - [`FramepackError::FileOpen`] if the file cannot be opened or its
    ///   codec parameters cannot be read.
    /// - [`FramepackError::NoVideoStream`] if the file has no video.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramepackError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening media source: {}", path.display());

        ffmpeg_next::init().map_err(|error| FramepackError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| FramepackError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(FramepackError::NoVideoStream)?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                FramepackError::FileOpen {
                    path: path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let video_decoder =
            decoder_context
                .decoder()
                .video()
                .map_err(|error| FramepackError::FileOpen {
                    path: path.clone(),
                    reason: format!("Failed to create video decoder: {error}"),
                })?;

        let frames_per_second = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        // Prefer the container duration; some containers only carry it per stream.
        let container_micros = input_context.duration();
        let duration = if container_micros > 0 {
            Duration::from_micros(container_micros as u64)
        } else if stream.duration() > 0 {
            Duration::from_secs_f64(
                crate::conversion::pts_to_seconds(stream.duration(), time_base).max(0.0),
            )
        } else {
            Duration::ZERO
        };

        let frame_count = if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = SourceMetadata {
            width: video_decoder.width(),
            height: video_decoder.height(),
            duration,
            frames_per_second,
            frame_count,
            codec,
            format: input_context.format().name().to_string(),
        };

        log::debug!(
            "Opened {}: {}x{} @ {:.3} fps, {:?}",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.duration,
        );

        Ok(Self {
            input_context,
            video_stream_index,
            time_base,
            metadata,
            path,
        })
    }

    /// Cached metadata for the video stream.
    pub fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a fresh codec context from the video stream's parameters.
    pub(crate) fn codec_context(&self) -> Result<CodecContext, FramepackError> {
        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(FramepackError::NoVideoStream)?;
        Ok(CodecContext::from_parameters(stream.parameters())?)
    }
}

fn rational_to_f64(rate: Rational) -> Option<f64> {
    (rate.denominator() != 0 && rate.numerator() > 0)
        .then(|| rate.numerator() as f64 / rate.denominator() as f64)
}
