//! Re-encoding a frame collection into a new video.
//!
//! [`Reencoder`] replays the stored images of a [`FrameCollection`] into a
//! video encoder at `base_frame_rate × speed_factor` frames per second,
//! optionally in reverse order. VP8 and VP9 are written to WebM, H.264 to
//! MP4.
//!
//! The base rate defaults to 30 fps. Collections sampled at another interval
//! play back in real time at speed 1.0 only when the base rate matches it,
//! via [`ReencodeOptions::with_sampling_interval`].
//!
//! # Example
//!
//! ```no_run
//! use framepack::{ExtractOptions, ExtractionSession, ReencodeOptions, Reencoder};
//!
//! let mut session = ExtractionSession::open("input.mp4", ExtractOptions::new())?;
//! let interval = 0.1;
//! let frames = session.extract(interval)?;
//!
//! let options = ReencodeOptions::new()
//!     .with_sampling_interval(interval)
//!     .with_speed_factor(2.0)
//!     .with_reverse(true);
//! Reencoder::new(options)?.write(&frames, "reversed.webm")?;
//! # Ok::<(), framepack::FramepackError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Packet, Rational, codec, encoder, format};
use image::imageops::FilterType;

use crate::{
    conversion,
    error::{FramepackError, require_positive},
    packager::FrameCollection,
    progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
};

/// Output video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// VP9 in WebM. This is the default.
    #[default]
    Vp9,
    /// VP8 in WebM.
    Vp8,
    /// H.264 in MP4.
    H264,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::Vp9 => Id::VP9,
            VideoCodec::Vp8 => Id::VP8,
            VideoCodec::H264 => Id::H264,
        }
    }

    /// Container format name understood by FFmpeg.
    pub fn container(self) -> &'static str {
        match self {
            VideoCodec::Vp9 | VideoCodec::Vp8 => "webm",
            VideoCodec::H264 => "mp4",
        }
    }

    /// Conventional file extension of the container.
    pub fn extension(self) -> &'static str {
        self.container()
    }
}

/// Timing of re-encoded frames.
///
/// Frame `k` is shown at `k / (base_frame_rate × speed_factor)` seconds. The
/// encoder time base is the inverse of that rate, so frame `k` gets `pts = k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacing {
    frame_rate: f64,
}

impl FramePacing {
    /// Pacing for `speed_factor` times `base_frame_rate`.
    ///
    /// # Errors
    ///
    /// [`FramepackError::InvalidParameter`] if either value is not finite
    /// and positive.
    pub fn new(base_frame_rate: f64, speed_factor: f64) -> Result<Self, FramepackError> {
        let base_frame_rate = require_positive("base_frame_rate", base_frame_rate)?;
        let speed_factor = require_positive("speed_factor", speed_factor)?;
        let frame_rate = require_positive("frame_rate", base_frame_rate * speed_factor)?;
        Ok(Self { frame_rate })
    }

    /// Frames per second of the output.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Time between consecutive frames: `1 / base_frame_rate / speed_factor`.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }

    /// Presentation time of output frame `position`.
    pub fn presentation_time(&self, position: u64) -> Duration {
        Duration::from_secs_f64(position as f64 / self.frame_rate)
    }

    /// Output frame rate as a rational, accurate to a thousandth.
    pub fn rate(&self) -> Rational {
        let millis = (self.frame_rate * 1000.0).round().clamp(1.0, i32::MAX as f64) as i32;
        Rational::new(millis, 1000).reduce()
    }

    /// Encoder time base: one tick per frame.
    pub fn time_base(&self) -> Rational {
        self.rate().invert()
    }
}

/// Order in which stored frames are submitted to the encoder.
pub fn playback_order(len: usize, reverse: bool) -> Vec<usize> {
    if reverse {
        (0..len).rev().collect()
    } else {
        (0..len).collect()
    }
}

/// Settings for a re-encode.
#[derive(Clone)]
pub struct ReencodeOptions {
    speed_factor: f64,
    reverse: bool,
    base_frame_rate: f64,
    codec: VideoCodec,
    bitrate: Option<usize>,
    progress: Arc<dyn ProgressCallback>,
}

impl Debug for ReencodeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ReencodeOptions")
            .field("speed_factor", &self.speed_factor)
            .field("reverse", &self.reverse)
            .field("base_frame_rate", &self.base_frame_rate)
            .field("codec", &self.codec)
            .field("bitrate", &self.bitrate)
            .finish_non_exhaustive()
    }
}

impl Default for ReencodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReencodeOptions {
    /// Normal speed, forward, 30 fps, VP9.
    pub fn new() -> Self {
        Self {
            speed_factor: 1.0,
            reverse: false,
            base_frame_rate: 30.0,
            codec: VideoCodec::default(),
            bitrate: None,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Playback speed multiplier (2.0 plays twice as fast).
    #[must_use]
    pub fn with_speed_factor(mut self, speed_factor: f64) -> Self {
        self.speed_factor = speed_factor;
        self
    }

    /// Play the collection back to front.
    #[must_use]
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Frame rate at speed 1.0.
    ///
    /// For frames sampled every `interval` seconds, real-time playback is
    /// `1.0 / interval`; see [`with_sampling_interval`](Self::with_sampling_interval).
    #[must_use]
    pub fn with_base_frame_rate(mut self, frame_rate: f64) -> Self {
        self.base_frame_rate = frame_rate;
        self
    }

    /// Pace playback from the interval the collection was sampled at, so
    /// speed 1.0 replays it in real time. Sets the base frame rate to
    /// `1.0 / interval_secs`.
    #[must_use]
    pub fn with_sampling_interval(self, interval_secs: f64) -> Self {
        self.with_base_frame_rate(1.0 / interval_secs)
    }

    /// Output codec.
    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Target bitrate in bits per second.
    #[must_use]
    pub fn with_bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Report one progress step per encoded frame.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// The playback speed multiplier.
    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    /// Whether frames are played back to front.
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    /// The output codec.
    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// Validate the rates and derive the output pacing.
    pub fn pacing(&self) -> Result<FramePacing, FramepackError> {
        FramePacing::new(self.base_frame_rate, self.speed_factor)
    }
}

/// Encodes frame collections into video files.
#[derive(Debug, Clone)]
pub struct Reencoder {
    options: ReencodeOptions,
    pacing: FramePacing,
}

impl Reencoder {
    /// Create a re-encoder, validating `options`.
    pub fn new(options: ReencodeOptions) -> Result<Self, FramepackError> {
        let pacing = options.pacing()?;
        Ok(Self { options, pacing })
    }

    /// The output pacing.
    pub fn pacing(&self) -> FramePacing {
        self.pacing
    }

    /// Encode `collection` into the file at `path`.
    ///
    /// Returns the number of frames written. An empty collection writes
    /// nothing and returns 0.
    ///
    /// # Errors
    ///
    /// - [`FramepackError::RecordingUnsupported`] if the codec or container
    ///   is not available in the linked FFmpeg.
    /// - [`FramepackError::VideoEncodeError`] if encoding fails midway.
    pub fn write<P: AsRef<Path>>(
        &self,
        collection: &FrameCollection,
        path: P,
    ) -> Result<usize, FramepackError> {
        let path = path.as_ref();
        if collection.is_empty() {
            log::debug!("Nothing to re-encode");
            return Ok(0);
        }
        log::info!(
            "Re-encoding {} frames to {} ({:?}, {:.3} fps, reverse={})",
            collection.len(),
            path.display(),
            self.options.codec,
            self.pacing.frame_rate(),
            self.options.reverse,
        );

        let frames = collection.frames();
        let first = image::load_from_memory(&frames[0].data)?;
        let (width, height) = even_dimensions(first.width(), first.height());
        let video_codec = self.options.codec;
        let time_base = self.pacing.time_base();

        let mut output = format::output_as(path, video_codec.container()).map_err(|error| {
            FramepackError::RecordingUnsupported(format!(
                "{} container: {error}",
                video_codec.container()
            ))
        })?;
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let encoder_codec = encoder::find(video_codec.to_codec_id()).ok_or_else(|| {
            FramepackError::RecordingUnsupported(format!("no {video_codec:?} encoder available"))
        })?;

        let mut stream = output.add_stream(encoder_codec)?;
        let stream_index = stream.index();

        let mut video_encoder = CodecContext::from_parameters(stream.parameters())?
            .encoder()
            .video()?;
        video_encoder.set_width(width);
        video_encoder.set_height(height);
        video_encoder.set_format(Pixel::YUV420P);
        video_encoder.set_time_base(time_base);
        video_encoder.set_frame_rate(Some(self.pacing.rate()));
        if let Some(bitrate) = self.options.bitrate {
            video_encoder.set_bit_rate(bitrate);
        }
        if needs_global_header {
            video_encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut opened = video_encoder.open_as(encoder_codec).map_err(|error| {
            FramepackError::RecordingUnsupported(format!("cannot open {video_codec:?} encoder: {error}"))
        })?;
        stream.set_parameters(&opened);
        stream.set_time_base(time_base);
        stream.set_rate(self.pacing.rate());
        stream.set_avg_frame_rate(self.pacing.rate());

        output.write_header()?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| FramepackError::VideoEncodeError("output stream missing".to_string()))?;

        let mut scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::Reencoding,
            Some(frames.len() as u64),
            1,
        );
        let mut packet = Packet::empty();

        for (position, index) in playback_order(frames.len(), self.options.reverse)
            .into_iter()
            .enumerate()
        {
            let stored = &frames[index];
            let image = image::load_from_memory(&stored.data)?;
            let rgb = if image.width() != width || image.height() != height {
                image.resize_exact(width, height, FilterType::Triangle).to_rgb8()
            } else {
                image.to_rgb8()
            };

            let mut rgb_frame = VideoFrame::new(Pixel::RGB24, width, height);
            conversion::rgb_buffer_to_frame(rgb.as_raw(), width, height, &mut rgb_frame);
            let mut yuv_frame = VideoFrame::empty();
            scaler.run(&rgb_frame, &mut yuv_frame)?;
            yuv_frame.set_pts(Some(position as i64));

            opened
                .send_frame(&yuv_frame)
                .map_err(|error| FramepackError::VideoEncodeError(format!("send_frame: {error}")))?;
            while opened.receive_packet(&mut packet).is_ok() {
                packet.set_stream(stream_index);
                packet.rescale_ts(time_base, stream_time_base);
                packet.write_interleaved(&mut output)?;
            }
            tracker.advance(Some(stored.index), Some(stored.timestamp));
        }

        opened
            .send_eof()
            .map_err(|error| FramepackError::VideoEncodeError(format!("send_eof: {error}")))?;
        while opened.receive_packet(&mut packet).is_ok() {
            packet.set_stream(stream_index);
            packet.rescale_ts(time_base, stream_time_base);
            packet.write_interleaved(&mut output)?;
        }
        output.write_trailer()?;
        tracker.finish();

        log::info!("Re-encoded {} frames to {}", frames.len(), path.display());
        Ok(frames.len())
    }

    /// Encode `collection` and return the finished file's bytes.
    ///
    /// Returns `Ok(None)` for an empty collection.
    pub fn encode(&self, collection: &FrameCollection) -> Result<Option<Vec<u8>>, FramepackError> {
        if collection.is_empty() {
            return Ok(None);
        }
        let directory = tempfile::tempdir()?;
        let path = directory
            .path()
            .join(format!("reencoded.{}", self.options.codec.extension()));
        self.write(collection, &path)?;
        Ok(Some(std::fs::read(&path)?))
    }
}

/// Round down to even dimensions, as YUV 4:2:0 requires.
fn even_dimensions(width: u32, height: u32) -> (u32, u32) {
    ((width & !1).max(2), (height & !1).max(2))
}
