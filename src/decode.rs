//! FFmpeg-backed frame backends.
//!
//! [`StreamDecoder`] wraps the demux → decode → scale pipeline for one video
//! stream and exposes it one decoded frame at a time. The two software
//! strategies, [`SeekAndWaitBackend`] and [`FrameCallbackBackend`], differ
//! only in when they seek.

use std::borrow::Cow;
use std::mem;
use std::time::Duration;

use ffmpeg_next::{
    decoder::Video as VideoDecoder,
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::DynamicImage;

use crate::{
    backend::{CapturedFrame, FrameBackend, SamplingStrategy},
    config::PixelFormat,
    conversion,
    error::FramepackError,
    metadata::SourceMetadata,
    readiness::{Deadline, WaitCondition},
    schedule::SampleSchedule,
    source::MediaSource,
};

/// Targets further ahead than this are reached by seeking rather than by
/// decoding every frame in between.
const FORWARD_DECODE_LIMIT: Duration = Duration::from_secs(2);

/// Converts decoded frames to images, rebuilding the scaler when the input
/// layout changes.
struct FrameScaler {
    pixel_format: PixelFormat,
    context: Option<(ScalingContext, (Pixel, u32, u32))>,
    scaled: VideoFrame,
}

impl FrameScaler {
    fn new(pixel_format: PixelFormat) -> Self {
        Self {
            pixel_format,
            context: None,
            scaled: VideoFrame::empty(),
        }
    }

    fn to_image(&mut self, frame: &VideoFrame) -> Result<DynamicImage, FramepackError> {
        let (width, height) = (frame.width(), frame.height());
        let key = (frame.format(), width, height);

        let rebuild = !matches!(&self.context, Some((_, current)) if *current == key);
        if rebuild {
            let scaler = ScalingContext::get(
                frame.format(),
                width,
                height,
                self.pixel_format.to_ffmpeg_pixel(),
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.context = Some((scaler, key));
            self.scaled = VideoFrame::empty();
        }

        let Some((scaler, _)) = self.context.as_mut() else {
            return Err(FramepackError::VideoDecodeError(
                "Scaler unavailable".to_string(),
            ));
        };
        scaler.run(frame, &mut self.scaled)?;
        conversion::frame_to_image(&self.scaled, width, height, self.pixel_format)
    }
}

/// Frame-at-a-time access to one video stream.
///
/// The most recently decoded frame is kept as the "held" frame; backends
/// inspect its time and capture it once it reaches their target.
pub(crate) struct StreamDecoder {
    source: MediaSource,
    decoder: VideoDecoder,
    scaler: FrameScaler,
    scratch: VideoFrame,
    held: VideoFrame,
    has_held: bool,
    draining: bool,
    exhausted: bool,
    decoded_count: u64,
    #[cfg(feature = "hardware")]
    hardware_frames: bool,
}

impl StreamDecoder {
    /// Open a software decoder for the source's video stream.
    pub(crate) fn software(
        source: MediaSource,
        pixel_format: PixelFormat,
    ) -> Result<Self, FramepackError> {
        let decoder = source.codec_context()?.decoder().video()?;
        Ok(Self::with_decoder(source, decoder, pixel_format))
    }

    pub(crate) fn with_decoder(
        source: MediaSource,
        decoder: VideoDecoder,
        pixel_format: PixelFormat,
    ) -> Self {
        Self {
            source,
            decoder,
            scaler: FrameScaler::new(pixel_format),
            scratch: VideoFrame::empty(),
            held: VideoFrame::empty(),
            has_held: false,
            draining: false,
            exhausted: false,
            decoded_count: 0,
            #[cfg(feature = "hardware")]
            hardware_frames: false,
        }
    }

    /// Decoded frames live on a hardware device and must be transferred.
    #[cfg(feature = "hardware")]
    pub(crate) fn with_hardware_frames(mut self) -> Self {
        self.hardware_frames = true;
        self
    }

    pub(crate) fn metadata(&self) -> &SourceMetadata {
        &self.source.metadata
    }

    /// Seek to the keyframe at or before `target` and reset decoder state.
    pub(crate) fn seek(&mut self, target: Duration) -> Result<(), FramepackError> {
        let timestamp = conversion::duration_to_seek_timestamp(target);
        log::debug!("Seeking {} to {target:?}", self.source.path.display());
        self.source.input_context.seek(timestamp, ..timestamp)?;
        self.decoder.flush();
        self.has_held = false;
        self.draining = false;
        self.exhausted = false;
        self.decoded_count = 0;
        Ok(())
    }

    /// Decode the next frame into the held slot.
    ///
    /// Returns `false` once the stream is exhausted. Fails with
    /// [`FramepackError::DecodeTimeout`] if `deadline` expires first.
    pub(crate) fn advance(
        &mut self,
        condition: WaitCondition,
        target: Duration,
        deadline: &Deadline,
    ) -> Result<bool, FramepackError> {
        loop {
            let waiting_on = if self.draining {
                WaitCondition::DecoderFlushed
            } else {
                condition
            };
            deadline.check(waiting_on, target)?;

            if self.decoder.receive_frame(&mut self.scratch).is_ok() {
                mem::swap(&mut self.scratch, &mut self.held);
                self.has_held = true;
                self.decoded_count += 1;
                return Ok(true);
            }

            if self.draining {
                self.exhausted = true;
            }
            if self.exhausted {
                return Ok(false);
            }

            let next = self
                .source
                .input_context
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));

            match next {
                Some((index, packet)) if index == self.source.video_stream_index => {
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        log::debug!("Skipping undecodable packet: {error}");
                    }
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof()?;
                    self.draining = true;
                }
            }
        }
    }

    pub(crate) fn has_held(&self) -> bool {
        self.has_held
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Decode index (from the last seek) of the held frame.
    #[cfg(feature = "hardware")]
    pub(crate) fn held_index(&self) -> Option<u64> {
        self.has_held.then(|| self.decoded_count - 1)
    }

    /// Presentation time of the held frame, `ZERO` when nothing is held.
    pub(crate) fn held_time(&self) -> Duration {
        if !self.has_held {
            return Duration::ZERO;
        }
        let seconds = match self.held.timestamp().or(self.held.pts()) {
            Some(pts) => conversion::pts_to_seconds(pts, self.source.time_base),
            None => {
                (self.decoded_count - 1) as f64 * self.metadata().frame_duration().as_secs_f64()
            }
        };
        Duration::from_secs_f64(seconds.max(0.0))
    }

    /// Half a frame: how close a frame must be to count as "at" a target.
    pub(crate) fn tolerance(&self) -> Duration {
        self.metadata().frame_duration() / 2
    }

    /// Convert the held frame into a [`CapturedFrame`].
    pub(crate) fn capture_held(&mut self) -> Result<CapturedFrame, FramepackError> {
        if !self.has_held {
            return Err(FramepackError::VideoDecodeError(
                "No decoded frame available".to_string(),
            ));
        }
        let presentation_time = self.held_time();
        #[cfg(feature = "hardware")]
        let frame = software_frame(&self.held, self.hardware_frames)?;
        #[cfg(not(feature = "hardware"))]
        let frame = Cow::Borrowed(&self.held);
        let image = self.scaler.to_image(&frame)?;
        Ok(CapturedFrame {
            presentation_time,
            image,
        })
    }

    /// Capture after the stream ended before reaching `target`.
    ///
    /// A player seeked past the end keeps showing its final frame, so the
    /// last decoded frame stands in for the target.
    pub(crate) fn capture_at_end(&mut self, target: Duration) -> Result<CapturedFrame, FramepackError> {
        if !self.has_held {
            return Err(FramepackError::VideoDecodeError(format!(
                "No frame could be decoded at {target:?}"
            )));
        }
        log::warn!(
            "Stream ended before {target:?}; using last decoded frame at {:?}",
            self.held_time()
        );
        self.capture_held()
    }
}

/// Move a device frame into system memory when decoding on hardware.
#[cfg(feature = "hardware")]
fn software_frame(held: &VideoFrame, on_device: bool) -> Result<Cow<'_, VideoFrame>, FramepackError> {
    if !on_device {
        return Ok(Cow::Borrowed(held));
    }
    Ok(match crate::hardware::transfer_hardware_frame(held)? {
        Some(transferred) => Cow::Owned(transferred),
        None => Cow::Borrowed(held),
    })
}

/// Seeks to every sample time and decodes until the seek lands.
///
/// Each capture costs one seek plus the decode from the preceding keyframe,
/// independent of the previous capture.
pub struct SeekAndWaitBackend {
    stream: StreamDecoder,
}

impl SeekAndWaitBackend {
    /// Create the backend, taking ownership of `source`.
    pub fn new(source: MediaSource, pixel_format: PixelFormat) -> Result<Self, FramepackError> {
        Ok(Self {
            stream: StreamDecoder::software(source, pixel_format)?,
        })
    }
}

impl FrameBackend for SeekAndWaitBackend {
    fn metadata(&self) -> &SourceMetadata {
        self.stream.metadata()
    }

    fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::SeekAndWait
    }

    fn capture(
        &mut self,
        target: Duration,
        deadline: &Deadline,
    ) -> Result<CapturedFrame, FramepackError> {
        self.stream.seek(target)?;
        let tolerance = self.stream.tolerance();

        while self
            .stream
            .advance(WaitCondition::SeekComplete, target, deadline)?
        {
            if self.stream.held_time() + tolerance >= target {
                return self.stream.capture_held();
            }
        }
        self.stream.capture_at_end(target)
    }
}

/// Decodes forward and captures the next frame that reaches each target.
///
/// Seeks only at the start of a run, when the target lies behind the held
/// frame, or when it is too far ahead to be worth decoding up to.
pub struct FrameCallbackBackend {
    stream: StreamDecoder,
}

impl FrameCallbackBackend {
    /// Create the backend, taking ownership of `source`.
    pub fn new(source: MediaSource, pixel_format: PixelFormat) -> Result<Self, FramepackError> {
        Ok(Self {
            stream: StreamDecoder::software(source, pixel_format)?,
        })
    }
}

impl FrameBackend for FrameCallbackBackend {
    fn metadata(&self) -> &SourceMetadata {
        self.stream.metadata()
    }

    fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::FrameCallback
    }

    fn begin(&mut self, _schedule: &SampleSchedule) -> Result<(), FramepackError> {
        self.stream.seek(Duration::ZERO)
    }

    fn capture(
        &mut self,
        target: Duration,
        deadline: &Deadline,
    ) -> Result<CapturedFrame, FramepackError> {
        let tolerance = self.stream.tolerance();

        if self.stream.has_held() {
            let held = self.stream.held_time();
            if held + tolerance >= target && held <= target + tolerance {
                // Interval shorter than a frame: the held frame is still current.
                return self.stream.capture_held();
            }
            if self.stream.is_exhausted() {
                return self.stream.capture_at_end(target);
            }
            if held > target + tolerance || target > held + FORWARD_DECODE_LIMIT {
                self.stream.seek(target)?;
            }
        }

        while self
            .stream
            .advance(WaitCondition::FrameReady, target, deadline)?
        {
            if self.stream.held_time() + tolerance >= target {
                return self.stream.capture_held();
            }
        }
        self.stream.capture_at_end(target)
    }
}
