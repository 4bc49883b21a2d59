//! Frame capture strategies.
//!
//! A [`FrameBackend`] answers one question: "give me the bitmap at time t".
//! The sampler drives it one timestamp at a time, in increasing order, and
//! never cares how the backend positions its decoder. Which backend a
//! session uses is decided once, by [`select_backend`], when the source is
//! loaded.

use std::time::Duration;

use image::DynamicImage;

use crate::{
    config::ExtractOptions,
    decode::{FrameCallbackBackend, SeekAndWaitBackend},
    error::FramepackError,
    metadata::SourceMetadata,
    readiness::Deadline,
    schedule::SampleSchedule,
    source::MediaSource,
};

/// How a backend waits for the frame at each sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingStrategy {
    /// Seek to every sample time and decode until the seek target is
    /// reached.
    SeekAndWait,
    /// Decode forward and take the next frame that reaches the sample time,
    /// seeking only when the target lies behind the decoder.
    #[default]
    FrameCallback,
    /// Decode the whole stream once on a hardware device and keep every
    /// `round(interval × fps)`-th frame. Falls back to
    /// [`FrameCallback`](SamplingStrategy::FrameCallback) when no device is
    /// usable.
    Accelerated,
}

/// A frame produced by a backend for one sample time.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// The decoded frame's own presentation time.
    pub presentation_time: Duration,
    /// The frame pixels.
    pub image: DynamicImage,
}

/// Source of bitmaps for the sampler.
///
/// `capture` is called with strictly increasing targets after one call to
/// `begin`. Implementations must check `deadline` while they wait and return
/// [`FramepackError::DecodeTimeout`] once it expires.
pub trait FrameBackend {
    /// Metadata of the media being sampled.
    fn metadata(&self) -> &SourceMetadata;

    /// The strategy this backend implements.
    fn strategy(&self) -> SamplingStrategy;

    /// Rewind before a new run over `schedule`.
    fn begin(&mut self, _schedule: &SampleSchedule) -> Result<(), FramepackError> {
        Ok(())
    }

    /// Produce the frame for `target`.
    fn capture(
        &mut self,
        target: Duration,
        deadline: &Deadline,
    ) -> Result<CapturedFrame, FramepackError>;
}

/// Choose and construct the backend for `source`.
///
/// [`SamplingStrategy::Accelerated`] needs the `hardware` feature and a
/// hardware decoder for the stream's codec; otherwise the frame-callback
/// backend is used and a warning is logged.
pub fn select_backend(
    source: MediaSource,
    options: &ExtractOptions,
) -> Result<Box<dyn FrameBackend>, FramepackError> {
    let pixel_format = options.pixel_format;
    match options.strategy {
        SamplingStrategy::SeekAndWait => {
            Ok(Box::new(SeekAndWaitBackend::new(source, pixel_format)?))
        }
        SamplingStrategy::FrameCallback => {
            Ok(Box::new(FrameCallbackBackend::new(source, pixel_format)?))
        }
        SamplingStrategy::Accelerated => accelerated_or_fallback(source, options),
    }
}

#[cfg(feature = "hardware")]
fn accelerated_or_fallback(
    source: MediaSource,
    options: &ExtractOptions,
) -> Result<Box<dyn FrameBackend>, FramepackError> {
    use crate::hardware::{AcceleratedBackend, try_create_hardware_decoder};

    let setup = try_create_hardware_decoder(source.codec_context()?, options.hardware_acceleration)?;
    if setup.hardware_active {
        log::debug!("Hardware decoder active for {}", source.path().display());
        return Ok(Box::new(AcceleratedBackend::new(
            source,
            setup.decoder,
            options.pixel_format,
        )));
    }

    log::warn!("No usable hardware decoder; falling back to frame-callback sampling");
    Ok(Box::new(FrameCallbackBackend::new(source, options.pixel_format)?))
}

#[cfg(not(feature = "hardware"))]
fn accelerated_or_fallback(
    source: MediaSource,
    options: &ExtractOptions,
) -> Result<Box<dyn FrameBackend>, FramepackError> {
    log::warn!(
        "Accelerated sampling requires the `hardware` feature; falling back to frame-callback sampling"
    );
    Ok(Box::new(FrameCallbackBackend::new(source, options.pixel_format)?))
}
