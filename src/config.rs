//! Extraction configuration.
//!
//! [`ExtractOptions`] is a builder that carries the sampling strategy,
//! decode timeout, output format, preview settings and progress reporting
//! into an [`ExtractionSession`](crate::ExtractionSession) without growing
//! every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use framepack::{
//!     ExtractOptions, FrameImageFormat, ProgressCallback, ProgressInfo, SamplingStrategy,
//!     ThumbnailOptions,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let options = ExtractOptions::new()
//!     .with_strategy(SamplingStrategy::SeekAndWait)
//!     .with_decode_timeout(Duration::from_secs(5))
//!     .with_image_format(FrameImageFormat::Jpeg)
//!     .with_thumbnails(ThumbnailOptions::new(160).every(4))
//!     .with_progress(Arc::new(LogProgress));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_next::format::Pixel;

use crate::backend::SamplingStrategy;
use crate::packager::{FrameImageFormat, ThumbnailOptions};
use crate::progress::{NoOpProgress, ProgressCallback};
use crate::readiness::DEFAULT_DECODE_TIMEOUT;

#[cfg(feature = "hardware")]
use crate::hardware::HardwareAccelerationMode;

/// Pixel layout of sampled frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bpp). This is the default.
    #[default]
    Rgb8,
    /// 8-bit RGBA with alpha set to 255 (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp), the unweighted mean `(r + g + b) / 3` of
    /// each RGB pixel.
    Gray8,
}

impl PixelFormat {
    /// FFmpeg pixel format the scaler produces for this layout.
    ///
    /// Gray8 is scaled to RGB24 and averaged afterwards; swscale's own GRAY8
    /// output is BT.601-weighted luma.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Gray8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
        }
    }

    /// Bytes per pixel of the scaler output.
    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Gray8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Settings for an extraction run.
///
/// A default-constructed value samples with
/// [`SamplingStrategy::FrameCallback`], waits at most 10 seconds per frame,
/// encodes RGB PNGs and produces no thumbnails.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) strategy: SamplingStrategy,
    pub(crate) decode_timeout: Duration,
    pub(crate) pixel_format: PixelFormat,
    pub(crate) image_format: FrameImageFormat,
    pub(crate) thumbnails: Option<ThumbnailOptions>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Fire the progress callback every N frames.
    pub(crate) batch_size: u64,
    #[cfg(feature = "hardware")]
    pub(crate) hardware_acceleration: HardwareAccelerationMode,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("strategy", &self.strategy)
            .field("decode_timeout", &self.decode_timeout)
            .field("pixel_format", &self.pixel_format)
            .field("image_format", &self.image_format)
            .field("thumbnails", &self.thumbnails)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            strategy: SamplingStrategy::default(),
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
            pixel_format: PixelFormat::default(),
            image_format: FrameImageFormat::default(),
            thumbnails: None,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
            #[cfg(feature = "hardware")]
            hardware_acceleration: HardwareAccelerationMode::Auto,
        }
    }

    /// Choose how the sampler waits for each frame.
    ///
    /// The strategy is resolved once, when the session loads its source.
    #[must_use]
    pub fn with_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Maximum time one sampling step may wait for its frame.
    #[must_use]
    pub fn with_decode_timeout(mut self, timeout: Duration) -> Self {
        self.decode_timeout = timeout;
        self
    }

    /// Pixel layout of captured frames.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Image format stored in the collection and the archive.
    #[must_use]
    pub fn with_image_format(mut self, format: FrameImageFormat) -> Self {
        self.image_format = format;
        self
    }

    /// Produce preview thumbnails while packaging.
    #[must_use]
    pub fn with_thumbnails(mut self, thumbnails: ThumbnailOptions) -> Self {
        self.thumbnails = Some(thumbnails);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Hardware device selection for [`SamplingStrategy::Accelerated`].
    #[cfg(feature = "hardware")]
    #[must_use]
    pub fn with_hardware_acceleration(mut self, mode: HardwareAccelerationMode) -> Self {
        self.hardware_acceleration = mode;
        self
    }

    /// The configured strategy.
    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// The configured per-frame timeout.
    pub fn decode_timeout(&self) -> Duration {
        self.decode_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ExtractOptions::new();
        assert_eq!(options.strategy(), SamplingStrategy::FrameCallback);
        assert_eq!(options.decode_timeout(), Duration::from_secs(10));
        assert_eq!(options.pixel_format, PixelFormat::Rgb8);
        assert_eq!(options.image_format, FrameImageFormat::Png);
        assert!(options.thumbnails.is_none());
    }

    #[test]
    fn batch_size_clamps_zero() {
        let options = ExtractOptions::new().with_batch_size(0);
        assert_eq!(options.batch_size, 1);
    }

    #[test]
    fn debug_lists_settings() {
        let debug = format!("{:?}", ExtractOptions::new().with_batch_size(5));
        assert!(debug.contains("ExtractOptions"));
        assert!(debug.contains("batch_size: 5"));
    }

    #[test]
    fn bytes_per_pixel_matches_layout() {
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Gray8.to_ffmpeg_pixel(), Pixel::RGB24);
    }
}
