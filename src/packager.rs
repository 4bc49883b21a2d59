//! Rendering sampled frames into encoded images.
//!
//! The [`Packager`] turns each [`SampledFrame`] into an [`EncodedFrame`]
//! (PNG by default) and appends it to a [`FrameCollection`]. When thumbnail
//! options are set it also keeps a downscaled preview of every Kth frame;
//! previews are for display and never enter archives.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use framepack::{FrameCollection, FrameImageFormat, Packager, SampledFrame};
//! use image::{DynamicImage, RgbImage};
//!
//! let packager = Packager::new(FrameImageFormat::Png);
//! let mut collection = FrameCollection::new();
//! packager.accumulate(
//!     &mut collection,
//!     SampledFrame {
//!         index: 0,
//!         timestamp: Duration::ZERO,
//!         presentation_time: Duration::ZERO,
//!         image: DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
//!     },
//! )?;
//! assert_eq!(collection.len(), 1);
//! # Ok::<(), framepack::FramepackError>(())
//! ```

use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageError, ImageFormat, imageops::FilterType};

use crate::{error::FramepackError, sampler::SampledFrame};

/// Image format used for stored frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameImageFormat {
    /// Lossless PNG. This is the default.
    #[default]
    Png,
    /// Baseline JPEG. Alpha is dropped.
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
    /// Lossless WebP.
    WebP,
}

impl FrameImageFormat {
    /// File extension used for archive entries.
    pub fn extension(self) -> &'static str {
        match self {
            FrameImageFormat::Png => "png",
            FrameImageFormat::Jpeg => "jpg",
            FrameImageFormat::Bmp => "bmp",
            FrameImageFormat::WebP => "webp",
        }
    }

    /// Parse a format name or extension (case-insensitive).
    pub fn from_extension(value: &str) -> Option<Self> {
        match value.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(FrameImageFormat::Png),
            "jpg" | "jpeg" => Some(FrameImageFormat::Jpeg),
            "bmp" => Some(FrameImageFormat::Bmp),
            "webp" => Some(FrameImageFormat::WebP),
            _ => None,
        }
    }

    fn to_image_format(self) -> ImageFormat {
        match self {
            FrameImageFormat::Png => ImageFormat::Png,
            FrameImageFormat::Jpeg => ImageFormat::Jpeg,
            FrameImageFormat::Bmp => ImageFormat::Bmp,
            FrameImageFormat::WebP => ImageFormat::WebP,
        }
    }
}

/// Encodes bitmaps into one [`FrameImageFormat`].
///
/// Encoding is deterministic: the same image always yields the same bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    format: FrameImageFormat,
}

impl FrameEncoder {
    /// Create an encoder for `format`.
    pub fn new(format: FrameImageFormat) -> Self {
        Self { format }
    }

    /// The output format.
    pub fn format(&self) -> FrameImageFormat {
        self.format
    }

    /// Encode `image` into a new buffer.
    ///
    /// # Errors
    ///
    /// [`FramepackError::EncodingUnsupported`] when no encoder for the
    /// format is available for this image's color type.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, FramepackError> {
        let converted;
        let image = match self.format {
            FrameImageFormat::Jpeg if image.color().has_alpha() => {
                converted = DynamicImage::ImageRgb8(image.to_rgb8());
                &converted
            }
            FrameImageFormat::WebP if !image.color().has_color() => {
                converted = DynamicImage::ImageRgb8(image.to_rgb8());
                &converted
            }
            _ => image,
        };

        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), self.format.to_image_format())
            .map_err(|error| match error {
                ImageError::Unsupported(reason) => FramepackError::EncodingUnsupported(format!(
                    "{}: {reason}",
                    self.format.extension()
                )),
                other => FramepackError::ImageError(other),
            })?;
        Ok(buffer)
    }
}

/// One encoded frame held in a [`FrameCollection`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    /// Position in the run, starting at 0.
    pub index: u64,
    /// Scheduled sample time.
    pub timestamp: Duration,
    /// Presentation time of the decoded frame.
    pub presentation_time: Duration,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Encoding of `data`.
    pub format: FrameImageFormat,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

/// A downscaled preview of one frame.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Index of the frame this previews.
    pub index: u64,
    /// Scheduled sample time of that frame.
    pub timestamp: Duration,
    /// The preview image.
    pub image: DynamicImage,
}

/// Preview generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ThumbnailOptions {
    /// Longest edge of a preview, in pixels.
    pub max_dimension: u32,
    /// Keep a preview for every Nth frame (1 = every frame).
    pub every: u64,
}

impl ThumbnailOptions {
    /// Previews of every frame, at most `max_dimension` pixels on the long edge.
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            every: 1,
        }
    }

    /// Keep a preview for every `n`th frame only. Clamped to at least 1.
    pub fn every(mut self, n: u64) -> Self {
        self.every = n.max(1);
        self
    }

    fn render(&self, image: &DynamicImage) -> DynamicImage {
        let (width, height) = fit_dimensions(image.width(), image.height(), self.max_dimension);
        if (width, height) == (image.width(), image.height()) {
            return image.clone();
        }
        image.resize_exact(width, height, FilterType::Triangle)
    }
}

/// Scale `width × height` so the longest edge is at most `max_dimension`.
///
/// Never upscales.
fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (max_dimension as f64 / width.max(height) as f64).min(1.0);
    let new_width = ((width as f64) * scale).round() as u32;
    let new_height = ((height as f64) * scale).round() as u32;
    (new_width.max(1), new_height.max(1))
}

/// Ordered collection of encoded frames produced by one extraction run.
///
/// Timestamps are strictly increasing; the collection is owned by whoever
/// started the run and is handed on to the archive builder or re-encoder.
#[derive(Debug, Clone, Default)]
pub struct FrameCollection {
    frames: Vec<EncodedFrame>,
    thumbnails: Vec<Thumbnail>,
}

impl FrameCollection {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty collection with room for `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            thumbnails: Vec::new(),
        }
    }

    /// Append a frame.
    ///
    /// # Errors
    ///
    /// [`FramepackError::InvalidParameter`] if `frame.timestamp` does not
    /// come after the last stored timestamp.
    pub fn push(&mut self, frame: EncodedFrame) -> Result<(), FramepackError> {
        if let Some(last) = self.frames.last() {
            if frame.timestamp <= last.timestamp {
                return Err(FramepackError::invalid_parameter(
                    "timestamp",
                    frame.timestamp.as_secs_f64(),
                    "must come after the previous frame",
                ));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn push_thumbnail(&mut self, thumbnail: Thumbnail) {
        self.thumbnails.push(thumbnail);
    }

    /// Stored frames, in timestamp order.
    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }

    /// Preview list.
    pub fn thumbnails(&self) -> &[Thumbnail] {
        &self.thumbnails
    }

    /// Number of stored frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no frames are stored.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Scheduled timestamps of all stored frames.
    pub fn timestamps(&self) -> Vec<Duration> {
        self.frames.iter().map(|frame| frame.timestamp).collect()
    }

    /// Iterate over stored frames.
    pub fn iter(&self) -> std::slice::Iter<'_, EncodedFrame> {
        self.frames.iter()
    }
}

impl<'a> IntoIterator for &'a FrameCollection {
    type Item = &'a EncodedFrame;
    type IntoIter = std::slice::Iter<'a, EncodedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Encodes sampled frames and accumulates them.
#[derive(Debug, Clone, Copy)]
pub struct Packager {
    encoder: FrameEncoder,
    thumbnails: Option<ThumbnailOptions>,
}

impl Packager {
    /// A packager that encodes to `format` and keeps no previews.
    pub fn new(format: FrameImageFormat) -> Self {
        Self {
            encoder: FrameEncoder::new(format),
            thumbnails: None,
        }
    }

    /// Also keep previews according to `options`.
    #[must_use]
    pub fn with_thumbnails(mut self, options: Option<ThumbnailOptions>) -> Self {
        self.thumbnails = options;
        self
    }

    /// Encode one frame without storing it.
    pub fn render(&self, frame: &SampledFrame) -> Result<EncodedFrame, FramepackError> {
        Ok(EncodedFrame {
            index: frame.index,
            timestamp: frame.timestamp,
            presentation_time: frame.presentation_time,
            width: frame.image.width(),
            height: frame.image.height(),
            format: self.encoder.format(),
            data: self.encoder.encode(&frame.image)?,
        })
    }

    /// Encode `frame`, append it to `collection`, and emit its preview.
    pub fn accumulate(
        &self,
        collection: &mut FrameCollection,
        frame: SampledFrame,
    ) -> Result<(), FramepackError> {
        let encoded = self.render(&frame)?;
        collection.push(encoded)?;

        if let Some(options) = &self.thumbnails {
            if frame.index % options.every == 0 {
                collection.push_thumbnail(Thumbnail {
                    index: frame.index,
                    timestamp: frame.timestamp,
                    image: options.render(&frame.image),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_dimensions_preserves_aspect() {
        assert_eq!(fit_dimensions(1920, 1080, 640), (640, 360));
        assert_eq!(fit_dimensions(1080, 1920, 640), (360, 640));
    }

    #[test]
    fn fit_dimensions_never_upscales() {
        assert_eq!(fit_dimensions(100, 50, 640), (100, 50));
    }

    #[test]
    fn extension_round_trip() {
        for format in [
            FrameImageFormat::Png,
            FrameImageFormat::Jpeg,
            FrameImageFormat::Bmp,
            FrameImageFormat::WebP,
        ] {
            assert_eq!(FrameImageFormat::from_extension(format.extension()), Some(format));
        }
        assert_eq!(FrameImageFormat::from_extension(".JPEG"), Some(FrameImageFormat::Jpeg));
        assert_eq!(FrameImageFormat::from_extension("gif"), None);
    }

    #[test]
    fn thumbnail_every_clamps_to_one() {
        assert_eq!(ThumbnailOptions::new(100).every(0).every, 1);
    }
}
