//! Pixel and timestamp conversion helpers.
//!
//! Shared by the decode backends and the re-encoder: stripping FFmpeg row
//! padding, building [`DynamicImage`] values from scaled frames, and moving
//! between stream time bases, seconds and seek timestamps.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::{config::PixelFormat, error::FramepackError};

/// Copy plane 0 of a frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp).
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_len = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_len {
        data[..row_len * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_len * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_len]);
        }
        buffer
    }
}

/// Copy a packed RGB24 buffer into plane 0 of a frame, honouring its stride.
pub(crate) fn rgb_buffer_to_frame(rgb: &[u8], width: u32, height: u32, frame: &mut VideoFrame) {
    let stride = frame.stride(0);
    let row_len = (width as usize) * 3;
    let plane = frame.data_mut(0);
    for row in 0..(height as usize) {
        let src_start = row * row_len;
        let dst_start = row * stride;
        plane[dst_start..dst_start + row_len].copy_from_slice(&rgb[src_start..src_start + row_len]);
    }
}

/// Build an image from a frame already scaled to `pixel_format`.
pub(crate) fn frame_to_image(
    scaled: &VideoFrame,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
) -> Result<DynamicImage, FramepackError> {
    let buffer = frame_to_buffer(scaled, width, height, pixel_format.bytes_per_pixel());
    let image = match pixel_format {
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => {
            RgbaImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Gray8 => {
            GrayImage::from_raw(width, height, average_gray(&buffer)).map(DynamicImage::ImageLuma8)
        }
    };
    image.ok_or_else(|| {
        FramepackError::VideoDecodeError(
            "Failed to construct image from decoded frame data".to_string(),
        )
    })
}

/// Collapse packed RGB24 to one byte per pixel: `(r + g + b) / 3`.
pub(crate) fn average_gray(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|pixel| ((u16::from(pixel[0]) + u16::from(pixel[1]) + u16::from(pixel[2])) / 3) as u8)
        .collect()
}

/// Rescale a PTS value from a stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert a [`Duration`] to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `Input::seek` goes through `avformat_seek_file` with no stream index,
/// which expects AV_TIME_BASE units rather than the stream time base.
pub(crate) fn duration_to_seek_timestamp(duration: Duration) -> i64 {
    duration.as_micros() as i64
}
