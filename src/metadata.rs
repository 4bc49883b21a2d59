//! Source metadata.
//!
//! [`SourceMetadata`] is read once when a [`MediaSource`](crate::MediaSource)
//! is opened and cached for the lifetime of the source.

use std::time::Duration;

/// Properties of the video stream being sampled.
///
/// # Example
///
/// ```no_run
/// use framepack::MediaSource;
///
/// let source = MediaSource::open("input.mp4").unwrap();
/// let metadata = source.metadata();
/// println!("{}x{} for {:?}", metadata.width, metadata.height, metadata.duration);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct SourceMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Total duration of the media.
    pub duration: Duration,
    /// Frames per second (approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of frames, from duration and frame rate.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
}

impl SourceMetadata {
    /// Duration of one frame at the nominal frame rate.
    ///
    /// Falls back to 1/30 s when the frame rate is unknown.
    pub fn frame_duration(&self) -> Duration {
        if self.frames_per_second.is_finite() && self.frames_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / self.frames_per_second)
        } else {
            Duration::from_secs_f64(1.0 / 30.0)
        }
    }
}
