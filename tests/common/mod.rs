//! A scripted [`FrameBackend`] for tests that need no FFmpeg fixtures.

#![allow(dead_code)]

use std::time::Duration;

use framepack::{
    CapturedFrame, Deadline, FrameBackend, FramepackError, SampleSchedule, SamplingStrategy,
    SourceMetadata, WaitCondition,
};
use image::{DynamicImage, Rgb, RgbImage};

pub fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

pub fn metadata(duration_secs: f64) -> SourceMetadata {
    SourceMetadata {
        width: 8,
        height: 6,
        duration: Duration::from_secs_f64(duration_secs),
        frames_per_second: 30.0,
        frame_count: (duration_secs * 30.0).round() as u64,
        codec: "synthetic".to_string(),
        format: "synthetic".to_string(),
    }
}

/// Shades each frame by its capture order so output can be traced back.
pub fn shaded_image(shade: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([shade, 0, 255 - shade])))
}

/// Answers every capture immediately with the frame at the target time,
/// except targets listed in `stall_at`, where it waits until the deadline
/// expires.
pub struct ScriptedBackend {
    metadata: SourceMetadata,
    pub begins: usize,
    pub targets: Vec<Duration>,
    pub stall_at: Vec<Duration>,
}

impl ScriptedBackend {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            metadata: metadata(duration_secs),
            begins: 0,
            targets: Vec::new(),
            stall_at: Vec::new(),
        }
    }

    pub fn stalling_at(mut self, target: Duration) -> Self {
        self.stall_at.push(target);
        self
    }
}

impl FrameBackend for ScriptedBackend {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::FrameCallback
    }

    fn begin(&mut self, _schedule: &SampleSchedule) -> Result<(), FramepackError> {
        self.begins += 1;
        self.targets.clear();
        Ok(())
    }

    fn capture(
        &mut self,
        target: Duration,
        deadline: &Deadline,
    ) -> Result<CapturedFrame, FramepackError> {
        self.targets.push(target);
        if self.stall_at.contains(&target) {
            loop {
                deadline.check(WaitCondition::FrameReady, target)?;
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        Ok(CapturedFrame {
            presentation_time: target,
            image: shaded_image((self.targets.len() as u8).wrapping_mul(40)),
        })
    }
}
