//! The frame sampler.
//!
//! [`FrameSampler`] walks a [`SampleSchedule`] against a [`FrameBackend`],
//! capturing one frame per timestamp, strictly in order. Sampling is lazy:
//! nothing is decoded until the iterator is advanced.
//!
//! # Example
//!
//! ```no_run
//! use framepack::{ExtractOptions, FrameSampler, MediaSource, select_backend};
//!
//! let source = MediaSource::open("input.mp4")?;
//! let options = ExtractOptions::new();
//! let mut backend = select_backend(source, &options)?;
//!
//! for sample in FrameSampler::new(backend.as_mut(), 2.0, options.decode_timeout())? {
//!     let frame = sample?;
//!     frame.image.save(format!("frame_{}.png", frame.index))?;
//! }
//! # Ok::<(), framepack::FramepackError>(())
//! ```

use std::time::Duration;

use image::DynamicImage;

use crate::{
    backend::FrameBackend,
    error::FramepackError,
    readiness::Deadline,
    schedule::SampleSchedule,
};

/// One captured still.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Position in the run, starting at 0.
    pub index: u64,
    /// Scheduled time: `index × interval`.
    pub timestamp: Duration,
    /// Presentation time of the decoded frame that was captured.
    pub presentation_time: Duration,
    /// Frame pixels at the source resolution.
    pub image: DynamicImage,
}

/// Entry point for sampling a backend at a fixed interval.
pub struct FrameSampler;

impl FrameSampler {
    /// Sample `backend` every `interval_secs` seconds of its duration.
    ///
    /// The backend is rewound before the first capture, so sampling the same
    /// backend twice yields the same timestamps.
    ///
    /// # Errors
    ///
    /// - [`FramepackError::InvalidParameter`] for a non-positive interval.
    /// - Any error from rewinding the backend.
    pub fn new(
        backend: &mut dyn FrameBackend,
        interval_secs: f64,
        decode_timeout: Duration,
    ) -> Result<Samples<'_>, FramepackError> {
        let schedule = SampleSchedule::new(interval_secs, backend.metadata().duration)?;
        Self::with_schedule(backend, schedule, decode_timeout)
    }

    /// Sample `backend` along a prepared schedule.
    pub fn with_schedule(
        backend: &mut dyn FrameBackend,
        schedule: SampleSchedule,
        decode_timeout: Duration,
    ) -> Result<Samples<'_>, FramepackError> {
        log::debug!(
            "Sampling {} frames every {}s ({:?})",
            schedule.len(),
            schedule.interval(),
            backend.strategy(),
        );
        backend.begin(&schedule)?;
        Ok(Samples {
            backend,
            schedule,
            decode_timeout,
            next_index: 0,
            failed: false,
        })
    }
}

/// Lazy sequence of [`SampledFrame`]s.
///
/// Fused: after yielding an error it yields `None`.
pub struct Samples<'a> {
    backend: &'a mut dyn FrameBackend,
    schedule: SampleSchedule,
    decode_timeout: Duration,
    next_index: u64,
    failed: bool,
}

impl Samples<'_> {
    /// The schedule being sampled.
    pub fn schedule(&self) -> &SampleSchedule {
        &self.schedule
    }
}

impl Iterator for Samples<'_> {
    type Item = Result<SampledFrame, FramepackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let index = self.next_index;
        let timestamp = self.schedule.timestamp(index)?;
        self.next_index += 1;

        let deadline = Deadline::start(self.decode_timeout);
        match self.backend.capture(timestamp, &deadline) {
            Ok(captured) => Some(Ok(SampledFrame {
                index,
                timestamp,
                presentation_time: captured.presentation_time,
                image: captured.image,
            })),
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self.schedule.len().saturating_sub(self.next_index) as usize;
        (0, Some(remaining))
    }
}
