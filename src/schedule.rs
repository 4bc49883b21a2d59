//! Sample timestamp scheduling.
//!
//! [`SampleSchedule`] turns a sampling interval and a media duration into the
//! sequence of timestamps `0, interval, 2·interval, …` strictly below the
//! duration. The Nth timestamp is computed as `N × interval` rather than by
//! repeated addition, so long schedules with inexact intervals do not drift.

use std::time::Duration;

use crate::error::{FramepackError, require_positive};

/// Most samples a single schedule may hold.
///
/// Intervals that would produce more are rejected with
/// [`FramepackError::InvalidParameter`] instead of being sampled.
pub const MAX_SCHEDULE_LEN: u64 = 10_000_000;

/// The timestamps an extraction run will sample.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use framepack::SampleSchedule;
///
/// let schedule = SampleSchedule::new(2.0, Duration::from_secs(5))?;
/// let times: Vec<f64> = schedule.iter().map(|(_, t)| t.as_secs_f64()).collect();
/// assert_eq!(times, vec![0.0, 2.0, 4.0]);
/// # Ok::<(), framepack::FramepackError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSchedule {
    interval: f64,
    duration: f64,
    len: u64,
}

impl SampleSchedule {
    /// Build a schedule for `interval_secs` over `duration`.
    ///
    /// # Errors
    ///
    /// [`FramepackError::InvalidParameter`] if `interval_secs` is not a
    /// finite value greater than zero, or is so small that the schedule
    /// would exceed [`MAX_SCHEDULE_LEN`] samples.
    pub fn new(interval_secs: f64, duration: Duration) -> Result<Self, FramepackError> {
        let interval = require_positive("interval", interval_secs)?;
        let duration = duration.as_secs_f64();
        let too_many = || {
            FramepackError::invalid_parameter(
                "interval",
                interval,
                "produces more samples than the schedule limit",
            )
        };

        let ratio = duration / interval;
        if !ratio.is_finite() || ratio > MAX_SCHEDULE_LEN as f64 {
            return Err(too_many());
        }

        // ceil(duration / interval), then nudged so every entry stays < duration.
        let mut len = ratio.ceil() as u64;
        while len > 0 && (len - 1) as f64 * interval >= duration {
            len -= 1;
        }
        while (len as f64) * interval < duration {
            len = len.checked_add(1).ok_or_else(too_many)?;
        }
        if len > MAX_SCHEDULE_LEN {
            return Err(too_many());
        }

        Ok(Self {
            interval,
            duration,
            len,
        })
    }

    /// The sampling interval in seconds.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// The media duration the schedule covers.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration)
    }

    /// Number of samples.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if nothing will be sampled (zero-length media).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The timestamp of sample `index`, or `None` past the end.
    pub fn timestamp(&self, index: u64) -> Option<Duration> {
        (index < self.len).then(|| Duration::from_secs_f64(index as f64 * self.interval))
    }

    /// Iterate `(index, timestamp)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Duration)> + '_ {
        (0..self.len).map(|index| (index, Duration::from_secs_f64(index as f64 * self.interval)))
    }

    /// Decode-index stride for a stream running at `frames_per_second`.
    ///
    /// Used by index-based sampling: a frame is kept when its decode index
    /// is a multiple of `round(interval × frames_per_second)`, never less
    /// than 1.
    pub fn frame_stride(&self, frames_per_second: f64) -> u64 {
        if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
            return 1;
        }
        ((self.interval * frames_per_second).round() as u64).max(1)
    }
}
