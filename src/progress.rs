//! Progress reporting.
//!
//! Long operations (sampling a whole video, building a large archive,
//! re-encoding) report through a [`ProgressCallback`]. Callbacks observe the
//! run; they cannot stop it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framepack::{ExtractOptions, ExtractionSession, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.0}%", info.operation);
//!         }
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! let mut session = ExtractionSession::open("input.mp4", options)?;
//! let frames = session.extract(1.0)?;
//! # Ok::<(), framepack::FramepackError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// The kind of operation reporting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Sampling and packaging frames.
    FrameSampling,
    /// Writing frames into a zip archive.
    ArchiveBuilding,
    /// Re-encoding collected frames into a video.
    Reencoding,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// Items (frames or entries) processed so far.
    pub current: u64,
    /// Total items expected, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Index of the item just processed.
    pub current_index: Option<u64>,
    /// Timestamp of the frame just processed.
    pub current_timestamp: Option<Duration>,
}

/// Receives progress updates.
///
/// Implementations must be [`Send`] and [`Sync`]: the async stream drives
/// sampling from a blocking worker thread.
pub trait ProgressCallback: Send + Sync {
    /// Called at the configured cadence during an operation.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks timing and emits callbacks every `batch_size` items.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one completed item.
    pub(crate) fn advance(&mut self, index: Option<u64>, timestamp: Option<Duration>) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(index, timestamp);
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self) {
        self.report(None, None);
    }

    fn report(&self, index: Option<u64>, timestamp: Option<Duration>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| ((self.current as f32 / total as f32) * 100.0).min(100.0));

        let estimated_remaining = if self.current > 0 {
            self.total.map(|total| {
                let remaining = total.saturating_sub(self.current);
                elapsed.div_f64(self.current as f64).mul_f64(remaining as f64)
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_index: index,
            current_timestamp: timestamp,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        infos: Mutex<Vec<ProgressInfo>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.infos.lock().unwrap().push(info.clone());
        }
    }

    #[test]
    fn reports_every_batch_and_on_finish() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::FrameSampling, Some(5), 2);
        for index in 0..5 {
            tracker.advance(Some(index), None);
        }
        tracker.finish();

        let infos = recorder.infos.lock().unwrap();
        let currents: Vec<u64> = infos.iter().map(|info| info.current).collect();
        assert_eq!(currents, vec![2, 4, 5]);
        assert_eq!(infos.last().unwrap().percentage, Some(100.0));
        assert_eq!(infos[0].current_index, Some(1));
    }

    #[test]
    fn unknown_total_has_no_percentage() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::Reencoding, None, 1);
        tracker.advance(None, None);

        let infos = recorder.infos.lock().unwrap();
        assert_eq!(infos[0].percentage, None);
        assert_eq!(infos[0].estimated_remaining, None);
        assert_eq!(infos[0].operation, OperationType::Reencoding);
    }
}
