//! Extraction sessions.
//!
//! An [`ExtractionSession`] owns the loaded media and the backend chosen for
//! it. Each call to [`extract`](ExtractionSession::extract) is one run: it
//! samples the whole video, packages every frame and returns a fresh
//! [`FrameCollection`]. Loading another file releases the previous one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    backend::{FrameBackend, SamplingStrategy, select_backend},
    config::ExtractOptions,
    error::FramepackError,
    metadata::SourceMetadata,
    packager::{FrameCollection, Packager},
    progress::{OperationType, ProgressTracker},
    sampler::{FrameSampler, Samples},
    schedule::SampleSchedule,
    source::MediaSource,
};

/// Upper bound on the frames reserved before a run starts; longer runs grow
/// the collection as frames arrive.
const PREALLOCATED_FRAMES: u64 = 4096;

/// Admits one extraction run at a time.
///
/// Clones share state, so a UI can hold a clone and query
/// [`is_running`](RunGate::is_running) while another thread extracts, and
/// several sessions can be made mutually exclusive with
/// [`ExtractionSession::with_run_gate`].
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    running: Arc<AtomicBool>,
}

impl RunGate {
    /// A gate with no run in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a run currently holds the gate.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the gate for one run.
    ///
    /// # Errors
    ///
    /// [`FramepackError::RunInProgress`] if another run holds it.
    pub fn try_acquire(&self) -> Result<RunPermit, FramepackError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FramepackError::RunInProgress)?;
        Ok(RunPermit {
            running: Arc::clone(&self.running),
        })
    }
}

/// Proof of a claimed [`RunGate`]. Releases the gate when dropped.
#[derive(Debug)]
#[must_use]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// A loaded video ready to be sampled.
///
/// # Example
///
/// ```no_run
/// use framepack::{ArchiveBuilder, ExtractOptions, ExtractionSession};
///
/// let mut session = ExtractionSession::open("input.mp4", ExtractOptions::new())?;
/// println!("{:?}", session.metadata().duration);
///
/// let frames = session.extract(2.0)?;
/// println!("{} frames", frames.len());
/// # Ok::<(), framepack::FramepackError>(())
/// ```
pub struct ExtractionSession {
    backend: Box<dyn FrameBackend>,
    options: ExtractOptions,
    gate: RunGate,
    path: PathBuf,
}

impl ExtractionSession {
    /// Open `path` and select its backend from `options`.
    ///
    /// # Errors
    ///
    /// - [`FramepackError::FileOpen`] if the file cannot be read.
    /// - [`FramepackError::NoVideoStream`] if it has no video.
    pub fn open<P: AsRef<Path>>(path: P, options: ExtractOptions) -> Result<Self, FramepackError> {
        let path = path.as_ref().to_path_buf();
        let backend = select_backend(MediaSource::open(&path)?, &options)?;
        Ok(Self {
            backend,
            options,
            gate: RunGate::new(),
            path,
        })
    }

    /// Build a session around an already constructed backend.
    ///
    /// Useful for custom [`FrameBackend`] implementations; such a session
    /// has an empty [`path`](Self::path).
    pub fn from_backend(backend: Box<dyn FrameBackend>, options: ExtractOptions) -> Self {
        Self {
            backend,
            options,
            gate: RunGate::new(),
            path: PathBuf::new(),
        }
    }

    /// Share `gate` with other sessions so their runs exclude each other.
    #[must_use]
    pub fn with_run_gate(mut self, gate: RunGate) -> Self {
        self.gate = gate;
        self
    }

    /// Replace the loaded media with `path`.
    ///
    /// The previous source is released once the new one has opened; if
    /// opening fails the session keeps the old source.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), FramepackError> {
        let path = path.as_ref().to_path_buf();
        let backend = select_backend(MediaSource::open(&path)?, &self.options)?;
        log::debug!(
            "Replacing {} with {}",
            self.path.display(),
            path.display()
        );
        self.backend = backend;
        self.path = path;
        Ok(())
    }

    /// Metadata of the loaded media.
    pub fn metadata(&self) -> &SourceMetadata {
        self.backend.metadata()
    }

    /// Strategy of the active backend, after any fallback.
    pub fn strategy(&self) -> SamplingStrategy {
        self.backend.strategy()
    }

    /// Path of the loaded media.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The options this session was opened with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// A handle to this session's run gate.
    pub fn run_gate(&self) -> RunGate {
        self.gate.clone()
    }

    /// Lazily sample the loaded media every `interval_secs` seconds.
    ///
    /// Unlike [`extract`](Self::extract) this yields raw frames and does not
    /// claim the run gate.
    pub fn samples(&mut self, interval_secs: f64) -> Result<Samples<'_>, FramepackError> {
        FrameSampler::new(
            self.backend.as_mut(),
            interval_secs,
            self.options.decode_timeout,
        )
    }

    /// Sample the whole video every `interval_secs` seconds and package
    /// each frame.
    ///
    /// Frames are produced strictly in schedule order. A failed run
    /// returns its error and discards the partial collection.
    ///
    /// # Errors
    ///
    /// - [`FramepackError::InvalidParameter`] for a non-positive interval.
    /// - [`FramepackError::RunInProgress`] if the run gate is held.
    /// - [`FramepackError::DecodeTimeout`] if a frame never became ready.
    /// - Any decoding or encoding error.
    pub fn extract(&mut self, interval_secs: f64) -> Result<FrameCollection, FramepackError> {
        let schedule = SampleSchedule::new(interval_secs, self.metadata().duration)?;
        let _permit = self.gate.try_acquire()?;

        log::info!(
            "Extracting {} frames from {} every {interval_secs}s ({:?})",
            schedule.len(),
            self.path.display(),
            self.backend.strategy(),
        );

        let packager =
            Packager::new(self.options.image_format).with_thumbnails(self.options.thumbnails);
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::FrameSampling,
            Some(schedule.len()),
            self.options.batch_size,
        );
        let mut collection = FrameCollection::with_capacity(
            schedule.len().min(PREALLOCATED_FRAMES) as usize,
        );

        let samples = FrameSampler::with_schedule(
            self.backend.as_mut(),
            schedule,
            self.options.decode_timeout,
        )?;
        for sample in samples {
            let frame = sample?;
            let (index, timestamp) = (frame.index, frame.timestamp);
            packager.accumulate(&mut collection, frame)?;
            tracker.advance(Some(index), Some(timestamp));
        }
        tracker.finish();

        log::info!("Extracted {} frames", collection.len());
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_admits_one_run() {
        let gate = RunGate::new();
        let permit = gate.try_acquire().unwrap();
        assert!(gate.is_running());
        assert!(matches!(
            gate.clone().try_acquire(),
            Err(FramepackError::RunInProgress)
        ));
        drop(permit);
        assert!(!gate.is_running());
        assert!(gate.try_acquire().is_ok());
    }
}
