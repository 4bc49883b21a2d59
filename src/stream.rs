//! Async frame sampling (feature `async`).
//!
//! [`sample_stream`] runs a sampling pass on a Tokio blocking thread and
//! delivers frames through a bounded channel, so FFmpeg work never occupies
//! the async executor.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use framepack::{ExtractOptions, FramepackError, sample_stream};
//!
//! # async fn example() -> Result<(), FramepackError> {
//! let mut stream = sample_stream("input.mp4", 2.0, ExtractOptions::new())?;
//! while let Some(frame) = stream.next().await {
//!     let frame = frame?;
//!     println!("{:?}", frame.timestamp);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::{
    config::ExtractOptions,
    error::{FramepackError, require_positive},
    sampler::SampledFrame,
    session::ExtractionSession,
};

/// Frames buffered between the decode thread and the consumer.
const CHANNEL_CAPACITY: usize = 8;

/// Sampled frames produced on a background thread.
///
/// Dropping the stream closes the channel; the worker stops after the frame
/// it is currently decoding.
pub struct FrameStream {
    receiver: Receiver<Result<SampledFrame, FramepackError>>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl Stream for FrameStream {
    type Item = Result<SampledFrame, FramepackError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Sample `path` every `interval_secs` seconds in the background.
///
/// Must be called from within a Tokio runtime. The interval is validated
/// before any thread is spawned; open and decode errors arrive as the last
/// item of the stream.
pub fn sample_stream<P: AsRef<Path>>(
    path: P,
    interval_secs: f64,
    options: ExtractOptions,
) -> Result<FrameStream, FramepackError> {
    let interval_secs = require_positive("interval", interval_secs)?;
    let path = path.as_ref().to_path_buf();
    let (sender, receiver) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::task::spawn_blocking(move || {
        if let Err(error) = sample_blocking(path, interval_secs, options, &sender) {
            let _ = sender.blocking_send(Err(error));
        }
    });

    Ok(FrameStream { receiver, handle })
}

fn sample_blocking(
    path: PathBuf,
    interval_secs: f64,
    options: ExtractOptions,
    sender: &Sender<Result<SampledFrame, FramepackError>>,
) -> Result<(), FramepackError> {
    let mut session = ExtractionSession::open(path, options)?;
    for sample in session.samples(interval_secs)? {
        if sender.blocking_send(Ok(sample?)).is_err() {
            log::debug!("Frame stream dropped; stopping sampling");
            break;
        }
    }
    Ok(())
}
